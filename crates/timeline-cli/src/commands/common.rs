use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use timeline_core::auth::{AuthClient, AuthSessionManager};
use timeline_core::config::AppConfig;
use timeline_core::services::NotesRepository;
use timeline_core::sync::{Batcher, SyncClient, SyncOrchestrator};
use timeline_core::{Note, NoteId};

use crate::credentials::KeyringCredentialStore;
use crate::error::CliError;

const SHORT_ID_LEN: usize = 13;

#[derive(Debug, Serialize)]
pub struct NoteListItem {
    pub id: String,
    pub preview: String,
    pub text: String,
    pub pinned: bool,
    pub created_at: String,
    pub updated_at: String,
    pub relative_time: String,
    pub tags: Vec<String>,
    pub images: Vec<String>,
    pub audio: Vec<String>,
}

/// Config file and env, with `--data-dir` taking precedence
pub fn load_config(data_dir: Option<PathBuf>) -> Result<AppConfig, CliError> {
    let mut config = AppConfig::load()?;
    if let Some(dir) = data_dir {
        config.data_dir = Some(dir);
    }
    Ok(config)
}

pub async fn open_repository(config: &AppConfig) -> Result<NotesRepository, CliError> {
    Ok(NotesRepository::open(config.data_dir()).await?)
}

pub fn credential_store(config: &AppConfig) -> Result<KeyringCredentialStore, CliError> {
    Ok(KeyringCredentialStore::new(config.require_base_url()?))
}

pub fn auth_client(config: &AppConfig) -> Result<AuthClient, CliError> {
    Ok(AuthClient::new(
        config.require_base_url()?,
        config.require_auth_api_key()?,
    )?)
}

pub fn session_manager(
    config: &AppConfig,
) -> Result<AuthSessionManager<KeyringCredentialStore>, CliError> {
    Ok(AuthSessionManager::new(
        auth_client(config)?,
        credential_store(config)?,
        config.callback.clone(),
        config.login_url.clone(),
    ))
}

pub fn build_orchestrator(
    config: &AppConfig,
    repo: &NotesRepository,
) -> Result<SyncOrchestrator<KeyringCredentialStore>, CliError> {
    let client = SyncClient::new(
        config.require_base_url()?,
        config.require_sync_api_key()?,
        auth_client(config)?,
        credential_store(config)?,
    )?;
    Ok(SyncOrchestrator::new(
        repo.queue(),
        repo.notes(),
        repo.content().clone(),
        client,
        Batcher::new(config.max_batch_bytes),
    ))
}

/// Find a note by full id or a unique id prefix
pub fn resolve_note(note_query: &str, repo: &NotesRepository) -> Result<Note, CliError> {
    let query = normalize_note_identifier(note_query)?;
    let id: NoteId = query.parse()?;
    if let Some(note) = repo.get(&id)? {
        return Ok(note);
    }

    let mut matches = repo
        .list()?
        .into_iter()
        .filter(|note| note.id.as_str().starts_with(&query))
        .collect::<Vec<_>>();

    match matches.len() {
        0 => Err(CliError::NoteNotFound(query)),
        1 => Ok(matches.remove(0)),
        _ => {
            let options = matches
                .iter()
                .take(3)
                .map(|note| short_id(&note.id))
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousNoteId(format!(
                "Note id prefix '{query}' is ambiguous. Matches: {options}"
            )))
        }
    }
}

pub fn normalize_note_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyNoteId)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub fn short_id(id: &NoteId) -> String {
    id.as_str().chars().take(SHORT_ID_LEN).collect()
}

pub fn format_note_lines(notes: &[Note]) -> Vec<String> {
    let now = Utc::now();
    notes
        .iter()
        .map(|note| {
            let marker = if note.is_pinned { '*' } else { ' ' };
            let short_id = short_id(&note.id);
            let preview = note_preview(note, 40);
            let relative_time = format_relative_time(note.updated_at, now);
            let tags = render_tags(note);

            if tags.is_empty() {
                format!("{marker} {short_id:<13}  {preview:<40}  {relative_time}")
            } else {
                format!("{marker} {short_id:<13}  {preview:<40}  {relative_time:<10}  {tags}")
            }
        })
        .collect()
}

pub fn note_to_list_item(note: &Note) -> NoteListItem {
    NoteListItem {
        id: note.id.to_string(),
        preview: note_preview(note, 80),
        text: note.text.clone(),
        pinned: note.is_pinned,
        created_at: note.created_at.to_rfc3339(),
        updated_at: note.updated_at.to_rfc3339(),
        relative_time: format_relative_time(note.updated_at, Utc::now()),
        tags: note.tag_list(),
        images: note.image_paths.clone(),
        audio: note.audio_paths.clone(),
    }
}

/// First line of text, or a media summary for media-only notes
pub fn note_preview(note: &Note, max_chars: usize) -> String {
    let first_line = note.text.lines().next().unwrap_or("").trim();
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");
    let collapsed = if collapsed.is_empty() {
        media_summary(note)
    } else {
        collapsed
    };

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let mut truncated = collapsed
            .chars()
            .take(max_chars.saturating_sub(3))
            .collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

fn media_summary(note: &Note) -> String {
    let mut parts = Vec::new();
    match note.image_paths.len() {
        0 => {}
        1 => parts.push("1 image".to_string()),
        count => parts.push(format!("{count} images")),
    }
    match note.audio_paths.len() {
        0 => {}
        1 => parts.push("1 recording".to_string()),
        count => parts.push(format!("{count} recordings")),
    }
    format!("[{}]", parts.join(", "))
}

pub fn render_tags(note: &Note) -> String {
    note.tags
        .iter()
        .map(|tag| format!("#{tag}"))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn format_relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(then);
    let days = elapsed.num_days();

    if elapsed.num_minutes() < 1 {
        "just now".to_string()
    } else if elapsed.num_hours() < 1 {
        format!("{}m ago", elapsed.num_minutes())
    } else if days < 1 {
        format!("{}h ago", elapsed.num_hours())
    } else if days < 7 {
        format!("{days}d ago")
    } else if days < 30 {
        format!("{}w ago", days / 7)
    } else if days < 365 {
        format!("{}mo ago", days / 30)
    } else {
        format!("{}y ago", days / 365)
    }
}
