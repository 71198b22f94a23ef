use std::path::PathBuf;

use timeline_core::config::AppConfig;
use timeline_core::services::NoteEdit;

use crate::commands::common::{open_repository, resolve_note};
use crate::error::CliError;

pub struct EditArgs {
    pub text: Option<String>,
    pub tags: Vec<String>,
    pub pin: bool,
    pub unpin: bool,
    pub add_images: Vec<PathBuf>,
    pub remove_images: Vec<String>,
    pub add_audio: Vec<PathBuf>,
    pub remove_audio: Vec<String>,
}

impl EditArgs {
    /// `None` when no option would change the note
    pub fn into_edit(self) -> Option<NoteEdit> {
        let pinned = match (self.pin, self.unpin) {
            (true, _) => Some(true),
            (false, true) => Some(false),
            (false, false) => None,
        };
        let edit = NoteEdit {
            text: self.text,
            tags: (!self.tags.is_empty()).then_some(self.tags),
            pinned,
            add_images: self.add_images,
            remove_images: self.remove_images,
            add_audio: self.add_audio,
            remove_audio: self.remove_audio,
        };
        (edit != NoteEdit::default()).then_some(edit)
    }
}

pub async fn run_edit(id: &str, args: EditArgs, config: &AppConfig) -> Result<(), CliError> {
    let edit = args.into_edit().ok_or(CliError::NothingToEdit)?;
    let repo = open_repository(config).await?;
    let note = resolve_note(id, &repo)?;

    let pin_only = NoteEdit {
        pinned: edit.pinned,
        ..NoteEdit::default()
    } == edit;
    let updated = match edit.pinned {
        Some(pinned) if pin_only => repo.set_pinned(&note.id, pinned).await?,
        _ => repo.update(&note.id, edit).await?,
    };
    println!("{}", updated.id);
    Ok(())
}
