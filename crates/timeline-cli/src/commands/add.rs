use std::path::PathBuf;

use timeline_core::config::AppConfig;
use timeline_core::services::NoteDraft;

use crate::commands::common::{normalize_content, open_repository};
use crate::error::CliError;

pub struct AddArgs {
    pub text: Vec<String>,
    pub images: Vec<PathBuf>,
    pub audio: Vec<PathBuf>,
    pub tags: Vec<String>,
    pub pin: bool,
}

pub async fn run_add(args: AddArgs, config: &AppConfig) -> Result<(), CliError> {
    let text = normalize_content(&args.text.join(" ")).unwrap_or_default();
    if text.is_empty() && args.images.is_empty() && args.audio.is_empty() {
        return Err(CliError::EmptyContent);
    }

    let repo = open_repository(config).await?;
    let note = repo
        .create(NoteDraft {
            text,
            tags: args.tags,
            pinned: args.pin,
            images: args.images,
            audio: args.audio,
        })
        .await?;

    println!("{}", note.id);
    Ok(())
}
