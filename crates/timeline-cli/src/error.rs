use std::io;

use thiserror::Error;
use timeline_core::auth::AuthError;
use timeline_core::config::ConfigError;
use timeline_core::sync::SyncError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] timeline_core::Error),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No note content provided")]
    EmptyContent,
    #[error("Note ID cannot be empty")]
    EmptyNoteId,
    #[error("Note not found for id/prefix: {0}")]
    NoteNotFound(String),
    #[error("{0}")]
    AmbiguousNoteId(String),
    #[error("Nothing to change; pass at least one edit option")]
    NothingToEdit,
    #[error("URL is not a recognised auth callback: {0}")]
    InvalidCallback(String),
    #[error("No login URL configured. Set `login_url` in config.json or TIMELINE_LOGIN_URL.")]
    MissingLoginUrl,
}
