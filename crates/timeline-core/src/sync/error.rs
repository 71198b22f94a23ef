//! Sync error types

use thiserror::Error;

use crate::auth::AuthError;

/// Raised when mutations cannot be packed into request-sized batches
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Operation {op_id} serializes to {size} bytes, over the {budget}-byte batch budget")]
    OperationTooLarge {
        op_id: String,
        size: usize,
        budget: usize,
    },
    #[error("Failed to serialize operation: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Local(#[from] crate::Error),
    #[error(transparent)]
    Batch(#[from] BatchError),
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Sync API returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Failed to decode sync response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Not signed in to the notes service.")]
    NotSignedIn,
    #[error("Session expired. Please sign in again.")]
    SessionExpired,
    #[error("A sync is already in progress.")]
    AlreadyRunning,
    #[error(transparent)]
    Credentials(#[from] AuthError),
}

impl SyncError {
    /// The user has to sign in again before syncing can continue
    #[must_use]
    pub const fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
