//! Sync status polled by front ends.

use chrono::{DateTime, Local, Utc};

use crate::sync::{SyncError, SyncReport};

/// Coarse sync state for status indicators
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncState {
    #[default]
    Idle,
    Syncing,
    Synced,
    Error,
}

/// Caller-owned record of the latest sync pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStatus {
    pub is_syncing: bool,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl SyncStatus {
    pub fn state(&self) -> SyncState {
        if self.is_syncing {
            SyncState::Syncing
        } else if self.last_error.is_some() {
            SyncState::Error
        } else if self.last_sync_at.is_some() {
            SyncState::Synced
        } else {
            SyncState::Idle
        }
    }

    pub fn begin(&mut self) {
        self.is_syncing = true;
    }

    /// Record the outcome of a pass
    pub fn finish(&mut self, outcome: &Result<SyncReport, SyncError>) {
        self.is_syncing = false;
        match outcome {
            Ok(_) => {
                self.last_sync_at = Some(Utc::now());
                self.last_error = None;
            }
            Err(error) => self.last_error = Some(error.to_string()),
        }
    }

    pub const fn is_sync_disabled(&self, signed_in: bool) -> bool {
        self.is_syncing || !signed_in
    }

    pub const fn is_restore_disabled(&self, signed_in: bool) -> bool {
        self.is_syncing || !signed_in
    }

    pub fn last_sync_text(&self) -> String {
        self.last_sync_at.map_or_else(
            || "Never".to_string(),
            |at| {
                at.with_timezone(&Local)
                    .format("%Y-%m-%d %H:%M")
                    .to_string()
            },
        )
    }

    pub fn last_error_text(&self) -> String {
        self.last_error.clone().unwrap_or_else(|| "None".to_string())
    }
}
