//! Queue record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{MediaKind, Note, NoteId};

/// Kind of mutation recorded by a queue entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpType {
    Create,
    Update,
    Delete,
}

impl OpType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// Point-in-time copy of a note's metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedNote {
    pub id: NoteId,
    pub text: String,
    pub is_pinned: bool,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl QueuedNote {
    /// Snapshot `note`, marking it deleted at `deleted_at` if given
    #[must_use]
    pub fn snapshot(note: &Note, deleted_at: Option<DateTime<Utc>>) -> Self {
        Self {
            id: note.id.clone(),
            text: note.text.clone(),
            is_pinned: note.is_pinned,
            tags: note.tag_list(),
            created_at: note.created_at,
            updated_at: note.updated_at,
            deleted_at,
        }
    }
}

/// A media blob copied into the queue's private store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedMedia {
    pub id: String,
    pub note_id: NoteId,
    pub kind: MediaKind,
    pub filename: String,
    pub content_type: String,
    /// Lower-case hex SHA-256 of the copied bytes
    pub checksum: String,
    /// File name inside the queue's `Media/` directory
    pub local_path: String,
}

/// One durable unit of the mutation log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub op_id: String,
    pub op_type: OpType,
    pub note: QueuedNote,
    pub media: Vec<QueuedMedia>,
}
