//! Note model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;
use crate::util::now_millis;

use super::tag::normalize_tags;

/// A stable, globally unique note identifier.
///
/// Locally created notes get a UUID v7 (time-sortable). Identifiers received
/// from the server are kept verbatim, so any non-empty string is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    /// Create a new unique note ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for NoteId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NoteId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("Note ID cannot be empty".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// A note in the system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Unique identifier, never reassigned
    pub id: NoteId,
    /// Plain text content
    pub text: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp, never earlier than `created_at`
    pub updated_at: DateTime<Utc>,
    /// Pinned notes sort ahead of the rest
    pub is_pinned: bool,
    /// Normalized tag names
    pub tags: BTreeSet<String>,
    /// Content store paths of attached images, in display order
    pub image_paths: Vec<String>,
    /// Content store paths of attached audio recordings, in display order
    pub audio_paths: Vec<String>,
}

impl Note {
    /// Create a new note with the given content
    #[must_use]
    pub fn new<I, S>(
        text: impl Into<String>,
        image_paths: Vec<String>,
        audio_paths: Vec<String>,
        tags: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let now = now_millis();
        Self {
            id: NoteId::new(),
            text: text.into(),
            created_at: now,
            updated_at: now,
            is_pinned: false,
            tags: normalize_tags(tags),
            image_paths,
            audio_paths,
        }
    }

    /// Mark the note as modified now.
    ///
    /// Clock skew can put "now" before `created_at`; the update time is
    /// clamped so it never precedes creation.
    pub fn touch(&mut self) {
        self.updated_at = now_millis().max(self.created_at);
    }

    /// Tag names as an ordered list
    #[must_use]
    pub fn tag_list(&self) -> Vec<String> {
        self.tags.iter().cloned().collect()
    }

    /// Get first line as title preview, truncated to `max_len` characters
    #[must_use]
    pub fn title_preview(&self, max_len: usize) -> String {
        self.text
            .lines()
            .next()
            .unwrap_or("")
            .chars()
            .take(max_len)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_note_id_unique() {
        let id1 = NoteId::new();
        let id2 = NoteId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_note_id_parse() {
        let id = NoteId::new();
        let parsed: NoteId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("   ".parse::<NoteId>().is_err());
    }

    #[test]
    fn test_note_new() {
        let note = Note::new("Hello world", vec![], vec![], ["Work", "work "]);
        assert_eq!(note.text, "Hello world");
        assert!(!note.is_pinned);
        assert_eq!(note.created_at, note.updated_at);
        assert_eq!(note.tag_list(), vec!["work".to_string()]);
    }

    #[test]
    fn test_touch_never_precedes_creation() {
        let mut note = Note::new("Later", vec![], vec![], Vec::<String>::new());
        note.created_at += Duration::hours(1);
        note.touch();
        assert!(note.updated_at >= note.created_at);
    }

    #[test]
    fn test_title_preview() {
        let note = Note::new(
            "First line\nSecond line",
            vec![],
            vec![],
            Vec::<String>::new(),
        );
        assert_eq!(note.title_preview(50), "First line");
        assert_eq!(note.title_preview(5), "First");
    }
}
