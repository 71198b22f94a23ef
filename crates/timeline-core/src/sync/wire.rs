//! JSON bodies exchanged with the notes service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::MediaKind;
use crate::queue::{OpType, QueuedNote};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotePayload {
    pub id: String,
    pub text: String,
    #[serde(default, alias = "is_pinned")]
    pub is_pinned: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(alias = "created_at")]
    pub created_at: DateTime<Utc>,
    #[serde(alias = "updated_at")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, alias = "deleted_at")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<&QueuedNote> for NotePayload {
    fn from(note: &QueuedNote) -> Self {
        Self {
            id: note.id.to_string(),
            text: note.text.clone(),
            is_pinned: note.is_pinned,
            tags: note.tags.clone(),
            created_at: note.created_at,
            updated_at: note.updated_at,
            deleted_at: note.deleted_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaPayload {
    pub id: String,
    #[serde(alias = "note_id")]
    pub note_id: String,
    pub kind: MediaKind,
    #[serde(default)]
    pub filename: String,
    #[serde(default, alias = "content_type")]
    pub content_type: String,
    #[serde(default)]
    pub checksum: String,
    #[serde(alias = "data_base64")]
    pub data_base64: String,
}

/// One queued mutation in transmittable form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOperation {
    pub op_id: String,
    pub op_type: OpType,
    pub note: NotePayload,
    pub media: Vec<MediaPayload>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequest {
    pub ops: Vec<SyncOperation>,
}

/// Server verdict for one submitted note. Correlate by `note_id`, not position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncNoteResult {
    #[serde(alias = "note_id")]
    pub note_id: String,
    pub result: String,
    #[serde(default)]
    pub note: Option<NotePayload>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResponse {
    #[serde(default)]
    pub results: Vec<SyncNoteResult>,
}

/// Body of `GET /api/notes`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreResponse {
    #[serde(default)]
    pub notes: Vec<NotePayload>,
    #[serde(default)]
    pub media: Vec<MediaPayload>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn note_payload_serializes_null_deleted_at() {
        let payload = NotePayload {
            id: "n1".to_string(),
            text: "hi".to_string(),
            is_pinned: true,
            tags: vec!["work".to_string()],
            created_at: DateTime::from_timestamp(0, 0).unwrap(),
            updated_at: DateTime::from_timestamp(60, 0).unwrap(),
            deleted_at: None,
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["isPinned"], true);
        assert_eq!(value["createdAt"], "1970-01-01T00:00:00Z");
        assert!(value.get("deletedAt").is_some_and(serde_json::Value::is_null));
    }

    #[test]
    fn restore_response_tolerates_missing_sections() {
        let response: RestoreResponse = serde_json::from_value(json!({
            "notes": [{
                "id": "n1",
                "text": "remote",
                "createdAt": "2024-01-01T00:00:00Z",
                "updatedAt": "2024-01-02T00:00:00.123Z"
            }]
        }))
        .unwrap();
        assert_eq!(response.notes.len(), 1);
        assert!(response.notes[0].tags.is_empty());
        assert!(response.media.is_empty());
    }

    #[test]
    fn responses_accept_snake_case_fields() {
        let response: RestoreResponse = serde_json::from_value(json!({
            "notes": [{
                "id": "n1",
                "text": "remote",
                "is_pinned": true,
                "created_at": "2024-01-01T00:00:00Z",
                "updated_at": "2024-01-02T00:00:00Z",
                "deleted_at": null
            }],
            "media": [{
                "id": "m1",
                "note_id": "n1",
                "kind": "image",
                "content_type": "image/png",
                "data_base64": "aGVsbG8="
            }]
        }))
        .unwrap();
        assert!(response.notes[0].is_pinned);
        assert_eq!(response.media[0].note_id, "n1");
        assert_eq!(response.media[0].content_type, "image/png");
        assert_eq!(response.media[0].data_base64, "aGVsbG8=");

        let sync: SyncResponse = serde_json::from_value(json!({
            "results": [{"note_id": "n1", "result": "applied"}]
        }))
        .unwrap();
        assert_eq!(sync.results[0].note_id, "n1");

        let value = serde_json::to_value(&response.media[0]).unwrap();
        assert_eq!(value["noteId"], "n1");
    }
}
