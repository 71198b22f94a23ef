//! Queue drain and restore passes

use std::collections::HashMap;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tokio::sync::Mutex;

use crate::auth::CredentialStore;
use crate::db::NoteStore;
use crate::models::{normalize_tags, MediaKind, Note, NoteId};
use crate::queue::{MutationQueue, QueueEntry};
use crate::storage::ContentStore;
use crate::util::sha256_hex;

use super::batcher::Batcher;
use super::client::SyncClient;
use super::error::{SyncError, SyncResult};
use super::wire::{MediaPayload, NotePayload, SyncNoteResult, SyncOperation, SyncRequest};

/// Outcome of one drain pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub batches_sent: usize,
    pub ops_sent: usize,
    pub results: Vec<SyncNoteResult>,
}

/// Outcome of one restore pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub notes_restored: usize,
    pub notes_skipped: usize,
    pub media_written: usize,
    pub media_deduplicated: usize,
}

/// Moves queued mutations to the server and pulls remote notes back.
///
/// At most one pass (sync or restore) runs at a time; a second caller is
/// rejected with [`SyncError::AlreadyRunning`].
pub struct SyncOrchestrator<S: CredentialStore> {
    queue: Arc<MutationQueue>,
    notes: Arc<dyn NoteStore>,
    content: ContentStore,
    client: SyncClient<S>,
    batcher: Batcher,
    running: Mutex<()>,
}

impl<S: CredentialStore> SyncOrchestrator<S> {
    pub fn new(
        queue: Arc<MutationQueue>,
        notes: Arc<dyn NoteStore>,
        content: ContentStore,
        client: SyncClient<S>,
        batcher: Batcher,
    ) -> Self {
        Self {
            queue,
            notes,
            content,
            client,
            batcher,
            running: Mutex::new(()),
        }
    }

    /// Whether a pass is in flight
    pub fn is_syncing(&self) -> bool {
        self.running.try_lock().is_err()
    }

    /// Upload every pending mutation, batch by batch.
    ///
    /// Entries are removed only once their batch is acknowledged. The first
    /// failing batch stops the pass; earlier batches stay removed.
    pub async fn perform_sync(&self) -> SyncResult<SyncReport> {
        let _guard = self
            .running
            .try_lock()
            .map_err(|_| SyncError::AlreadyRunning)?;

        let pending = self.queue.pending().await?;
        if pending.is_empty() {
            tracing::debug!("Sync queue empty, nothing to send");
            return Ok(SyncReport::default());
        }

        let mut ops = Vec::with_capacity(pending.len());
        for entry in &pending {
            ops.push(self.build_operation(entry).await?);
        }
        let batches = self.batcher.split(ops)?;
        let total = batches.len();

        let mut report = SyncReport::default();
        let mut cursor = 0;
        for (index, batch) in batches.into_iter().enumerate() {
            let len = batch.len();
            let response = match self.client.send(&SyncRequest { ops: batch }).await {
                Ok(response) => response,
                Err(error) => {
                    tracing::warn!(
                        "Sync batch {}/{total} failed, {} operations left queued: {error}",
                        index + 1,
                        pending.len() - cursor
                    );
                    return Err(error);
                }
            };

            self.queue.remove(&pending[cursor..cursor + len]).await?;
            cursor += len;
            report.batches_sent += 1;
            report.ops_sent += len;
            report.results.extend(response.results);
            tracing::info!("Sync batch {}/{total} acknowledged ({len} operations)", index + 1);
        }

        Ok(report)
    }

    async fn build_operation(&self, entry: &QueueEntry) -> SyncResult<SyncOperation> {
        let mut media = Vec::with_capacity(entry.media.len());
        for item in &entry.media {
            let bytes = self.queue.load_media(item).await?;
            media.push(MediaPayload {
                id: item.id.clone(),
                note_id: item.note_id.to_string(),
                kind: item.kind,
                filename: item.filename.clone(),
                content_type: item.content_type.clone(),
                checksum: item.checksum.clone(),
                data_base64: STANDARD.encode(&bytes),
            });
        }
        Ok(SyncOperation {
            op_id: entry.op_id.clone(),
            op_type: entry.op_type,
            note: NotePayload::from(&entry.note),
            media,
        })
    }

    /// Pull the `limit` most recent remote notes into local storage.
    ///
    /// Media is deduplicated by the SHA-256 of its decoded bytes against
    /// everything already on disk and everything written in this pass.
    pub async fn restore_latest(&self, limit: usize) -> SyncResult<RestoreReport> {
        let _guard = self
            .running
            .try_lock()
            .map_err(|_| SyncError::AlreadyRunning)?;

        let response = self.client.fetch_latest(limit).await?;

        let mut media_by_note: HashMap<&str, Vec<&MediaPayload>> = HashMap::new();
        for item in &response.media {
            media_by_note
                .entry(item.note_id.as_str())
                .or_default()
                .push(item);
        }

        let mut known = HashMap::new();
        for kind in [MediaKind::Image, MediaKind::Audio] {
            known.insert(kind, self.content.checksum_index(kind).await?);
        }

        let mut report = RestoreReport::default();
        for remote in &response.notes {
            if remote.deleted_at.is_some() {
                report.notes_skipped += 1;
                continue;
            }
            let Ok(id) = remote.id.parse::<NoteId>() else {
                tracing::warn!("Skipping restored note with empty id");
                report.notes_skipped += 1;
                continue;
            };

            let mut image_paths = Vec::new();
            let mut audio_paths = Vec::new();
            for item in media_by_note.get(remote.id.as_str()).into_iter().flatten() {
                let Ok(bytes) = STANDARD.decode(item.data_base64.trim()) else {
                    tracing::warn!("Skipping media {} with invalid base64", item.id);
                    continue;
                };
                let checksum = sha256_hex(&bytes);
                let index = known.entry(item.kind).or_default();
                let path = if let Some(existing) = index.get(&checksum) {
                    tracing::debug!("Reusing {} for restored media {}", existing, item.id);
                    report.media_deduplicated += 1;
                    existing.clone()
                } else {
                    let fallback = item.kind.extension_for(&item.content_type);
                    let path = self
                        .content
                        .write_named(item.kind, &item.filename, &bytes, fallback)
                        .await?;
                    index.insert(checksum, path.clone());
                    report.media_written += 1;
                    path
                };
                match item.kind {
                    MediaKind::Image => image_paths.push(path),
                    MediaKind::Audio => audio_paths.push(path),
                }
            }

            let note = Note {
                id,
                text: remote.text.clone(),
                created_at: remote.created_at,
                updated_at: remote.updated_at.max(remote.created_at),
                is_pinned: remote.is_pinned,
                tags: normalize_tags(&remote.tags),
                image_paths,
                audio_paths,
            };
            self.notes.upsert(&note)?;
            report.notes_restored += 1;
        }

        tracing::info!(
            "Restored {} notes ({} skipped), wrote {} media files, reused {}",
            report.notes_restored,
            report.notes_skipped,
            report.media_written,
            report.media_deduplicated
        );
        Ok(report)
    }
}
