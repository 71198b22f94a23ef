//! Note mutations that keep local storage and the sync queue in step.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::db::{NoteStore, SqliteNoteStore};
use crate::models::{normalize_tags, MediaKind, Note, NoteId};
use crate::queue::MutationQueue;
use crate::storage::ContentStore;
use crate::{Error, Result};

/// Content for a new note; media are external files to import
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteDraft {
    pub text: String,
    pub tags: Vec<String>,
    pub pinned: bool,
    pub images: Vec<PathBuf>,
    pub audio: Vec<PathBuf>,
}

/// Changes to an existing note; `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteEdit {
    pub text: Option<String>,
    pub tags: Option<Vec<String>>,
    pub pinned: Option<bool>,
    pub add_images: Vec<PathBuf>,
    pub remove_images: Vec<String>,
    pub add_audio: Vec<PathBuf>,
    pub remove_audio: Vec<String>,
}

/// Repository used by front ends for every note change.
///
/// Each mutation is persisted locally and appended to the mutation queue;
/// if queueing fails the local change is rolled back.
#[derive(Clone)]
pub struct NotesRepository {
    notes: Arc<dyn NoteStore>,
    content: ContentStore,
    queue: Arc<MutationQueue>,
}

impl NotesRepository {
    pub fn new(notes: Arc<dyn NoteStore>, content: ContentStore, queue: Arc<MutationQueue>) -> Self {
        Self {
            notes,
            content,
            queue,
        }
    }

    /// Open notes, media and queue under one data directory
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        let content = ContentStore::open(data_dir).await?;
        let queue = MutationQueue::open(data_dir, content.clone()).await?;
        let notes = SqliteNoteStore::open(data_dir.join("notes.db"))?;
        tracing::debug!("Opened notes repository at {}", data_dir.display());
        Ok(Self::new(Arc::new(notes), content, Arc::new(queue)))
    }

    pub fn notes(&self) -> Arc<dyn NoteStore> {
        Arc::clone(&self.notes)
    }

    pub fn content(&self) -> &ContentStore {
        &self.content
    }

    pub fn queue(&self) -> Arc<MutationQueue> {
        Arc::clone(&self.queue)
    }

    pub fn list(&self) -> Result<Vec<Note>> {
        self.notes.list_all()
    }

    pub fn get(&self, id: &NoteId) -> Result<Option<Note>> {
        self.notes.get(id)
    }

    pub async fn create(&self, draft: NoteDraft) -> Result<Note> {
        if draft.text.trim().is_empty() && draft.images.is_empty() && draft.audio.is_empty() {
            return Err(Error::InvalidInput(
                "A note needs text or media".to_string(),
            ));
        }

        let image_paths = self.import_all(MediaKind::Image, &draft.images).await?;
        let audio_paths = match self.import_all(MediaKind::Audio, &draft.audio).await {
            Ok(paths) => paths,
            Err(error) => {
                self.discard(&image_paths, &[]).await;
                return Err(error);
            }
        };

        let mut note = Note::new(draft.text, image_paths, audio_paths, draft.tags);
        note.is_pinned = draft.pinned;

        if let Err(error) = self.notes.insert(&note) {
            self.discard(&note.image_paths, &note.audio_paths).await;
            return Err(error);
        }
        if let Err(error) = self.queue.enqueue_create(&note).await {
            if let Err(rollback) = self.notes.delete(&note.id) {
                tracing::warn!("Failed to roll back note {}: {rollback}", note.id);
            }
            self.discard(&note.image_paths, &note.audio_paths).await;
            return Err(error);
        }

        tracing::info!("Created note {}", note.id);
        Ok(note)
    }

    /// Apply `edit`; the queued update carries only newly attached media
    pub async fn update(&self, id: &NoteId, edit: NoteEdit) -> Result<Note> {
        let previous = self
            .notes
            .get(id)?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        let new_images = self.import_all(MediaKind::Image, &edit.add_images).await?;
        let new_audio = match self.import_all(MediaKind::Audio, &edit.add_audio).await {
            Ok(paths) => paths,
            Err(error) => {
                self.discard(&new_images, &[]).await;
                return Err(error);
            }
        };

        let mut note = previous.clone();
        if let Some(text) = edit.text {
            note.text = text;
        }
        if let Some(tags) = edit.tags {
            note.tags = normalize_tags(tags);
        }
        if let Some(pinned) = edit.pinned {
            note.is_pinned = pinned;
        }
        let removed_images = detach(&mut note.image_paths, &edit.remove_images);
        let removed_audio = detach(&mut note.audio_paths, &edit.remove_audio);
        note.image_paths.extend(new_images.iter().cloned());
        note.audio_paths.extend(new_audio.iter().cloned());
        note.touch();

        if let Err(error) = self.notes.update(&note) {
            self.discard(&new_images, &new_audio).await;
            return Err(error);
        }
        if let Err(error) = self
            .queue
            .enqueue_update(&note, &new_images, &new_audio)
            .await
        {
            if let Err(rollback) = self.notes.update(&previous) {
                tracing::warn!("Failed to restore note {}: {rollback}", note.id);
            }
            self.discard(&new_images, &new_audio).await;
            return Err(error);
        }

        self.release(&note.id, MediaKind::Image, &removed_images).await?;
        self.release(&note.id, MediaKind::Audio, &removed_audio).await?;
        tracing::info!("Updated note {}", note.id);
        Ok(note)
    }

    pub async fn set_pinned(&self, id: &NoteId, pinned: bool) -> Result<Note> {
        self.update(
            id,
            NoteEdit {
                pinned: Some(pinned),
                ..NoteEdit::default()
            },
        )
        .await
    }

    /// Queue the delete first so the queue holds its own media copies
    pub async fn delete(&self, id: &NoteId) -> Result<()> {
        let note = self
            .notes
            .get(id)?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        self.queue.enqueue_delete(&note).await?;
        self.release(id, MediaKind::Image, &note.image_paths).await?;
        self.release(id, MediaKind::Audio, &note.audio_paths).await?;
        self.notes.delete(id)?;
        tracing::info!("Deleted note {id}");
        Ok(())
    }

    /// Queue an update with all media for every local note
    pub async fn enqueue_full_resync(&self) -> Result<usize> {
        let notes = self.notes.list_all()?;
        for note in &notes {
            self.queue
                .enqueue_update(note, &note.image_paths, &note.audio_paths)
                .await?;
        }
        tracing::info!("Queued full resync of {} notes", notes.len());
        Ok(notes.len())
    }

    async fn import_all(&self, kind: MediaKind, sources: &[PathBuf]) -> Result<Vec<String>> {
        let mut imported = Vec::with_capacity(sources.len());
        for source in sources {
            match self.content.import_file(kind, source).await {
                Ok(path) => imported.push(path),
                Err(error) => {
                    if let Err(cleanup) = self.content.delete(kind, &imported).await {
                        tracing::warn!("Failed to clean up imported {kind} media: {cleanup}");
                    }
                    return Err(error);
                }
            }
        }
        Ok(imported)
    }

    /// Delete media `owner` no longer uses, keeping files other notes
    /// still reference (restore shares deduplicated media between notes)
    async fn release(&self, owner: &NoteId, kind: MediaKind, paths: &[String]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let notes = self.notes.list_all()?;
        let in_use = notes
            .iter()
            .filter(|note| &note.id != owner)
            .flat_map(|note| media_paths(note, kind))
            .map(String::as_str)
            .collect::<HashSet<_>>();

        let (shared, unused): (Vec<String>, Vec<String>) = paths
            .iter()
            .cloned()
            .partition(|path| in_use.contains(path.as_str()));
        for path in &shared {
            tracing::debug!("Keeping {kind} media {path}; another note references it");
        }
        self.content.delete(kind, &unused).await
    }

    async fn discard(&self, images: &[String], audio: &[String]) {
        for (kind, paths) in [(MediaKind::Image, images), (MediaKind::Audio, audio)] {
            if let Err(error) = self.content.delete(kind, paths).await {
                tracing::warn!("Failed to discard {kind} media: {error}");
            }
        }
    }
}

fn media_paths(note: &Note, kind: MediaKind) -> &[String] {
    match kind {
        MediaKind::Image => &note.image_paths,
        MediaKind::Audio => &note.audio_paths,
    }
}

/// Remove `paths` from `list`, returning the ones that were attached
fn detach(list: &mut Vec<String>, paths: &[String]) -> Vec<String> {
    let mut removed = Vec::new();
    list.retain(|path| {
        if paths.contains(path) {
            removed.push(path.clone());
            false
        } else {
            true
        }
    });
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::OpType;
    use pretty_assertions::assert_eq;
    use tempfile::{tempdir, TempDir};

    async fn setup() -> (TempDir, NotesRepository) {
        let dir = tempdir().unwrap();
        let repo = NotesRepository::open(dir.path()).await.unwrap();
        (dir, repo)
    }

    fn source(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[tokio::test]
    async fn create_persists_and_queues_with_media() {
        let (dir, repo) = setup().await;
        let photo = source(&dir, "photo.png", b"png-bytes");

        let note = repo
            .create(NoteDraft {
                text: "Beach day".to_string(),
                tags: vec!["Trip".to_string()],
                images: vec![photo],
                ..NoteDraft::default()
            })
            .await
            .unwrap();

        assert_eq!(repo.get(&note.id).unwrap().unwrap(), note);
        assert_eq!(note.image_paths.len(), 1);
        let pending = repo.queue().pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].op_type, OpType::Create);
        assert_eq!(pending[0].note.tags, vec!["trip".to_string()]);
        assert_eq!(pending[0].media[0].content_type, "image/png");
    }

    #[tokio::test]
    async fn create_with_missing_media_changes_nothing() {
        let (dir, repo) = setup().await;
        let photo = source(&dir, "ok.jpg", b"ok");

        let error = repo
            .create(NoteDraft {
                text: "broken".to_string(),
                images: vec![photo, dir.path().join("missing.jpg")],
                ..NoteDraft::default()
            })
            .await
            .unwrap_err();

        assert!(matches!(error, Error::MissingMedia(_)));
        assert!(repo.list().unwrap().is_empty());
        assert_eq!(repo.queue().pending_count().await.unwrap(), 0);
        let images = std::fs::read_dir(repo.content().directory(MediaKind::Image))
            .unwrap()
            .count();
        assert_eq!(images, 0);
    }

    #[tokio::test]
    async fn create_rejects_empty_note() {
        let (_dir, repo) = setup().await;
        let error = repo.create(NoteDraft::default()).await.unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn update_sends_only_new_media_and_drops_removed() {
        let (dir, repo) = setup().await;
        let first = source(&dir, "a.jpg", b"first");
        let second = source(&dir, "b.jpg", b"second");
        let note = repo
            .create(NoteDraft {
                text: "v1".to_string(),
                images: vec![first],
                ..NoteDraft::default()
            })
            .await
            .unwrap();
        let old_image = note.image_paths[0].clone();

        let updated = repo
            .update(
                &note.id,
                NoteEdit {
                    text: Some("v2".to_string()),
                    add_images: vec![second],
                    remove_images: vec![old_image.clone()],
                    ..NoteEdit::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.text, "v2");
        assert_eq!(updated.image_paths.len(), 1);
        assert_ne!(updated.image_paths[0], old_image);
        assert!(updated.updated_at >= updated.created_at);
        assert!(repo
            .content()
            .path_for(MediaKind::Image, &old_image)
            .await
            .is_err());

        let pending = repo.queue().pending().await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[1].op_type, OpType::Update);
        assert_eq!(pending[1].media.len(), 1);
        let sent = repo.queue().load_media(&pending[1].media[0]).await.unwrap();
        assert_eq!(sent, b"second");
    }

    #[tokio::test]
    async fn set_pinned_queues_update() {
        let (_dir, repo) = setup().await;
        let note = repo
            .create(NoteDraft {
                text: "pin me".to_string(),
                ..NoteDraft::default()
            })
            .await
            .unwrap();

        let pinned = repo.set_pinned(&note.id, true).await.unwrap();
        assert!(pinned.is_pinned);
        assert_eq!(repo.queue().pending_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn delete_queues_snapshot_before_removing_media() {
        let (dir, repo) = setup().await;
        let memo = source(&dir, "memo.m4a", b"voice");
        let note = repo
            .create(NoteDraft {
                text: "bye".to_string(),
                audio: vec![memo],
                ..NoteDraft::default()
            })
            .await
            .unwrap();

        repo.delete(&note.id).await.unwrap();

        assert!(repo.get(&note.id).unwrap().is_none());
        assert!(repo
            .content()
            .path_for(MediaKind::Audio, &note.audio_paths[0])
            .await
            .is_err());
        let pending = repo.queue().pending().await.unwrap();
        let delete = pending.last().unwrap();
        assert_eq!(delete.op_type, OpType::Delete);
        assert!(delete.note.deleted_at.is_some());
        assert_eq!(repo.queue().load_media(&delete.media[0]).await.unwrap(), b"voice");
    }

    async fn notes_sharing_one_image(repo: &NotesRepository) -> (Note, Note, String) {
        let shared = repo
            .content()
            .save(MediaKind::Image, b"same-bytes", Some("jpg"))
            .await
            .unwrap();
        let first = Note::new("first", vec![shared.clone()], Vec::new(), Vec::<String>::new());
        let second = Note::new("second", vec![shared.clone()], Vec::new(), Vec::<String>::new());
        repo.notes().upsert(&first).unwrap();
        repo.notes().upsert(&second).unwrap();
        (first, second, shared)
    }

    #[tokio::test]
    async fn delete_keeps_media_still_used_by_another_note() {
        let (_dir, repo) = setup().await;
        let (first, second, shared) = notes_sharing_one_image(&repo).await;

        repo.delete(&first.id).await.unwrap();
        assert!(repo
            .content()
            .path_for(MediaKind::Image, &shared)
            .await
            .is_ok());

        repo.delete(&second.id).await.unwrap();
        assert!(repo.list().unwrap().is_empty());
        assert!(repo
            .content()
            .path_for(MediaKind::Image, &shared)
            .await
            .is_err());
        assert_eq!(repo.queue().pending_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn detaching_shared_media_keeps_it_for_other_notes() {
        let (_dir, repo) = setup().await;
        let (first, second, shared) = notes_sharing_one_image(&repo).await;

        repo.update(
            &first.id,
            NoteEdit {
                remove_images: vec![shared.clone()],
                ..NoteEdit::default()
            },
        )
        .await
        .unwrap();

        let loaded = repo.content().load(MediaKind::Image, &shared).await.unwrap();
        assert_eq!(loaded, b"same-bytes");
        assert_eq!(repo.enqueue_full_resync().await.unwrap(), 2);
        repo.delete(&second.id).await.unwrap();
    }

    #[tokio::test]
    async fn missing_note_is_not_found() {
        let (_dir, repo) = setup().await;
        let id = NoteId::new();
        assert!(matches!(repo.delete(&id).await, Err(Error::NotFound(_))));
        assert!(matches!(
            repo.update(&id, NoteEdit::default()).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn full_resync_queues_every_note() {
        let (_dir, repo) = setup().await;
        for text in ["one", "two", "three"] {
            repo.create(NoteDraft {
                text: text.to_string(),
                ..NoteDraft::default()
            })
            .await
            .unwrap();
        }
        let queue = repo.queue();
        let created = queue.pending().await.unwrap();
        queue.remove(&created).await.unwrap();

        assert_eq!(repo.enqueue_full_resync().await.unwrap(), 3);
        let pending = queue.pending().await.unwrap();
        assert_eq!(pending.len(), 3);
        assert!(pending.iter().all(|entry| entry.op_type == OpType::Update));
    }
}
