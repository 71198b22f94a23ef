//! Durable mutation queue.
//!
//! Every pending note mutation is one JSON record in the queue directory,
//! named `op_<stamp>_<opId>.json` where the zero-padded stamp increases
//! strictly, so lexicographic order is enqueue order. Media referenced by a
//! mutation is copied into the queue's own `Media/` directory; the content
//! store can delete or replace its files without touching in-flight data.
//!
//! Records and media copies are each written via temp file plus rename, so
//! `pending`, `enqueue_*` and `remove` can interleave freely.

mod entry;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use tokio::fs;
use uuid::Uuid;

use crate::models::{MediaKind, Note};
use crate::storage::{extension_of, sanitize_extension, write_atomic, ContentStore};
use crate::util::sha256_hex;
use crate::{Error, Result};

pub use entry::{OpType, QueueEntry, QueuedMedia, QueuedNote};

const RECORD_PREFIX: &str = "op_";
const RECORD_SUFFIX: &str = ".json";

/// Append-only log of note mutations awaiting upload
#[derive(Debug)]
pub struct MutationQueue {
    dir: PathBuf,
    media_dir: PathBuf,
    content: ContentStore,
    last_stamp: AtomicU64,
}

impl MutationQueue {
    /// Open the queue under `base` (`base/SyncQueue`), creating it if needed.
    ///
    /// Crash residue is swept: leftover temp files, and media copies no
    /// record references.
    pub async fn open(base: impl AsRef<Path>, content: ContentStore) -> Result<Self> {
        let dir = base.as_ref().join("SyncQueue");
        let media_dir = dir.join("Media");
        fs::create_dir_all(&media_dir).await?;

        let queue = Self {
            dir,
            media_dir,
            content,
            last_stamp: AtomicU64::new(0),
        };
        let names = queue.record_names().await?;
        let newest = names.iter().filter_map(|name| record_stamp(name)).max();
        queue.last_stamp.store(newest.unwrap_or(0), Ordering::SeqCst);
        queue.sweep().await?;

        tracing::debug!(
            "Opened mutation queue at {} with {} pending",
            queue.dir.display(),
            names.len()
        );
        Ok(queue)
    }

    /// Directory holding queue records
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.dir
    }

    /// Queue a create carrying all of the note's media
    pub async fn enqueue_create(&self, note: &Note) -> Result<QueueEntry> {
        self.enqueue(OpType::Create, note, &note.image_paths, &note.audio_paths, false)
            .await
    }

    /// Queue an update carrying only the given media paths
    pub async fn enqueue_update(
        &self,
        note: &Note,
        image_paths: &[String],
        audio_paths: &[String],
    ) -> Result<QueueEntry> {
        self.enqueue(OpType::Update, note, image_paths, audio_paths, false)
            .await
    }

    /// Queue a delete; the snapshot carries `deletedAt` and all media
    pub async fn enqueue_delete(&self, note: &Note) -> Result<QueueEntry> {
        self.enqueue(OpType::Delete, note, &note.image_paths, &note.audio_paths, true)
            .await
    }

    /// All pending entries, oldest first.
    ///
    /// Records removed while the directory is being read are skipped.
    pub async fn pending(&self) -> Result<Vec<QueueEntry>> {
        let names = self.record_names().await?;
        let mut entries = Vec::with_capacity(names.len());
        for name in names {
            let bytes = match fs::read(self.dir.join(&name)).await {
                Ok(bytes) => bytes,
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => continue,
                Err(error) => return Err(error.into()),
            };
            entries.push(serde_json::from_slice(&bytes)?);
        }
        Ok(entries)
    }

    /// Number of pending entries
    pub async fn pending_count(&self) -> Result<usize> {
        Ok(self.record_names().await?.len())
    }

    /// Delete the records and media copies of `entries`.
    ///
    /// Entries that are already gone are skipped.
    pub async fn remove(&self, entries: &[QueueEntry]) -> Result<()> {
        let names = self.record_names().await?;
        let mut removed = 0usize;
        for entry in entries {
            let suffix = format!("_{}{RECORD_SUFFIX}", entry.op_id);
            for name in names.iter().filter(|name| name.ends_with(&suffix)) {
                if remove_if_exists(&self.dir.join(name)).await? {
                    removed += 1;
                }
            }
            for media in &entry.media {
                if let Ok(path) = self.media_path(media) {
                    remove_if_exists(&path).await?;
                }
            }
        }
        tracing::debug!("Removed {removed} of {} queue entries", entries.len());
        Ok(())
    }

    /// Read the bytes of a queued media copy
    pub async fn load_media(&self, media: &QueuedMedia) -> Result<Vec<u8>> {
        let path = self.media_path(media)?;
        fs::read(&path).await.map_err(|error| {
            if error.kind() == std::io::ErrorKind::NotFound {
                Error::MissingMedia(format!("SyncQueue/Media/{}", media.local_path))
            } else {
                Error::Io(error)
            }
        })
    }

    fn media_path(&self, media: &QueuedMedia) -> Result<PathBuf> {
        let name = media.local_path.as_str();
        if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) {
            return Err(Error::InvalidInput(format!(
                "Invalid queued media path: {name:?}"
            )));
        }
        Ok(self.media_dir.join(name))
    }

    async fn enqueue(
        &self,
        op_type: OpType,
        note: &Note,
        image_paths: &[String],
        audio_paths: &[String],
        deleted: bool,
    ) -> Result<QueueEntry> {
        let op_id = Uuid::new_v4().to_string();
        let mut copied = Vec::new();

        let result = async {
            let mut media = Vec::with_capacity(image_paths.len() + audio_paths.len());
            for (kind, paths) in [
                (MediaKind::Image, image_paths),
                (MediaKind::Audio, audio_paths),
            ] {
                for path in paths {
                    media.push(self.copy_media(note, kind, path, &mut copied).await?);
                }
            }

            let entry = QueueEntry {
                op_id: op_id.clone(),
                op_type,
                note: QueuedNote::snapshot(note, deleted.then(Utc::now)),
                media,
            };
            let name = format!(
                "{RECORD_PREFIX}{:020}_{op_id}{RECORD_SUFFIX}",
                self.next_stamp()
            );
            write_atomic(&self.dir.join(name), &serde_json::to_vec(&entry)?).await?;
            Ok::<_, Error>(entry)
        }
        .await;

        match result {
            Ok(entry) => {
                tracing::info!(
                    "Queued {} for note {} with {} media",
                    op_type.as_str(),
                    note.id,
                    entry.media.len()
                );
                Ok(entry)
            }
            Err(error) => {
                for path in copied {
                    if let Err(cleanup) = fs::remove_file(&path).await {
                        tracing::warn!("Failed to remove queued media {}: {cleanup}", path.display());
                    }
                }
                tracing::warn!(
                    "Failed to queue {} for note {}: {error}",
                    op_type.as_str(),
                    note.id
                );
                Err(error)
            }
        }
    }

    async fn copy_media(
        &self,
        note: &Note,
        kind: MediaKind,
        path: &str,
        copied: &mut Vec<PathBuf>,
    ) -> Result<QueuedMedia> {
        let bytes = self.content.load(kind, path).await?;
        let extension = extension_of(path)
            .map(sanitize_extension)
            .filter(|ext| !ext.is_empty())
            .unwrap_or_else(|| kind.default_extension().to_string());

        let id = Uuid::new_v4().to_string();
        let filename = format!("{id}.{extension}");
        let dest = self.media_dir.join(&filename);
        write_atomic(&dest, &bytes).await?;
        copied.push(dest);

        Ok(QueuedMedia {
            id,
            note_id: note.id.clone(),
            kind,
            content_type: kind.content_type_for(&extension).to_string(),
            checksum: sha256_hex(&bytes),
            local_path: filename.clone(),
            filename,
        })
    }

    /// Microseconds since epoch, strictly greater than any stamp handed out
    fn next_stamp(&self) -> u64 {
        let now = u64::try_from(Utc::now().timestamp_micros()).unwrap_or(0);
        let mut current = self.last_stamp.load(Ordering::SeqCst);
        loop {
            let next = now.max(current + 1);
            match self.last_stamp.compare_exchange(
                current,
                next,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return next,
                Err(actual) => current = actual,
            }
        }
    }

    /// Sorted names of all queue records
    async fn record_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if let Ok(name) = entry.file_name().into_string() {
                if name.starts_with(RECORD_PREFIX) && name.ends_with(RECORD_SUFFIX) {
                    names.push(name);
                }
            }
        }
        names.sort();
        Ok(names)
    }

    async fn sweep(&self) -> Result<()> {
        for dir in [&self.dir, &self.media_dir] {
            let mut entries = fs::read_dir(dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name();
                if name.to_string_lossy().ends_with(".tmp") {
                    remove_if_exists(&entry.path()).await?;
                }
            }
        }

        let referenced: HashSet<String> = match self.pending().await {
            Ok(entries) => entries
                .into_iter()
                .flat_map(|entry| entry.media.into_iter().map(|media| media.local_path))
                .collect(),
            Err(error) => {
                tracing::warn!("Skipping orphan media sweep, unreadable queue record: {error}");
                return Ok(());
            }
        };

        let mut orphans = Vec::new();
        let mut entries = fs::read_dir(&self.media_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !referenced.contains(&name) {
                orphans.push(entry.path());
            }
        }
        for path in &orphans {
            remove_if_exists(path).await?;
        }
        if !orphans.is_empty() {
            tracing::info!("Removed {} orphaned queue media files", orphans.len());
        }
        Ok(())
    }
}

fn record_stamp(name: &str) -> Option<u64> {
    name.strip_prefix(RECORD_PREFIX)?
        .split_once('_')?
        .0
        .parse()
        .ok()
}

async fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(error) => Err(error.into()),
    }
}
