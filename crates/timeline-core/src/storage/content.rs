//! Content store for note media.
//!
//! Images and audio live in per-kind directories under a root. Each blob is
//! addressed by an opaque single-segment path (a file name) which notes keep
//! in their `image_paths` / `audio_paths`. The store has no knowledge of sync.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::models::MediaKind;
use crate::util::sha256_hex;
use crate::{Error, Result};

/// File-backed media store keyed by opaque path strings.
#[derive(Debug, Clone)]
pub struct ContentStore {
    root: PathBuf,
}

impl ContentStore {
    /// Open (creating if needed) a content store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let store = Self { root: root.into() };
        for kind in [MediaKind::Image, MediaKind::Audio] {
            fs::create_dir_all(store.directory(kind)).await?;
        }
        Ok(store)
    }

    /// Root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding blobs of `kind`.
    #[must_use]
    pub fn directory(&self, kind: MediaKind) -> PathBuf {
        self.root.join(kind.folder_name())
    }

    /// Save bytes under a fresh random name and return the new path.
    pub async fn save(
        &self,
        kind: MediaKind,
        bytes: &[u8],
        extension: Option<&str>,
    ) -> Result<String> {
        let extension = extension
            .map(sanitize_extension)
            .filter(|ext| !ext.is_empty())
            .unwrap_or_else(|| kind.default_extension().to_string());
        let name = format!("{}.{extension}", Uuid::new_v4());
        write_atomic(&self.directory(kind).join(&name), bytes).await?;
        tracing::debug!("Saved {} bytes of {kind} media as {name}", bytes.len());
        Ok(name)
    }

    /// Copy an external file into the store, keeping its extension.
    pub async fn import_file(&self, kind: MediaKind, source: &Path) -> Result<String> {
        let bytes = fs::read(source).await.map_err(|error| {
            if error.kind() == std::io::ErrorKind::NotFound {
                Error::MissingMedia(source.display().to_string())
            } else {
                Error::Io(error)
            }
        })?;
        let extension = source.extension().and_then(|ext| ext.to_str());
        self.save(kind, &bytes, extension).await
    }

    /// Read a blob.
    pub async fn load(&self, kind: MediaKind, path: &str) -> Result<Vec<u8>> {
        let full = self.path_for(kind, path).await?;
        Ok(fs::read(full).await?)
    }

    /// Resolve a store path to an existing file on disk.
    pub async fn path_for(&self, kind: MediaKind, path: &str) -> Result<PathBuf> {
        let name = validate_path(path)?;
        let full = self.directory(kind).join(name);
        if fs::try_exists(&full).await? {
            Ok(full)
        } else {
            Err(Error::MissingMedia(format!("{}/{name}", kind.folder_name())))
        }
    }

    /// Delete blobs. Paths that no longer exist are skipped.
    pub async fn delete(&self, kind: MediaKind, paths: &[String]) -> Result<()> {
        for path in paths {
            let name = validate_path(path)?;
            match fs::remove_file(self.directory(kind).join(name)).await {
                Ok(()) => tracing::debug!("Deleted {kind} media {name}"),
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
                Err(error) => return Err(error.into()),
            }
        }
        Ok(())
    }

    /// Write bytes under a preferred file name and return the name used.
    ///
    /// When the name is empty, or already taken by a different blob, a fresh
    /// random name with the same extension is used instead. An existing file
    /// with identical content is reused as-is.
    pub async fn write_named(
        &self,
        kind: MediaKind,
        preferred: &str,
        bytes: &[u8],
        fallback_extension: &str,
    ) -> Result<String> {
        let directory = self.directory(kind);
        if let Ok(name) = validate_path(preferred) {
            let target = directory.join(name);
            if !fs::try_exists(&target).await? {
                write_atomic(&target, bytes).await?;
                return Ok(name.to_string());
            }
            if fs::read(&target).await? == bytes {
                return Ok(name.to_string());
            }
        }

        let extension = extension_of(preferred)
            .map(sanitize_extension)
            .filter(|ext| !ext.is_empty())
            .unwrap_or_else(|| sanitize_extension(fallback_extension));
        let name = format!("{}.{extension}", Uuid::new_v4());
        write_atomic(&directory.join(&name), bytes).await?;
        Ok(name)
    }

    /// Map of SHA-256 checksum to path for every blob of `kind`.
    ///
    /// When several files share content the lexicographically first name wins.
    pub async fn checksum_index(&self, kind: MediaKind) -> Result<HashMap<String, String>> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(self.directory(kind)).await?;
        while let Some(entry) = entries.next_entry().await? {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.starts_with('.') || !entry.file_type().await?.is_file() {
                continue;
            }
            names.push(name);
        }
        names.sort();

        let mut index = HashMap::with_capacity(names.len());
        for name in names {
            let bytes = fs::read(self.directory(kind).join(&name)).await?;
            index.entry(sha256_hex(&bytes)).or_insert(name);
        }
        Ok(index)
    }
}

/// Write `bytes` to `path` so readers observe either the old file, nothing,
/// or the complete new content.
///
/// Data goes to a hidden sibling temp file which is fsynced and then renamed
/// over the target.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| Error::InvalidInput(format!("{} has no file name", path.display())))?;
    let temp_path = path.with_file_name(format!(".{file_name}.{}.tmp", Uuid::new_v4()));

    let written = async {
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        fs::rename(&temp_path, path).await
    }
    .await;

    if let Err(error) = written {
        if let Err(cleanup) = fs::remove_file(&temp_path).await {
            tracing::warn!("Failed to remove temp file {}: {cleanup}", temp_path.display());
        }
        return Err(error.into());
    }
    Ok(())
}

/// Extension of a file name, if any.
pub(crate) fn extension_of(name: &str) -> Option<&str> {
    name.rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty())
}

fn validate_path(path: &str) -> Result<&str> {
    let name = path.trim();
    if name.is_empty()
        || name.starts_with('.')
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
    {
        return Err(Error::InvalidInput(format!("Invalid media path: {path:?}")));
    }
    Ok(name)
}

pub(crate) fn sanitize_extension(extension: &str) -> String {
    extension
        .trim()
        .trim_start_matches('.')
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let store = ContentStore::open(dir.path()).await.unwrap();

        let path = store
            .save(MediaKind::Image, b"pixels", Some("PNG"))
            .await
            .unwrap();
        assert!(path.ends_with(".png"));
        assert_eq!(store.load(MediaKind::Image, &path).await.unwrap(), b"pixels");
    }

    #[tokio::test]
    async fn failed_atomic_write_leaves_no_residue() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("absent").join("blob.bin");

        assert!(write_atomic(&target, b"data").await.is_err());
        assert!(!target.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn save_without_extension_uses_kind_default() {
        let dir = tempdir().unwrap();
        let store = ContentStore::open(dir.path()).await.unwrap();

        let path = store.save(MediaKind::Audio, b"wave", None).await.unwrap();
        assert!(path.ends_with(".m4a"));
    }

    #[tokio::test]
    async fn path_for_missing_file_is_missing_media() {
        let dir = tempdir().unwrap();
        let store = ContentStore::open(dir.path()).await.unwrap();

        let error = store
            .path_for(MediaKind::Image, "absent.jpg")
            .await
            .unwrap_err();
        assert!(matches!(error, Error::MissingMedia(_)));
    }

    #[tokio::test]
    async fn rejects_path_traversal() {
        let dir = tempdir().unwrap();
        let store = ContentStore::open(dir.path()).await.unwrap();

        for bad in ["../secret", "a/b.jpg", "..", ""] {
            let error = store.load(MediaKind::Image, bad).await.unwrap_err();
            assert!(matches!(error, Error::InvalidInput(_)), "{bad} accepted");
        }
    }

    #[tokio::test]
    async fn delete_ignores_missing_files() {
        let dir = tempdir().unwrap();
        let store = ContentStore::open(dir.path()).await.unwrap();
        let path = store.save(MediaKind::Image, b"x", None).await.unwrap();

        store
            .delete(MediaKind::Image, &[path.clone(), "ghost.jpg".to_string()])
            .await
            .unwrap();
        assert!(store.path_for(MediaKind::Image, &path).await.is_err());
    }

    #[tokio::test]
    async fn write_named_avoids_clobbering_different_content() {
        let dir = tempdir().unwrap();
        let store = ContentStore::open(dir.path()).await.unwrap();

        let first = store
            .write_named(MediaKind::Image, "photo.jpg", b"one", "jpg")
            .await
            .unwrap();
        let same = store
            .write_named(MediaKind::Image, "photo.jpg", b"one", "jpg")
            .await
            .unwrap();
        let other = store
            .write_named(MediaKind::Image, "photo.jpg", b"two", "jpg")
            .await
            .unwrap();

        assert_eq!(first, "photo.jpg");
        assert_eq!(same, "photo.jpg");
        assert_ne!(other, "photo.jpg");
        assert!(other.ends_with(".jpg"));
        assert_eq!(store.load(MediaKind::Image, &first).await.unwrap(), b"one");
    }

    #[tokio::test]
    async fn checksum_index_maps_content_hashes() {
        let dir = tempdir().unwrap();
        let store = ContentStore::open(dir.path()).await.unwrap();
        let path = store.save(MediaKind::Image, b"hello", None).await.unwrap();

        let index = store.checksum_index(MediaKind::Image).await.unwrap();
        assert_eq!(
            index.get("2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"),
            Some(&path)
        );
        assert!(store
            .checksum_index(MediaKind::Audio)
            .await
            .unwrap()
            .is_empty());
    }
}
