//! Media kinds attached to notes

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of binary media a note can reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Still image (photo, screenshot)
    Image,
    /// Audio recording
    Audio,
}

impl MediaKind {
    /// Directory name used by file-backed stores for this kind
    #[must_use]
    pub const fn folder_name(self) -> &'static str {
        match self {
            Self::Image => "Images",
            Self::Audio => "Audio",
        }
    }

    /// Extension used when none can be derived from a source name
    #[must_use]
    pub const fn default_extension(self) -> &'static str {
        match self {
            Self::Image => "jpg",
            Self::Audio => "m4a",
        }
    }

    /// Wire name (`"image"` / `"audio"`)
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Audio => "audio",
        }
    }

    /// MIME type for a file extension of this kind.
    ///
    /// Unknown extensions fall back to `image/jpeg` or `audio/m4a`.
    #[must_use]
    pub fn content_type_for(self, extension: &str) -> &'static str {
        match (self, extension.to_ascii_lowercase().as_str()) {
            (Self::Image, "png") => "image/png",
            (Self::Image, "heic") => "image/heic",
            (Self::Image, "gif") => "image/gif",
            (Self::Image, "webp") => "image/webp",
            (Self::Image, _) => "image/jpeg",
            (Self::Audio, "wav") => "audio/wav",
            (Self::Audio, "mp3") => "audio/mpeg",
            (Self::Audio, "aac") => "audio/aac",
            (Self::Audio, _) => "audio/m4a",
        }
    }

    /// Extension for a MIME type of this kind, used when a restored blob has
    /// no filename.
    #[must_use]
    pub fn extension_for(self, content_type: &str) -> &'static str {
        let content_type = content_type.to_ascii_lowercase();
        match self {
            Self::Image if content_type.contains("png") => "png",
            Self::Image if content_type.contains("heic") => "heic",
            Self::Audio if content_type.contains("wav") => "wav",
            Self::Audio if content_type.contains("mpeg") => "mp3",
            _ => self.default_extension(),
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_defaults() {
        assert_eq!(MediaKind::Image.content_type_for("jpg"), "image/jpeg");
        assert_eq!(MediaKind::Image.content_type_for("PNG"), "image/png");
        assert_eq!(MediaKind::Image.content_type_for("bin"), "image/jpeg");
        assert_eq!(MediaKind::Audio.content_type_for("m4a"), "audio/m4a");
        assert_eq!(MediaKind::Audio.content_type_for("wav"), "audio/wav");
    }

    #[test]
    fn test_extension_for_content_type() {
        assert_eq!(MediaKind::Image.extension_for("image/png"), "png");
        assert_eq!(MediaKind::Image.extension_for("image/jpeg"), "jpg");
        assert_eq!(MediaKind::Audio.extension_for("audio/m4a"), "m4a");
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(serde_json::to_string(&MediaKind::Image).unwrap(), "\"image\"");
        assert_eq!(MediaKind::Audio.to_string(), "audio");
    }
}
