//! Data models for Timeline

mod media;
mod note;
mod tag;

pub use media::MediaKind;
pub use note::{Note, NoteId};
pub use tag::normalize_tags;
