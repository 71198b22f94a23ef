//! File-backed storage for user-facing media.

mod content;

pub use content::ContentStore;
pub(crate) use content::{extension_of, sanitize_extension, write_atomic};
