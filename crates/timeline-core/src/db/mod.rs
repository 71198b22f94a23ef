//! Local note persistence

mod connection;
mod migrations;
mod repository;

pub use connection::Database;
pub use repository::{NoteStore, SqliteNoteStore};
