//! Services shared by front ends

mod notes;

pub use notes::{NoteDraft, NoteEdit, NotesRepository};
