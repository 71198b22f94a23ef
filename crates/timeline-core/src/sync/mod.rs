//! Offline sync with the notes service.
//!
//! The [`SyncOrchestrator`] drains the mutation queue through the
//! [`Batcher`] and [`SyncClient`], and drives the restore flow.

mod batcher;
mod client;
mod error;
mod orchestrator;
mod wire;

pub use batcher::Batcher;
pub use client::SyncClient;
pub use error::{BatchError, SyncError, SyncResult};
pub use orchestrator::{RestoreReport, SyncOrchestrator, SyncReport};
pub use wire::{
    MediaPayload, NotePayload, RestoreResponse, SyncNoteResult, SyncOperation, SyncRequest,
    SyncResponse,
};
