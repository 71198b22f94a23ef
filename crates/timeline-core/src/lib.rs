//! timeline-core - Core library for Timeline
//!
//! Local-first notes with an offline sync subsystem: a durable mutation
//! queue, byte-budgeted batching, a token-refreshing sync client, and the
//! orchestrator that drains the queue and restores remote notes.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod queue;
pub mod services;
pub mod state;
pub mod storage;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{MediaKind, Note, NoteId};
