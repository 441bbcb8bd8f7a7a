//! fieldnotes-core - Core library for fieldnotes
//!
//! This crate contains the shared models, the libSQL storage layer, and the
//! batch synchronization engine that reconciles device edits against the
//! authoritative note store.

pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{Device, Note, NoteId};
