//! Database layer for fieldnotes

mod connection;
mod device_repository;
mod migrations;
mod note_repository;

pub use connection::Database;
pub use device_repository::{DeviceRepository, LibSqlDeviceRepository};
pub use note_repository::{LibSqlNoteRepository, NoteListParams, NoteRepository};
