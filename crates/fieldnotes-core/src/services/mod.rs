//! Application services shared by every client of the core crate.

mod database;
mod notes;

pub use database::DatabaseService;
pub use notes::{ListNotesInput, NoteInput, NoteService, NoteUpdate};
