//! Batch synchronization between devices and the note store.
//!
//! A device submits the notes it changed since its last sync. The coordinator
//! resolves each one against the stored version with last-write-wins on
//! `updated_at`, commits the winners in one transaction, and hands back
//! everything the device has not seen yet along with a new cursor.

mod coordinator;
mod resolver;

pub use coordinator::{SyncCoordinator, DEFAULT_BATCH_LIMIT};
pub use resolver::resolve;
