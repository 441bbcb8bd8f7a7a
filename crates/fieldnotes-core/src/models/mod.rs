//! Data models for fieldnotes

mod batch;
mod device;
mod location;
mod note;
mod page;
mod sync_conflict;
pub mod validation;

pub use batch::{ClientNote, SyncBatch, SyncOutcome};
pub use device::{Device, DeviceRecordId};
pub use location::{BoundingBox, Location};
pub use note::{Note, NoteId};
pub use page::{PageInfo, PageParams, DEFAULT_PER_PAGE, MAX_PER_PAGE};
pub use sync_conflict::{Resolution, SyncConflict};
