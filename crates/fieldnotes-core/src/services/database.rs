//! Shared database service wrapper used by the API server.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::{Database, DeviceRepository, LibSqlDeviceRepository, LibSqlNoteRepository};
use crate::models::{Device, Note, PageInfo, SyncBatch, SyncOutcome};
use crate::sync::{SyncCoordinator, DEFAULT_BATCH_LIMIT};
use crate::{NoteId, Result};

use super::{ListNotesInput, NoteInput, NoteService, NoteUpdate};

/// Thread-safe service for DB and repository operations.
///
/// The libSQL connection is single-writer, so every call takes the lock for
/// its full duration.
#[derive(Clone)]
pub struct DatabaseService {
    db: Arc<Mutex<Database>>,
    batch_limit: usize,
}

impl DatabaseService {
    /// Open a database service at the given filesystem path.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&db_path).await?;
        Ok(Self::from_database(db))
    }

    /// Open an in-memory database service (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self::from_database(db))
    }

    fn from_database(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            batch_limit: DEFAULT_BATCH_LIMIT,
        }
    }

    /// Cap the number of server changes returned per sync call.
    #[must_use]
    pub fn with_batch_limit(mut self, batch_limit: usize) -> Self {
        self.batch_limit = batch_limit.max(1);
        self
    }

    /// Run one device's batch sync.
    pub async fn batch_sync(&self, batch: SyncBatch) -> Result<SyncOutcome> {
        let db = self.db.lock().await;
        let notes = LibSqlNoteRepository::new(db.connection());
        let devices = LibSqlDeviceRepository::new(db.connection());
        SyncCoordinator::new(&notes, &devices)
            .with_batch_limit(self.batch_limit)
            .batch_sync(batch)
            .await
    }

    /// Register a device or refresh its metadata.
    pub async fn register_device(&self, device: &Device) -> Result<Device> {
        let db = self.db.lock().await;
        let repo = LibSqlDeviceRepository::new(db.connection());
        repo.register(device).await
    }

    /// List an owner's registered devices.
    pub async fn list_devices(&self, owner_id: &str) -> Result<Vec<Device>> {
        let db = self.db.lock().await;
        let repo = LibSqlDeviceRepository::new(db.connection());
        repo.list_by_owner(owner_id).await
    }

    /// Create a note, or return the existing one for a known `client_id`.
    pub async fn create_note(&self, owner_id: &str, input: NoteInput) -> Result<Note> {
        let db = self.db.lock().await;
        let repo = LibSqlNoteRepository::new(db.connection());
        NoteService::new(&repo).create(owner_id, input).await
    }

    /// List live notes newest-first.
    pub async fn list_notes(
        &self,
        owner_id: &str,
        input: ListNotesInput,
    ) -> Result<(Vec<Note>, PageInfo)> {
        let db = self.db.lock().await;
        let repo = LibSqlNoteRepository::new(db.connection());
        NoteService::new(&repo).list(owner_id, input).await
    }

    /// Fetch a note by id.
    pub async fn get_note(&self, owner_id: &str, id: &NoteId) -> Result<Note> {
        let db = self.db.lock().await;
        let repo = LibSqlNoteRepository::new(db.connection());
        NoteService::new(&repo).get(owner_id, id).await
    }

    /// Apply a partial update.
    pub async fn update_note(
        &self,
        owner_id: &str,
        id: &NoteId,
        changes: NoteUpdate,
    ) -> Result<Note> {
        let db = self.db.lock().await;
        let repo = LibSqlNoteRepository::new(db.connection());
        NoteService::new(&repo).update(owner_id, id, changes).await
    }

    /// Soft-delete a note.
    pub async fn delete_note(&self, owner_id: &str, id: &NoteId) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlNoteRepository::new(db.connection());
        NoteService::new(&repo).delete(owner_id, id).await
    }
}
