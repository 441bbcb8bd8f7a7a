//! Sync batch request and outcome models

use serde::{Deserialize, Serialize};

use super::{Location, Note, NoteId, SyncConflict};

/// A note snapshot as submitted by a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientNote {
    /// Correlation id assigned on the device
    pub client_id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub altitude: Option<f64>,
    #[serde(default)]
    pub accuracy: Option<f64>,
    /// Client-observed modification timestamp (Unix ms)
    pub updated_at: i64,
    #[serde(default)]
    pub is_deleted: bool,
}

impl ClientNote {
    #[must_use]
    pub fn location(&self) -> Option<Location> {
        Location::from_parts(self.latitude, self.longitude, self.altitude, self.accuracy)
    }

    /// Materialize a full note for `owner_id`.
    ///
    /// `existing` carries the stored identity and creation time when the
    /// correlation id is already known; otherwise a fresh id is assigned and
    /// the client timestamp doubles as creation time.
    #[must_use]
    pub fn to_note(&self, owner_id: &str, existing: Option<(NoteId, i64)>) -> Note {
        let (id, created_at) = existing.unwrap_or_else(|| (NoteId::new(), self.updated_at));
        Note {
            id,
            owner_id: owner_id.to_string(),
            title: self.title.clone(),
            content: self.content.clone(),
            location: self.location(),
            client_id: Some(self.client_id.clone()),
            created_at,
            updated_at: self.updated_at,
            deleted_at: self.is_deleted.then_some(self.updated_at),
        }
    }
}

/// One synchronization exchange submitted by a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncBatch {
    pub owner_id: String,
    pub device_id: String,
    /// Overrides the stored device cursor when present
    #[serde(default)]
    pub sync_cursor: Option<i64>,
    #[serde(default)]
    pub notes: Vec<ClientNote>,
}

/// Result of a completed batch sync
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncOutcome {
    /// Everything changed since the effective cursor, tombstones included
    pub server_notes: Vec<Note>,
    pub new_cursor: i64,
    pub conflicts: Vec<SyncConflict>,
}
