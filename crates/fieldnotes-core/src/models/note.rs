//! Note model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::Location;
use crate::util::now_millis;

/// A unique identifier for a note, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NoteId(Uuid);

impl NoteId {
    /// Create a new unique note ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for NoteId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NoteId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A geotagged note owned by a single user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Unique, server-assigned identifier
    pub id: NoteId,
    /// Owning user (authenticated subject)
    pub owner_id: String,
    pub title: String,
    pub content: String,
    /// Where the note was taken, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    /// Client-assigned correlation id, stable across devices
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last modification timestamp (Unix ms), the LWW ordering key
    pub updated_at: i64,
    /// Tombstone timestamp (Unix ms); set means logically deleted
    #[serde(default)]
    pub deleted_at: Option<i64>,
}

impl Note {
    /// Create a new note stamped with the current time
    #[must_use]
    pub fn new(
        owner_id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        location: Option<Location>,
        client_id: Option<String>,
    ) -> Self {
        let now = now_millis();
        Self {
            id: NoteId::new(),
            owner_id: owner_id.into(),
            title: title.into(),
            content: content.into(),
            location,
            client_id,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Replace the editable fields and bump the modification timestamp
    pub fn update(&mut self, title: String, content: String, location: Option<Location>) {
        self.title = title;
        self.content = content;
        self.location = location;
        self.updated_at = self.next_mutation_at();
    }

    /// Tombstone the note; the deletion itself is a mutation
    pub fn soft_delete(&mut self) {
        let now = self.next_mutation_at();
        self.deleted_at = Some(now);
        self.updated_at = now;
    }

    /// Timestamp for the next local mutation, strictly after the current one
    /// so incremental fetches always pick it up.
    fn next_mutation_at(&self) -> i64 {
        now_millis().max(self.updated_at.saturating_add(1))
    }

    /// Whether the note carries a tombstone
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Whether the note belongs to `owner_id`
    #[must_use]
    pub fn is_owned_by(&self, owner_id: &str) -> bool {
        self.owner_id == owner_id
    }
}
