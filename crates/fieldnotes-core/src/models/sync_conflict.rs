//! Sync conflict model

use serde::{Deserialize, Serialize};
use std::fmt;

use super::Note;

/// Which side of a correlation-id collision was kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Client snapshot is strictly newer and replaces the stored note
    ClientWins,
    /// Stored note is kept; client should adopt the server version
    ServerWins,
}

impl Resolution {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ClientWins => "client_wins",
            Self::ServerWins => "server_wins",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conflict reported back to the device for one submitted note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConflict {
    /// Correlation id shared by both versions
    pub client_id: String,
    pub resolution: Resolution,
    /// Stored snapshot the client version was compared against
    pub server_version: Note,
}
