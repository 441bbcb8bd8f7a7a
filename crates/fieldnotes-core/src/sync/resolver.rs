//! Last-write-wins conflict resolution

use crate::models::{ClientNote, Note, Resolution};

/// Decide which version of a note survives.
///
/// The client wins only when its timestamp is strictly newer. Equal
/// timestamps keep the stored version, which makes replays no-ops.
#[must_use]
pub const fn resolve(server: &Note, client: &ClientNote) -> Resolution {
    if client.updated_at > server.updated_at {
        Resolution::ClientWins
    } else {
        Resolution::ServerWins
    }
}
