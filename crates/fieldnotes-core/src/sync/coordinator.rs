//! Batch sync coordinator

use std::collections::HashMap;

use crate::db::{DeviceRepository, NoteRepository};
use crate::error::{Error, Result};
use crate::models::{Note, Resolution, SyncBatch, SyncConflict, SyncOutcome};
use crate::util::{now_millis, owner_fingerprint};

use super::resolve;

/// Maximum number of server changes returned by one sync call
pub const DEFAULT_BATCH_LIMIT: usize = 1000;

/// Runs one device's sync exchange against a note store and device registry
pub struct SyncCoordinator<'a, N, D> {
    notes: &'a N,
    devices: &'a D,
    batch_limit: usize,
}

impl<'a, N, D> SyncCoordinator<'a, N, D>
where
    N: NoteRepository,
    D: DeviceRepository,
{
    pub const fn new(notes: &'a N, devices: &'a D) -> Self {
        Self {
            notes,
            devices,
            batch_limit: DEFAULT_BATCH_LIMIT,
        }
    }

    /// Cap the server delta per call; zero is treated as one
    #[must_use]
    pub fn with_batch_limit(mut self, batch_limit: usize) -> Self {
        self.batch_limit = batch_limit.max(1);
        self
    }

    /// Reconcile a device's submitted notes and return what it has missed.
    ///
    /// Storage calls run strictly in order: fetch the delta, commit the
    /// winning client notes, then advance the device cursor. A failure at
    /// any step returns before the cursor moves, so resubmitting the same
    /// batch is always safe.
    pub async fn batch_sync(&self, batch: SyncBatch) -> Result<SyncOutcome> {
        let owner = owner_fingerprint(&batch.owner_id);

        let device = self
            .devices
            .get_by_owner_and_device_id(&batch.owner_id, &batch.device_id)
            .await?
            .ok_or_else(|| Error::DeviceNotFound(batch.device_id.clone()))?;
        let cursor = batch.sync_cursor.unwrap_or(device.sync_cursor);

        // One extra row tells us whether a backlog remains
        let mut server_notes = self
            .notes
            .fetch_modified_since(&batch.owner_id, cursor, self.batch_limit.saturating_add(1))
            .await?;
        let backlog_cursor = match hold_back_backlog(&mut server_notes, self.batch_limit) {
            None => None,
            Some(Backlog::Resume(resume_at)) => Some(resume_at),
            Some(Backlog::TieRun(updated_at)) => {
                // The cap falls inside one timestamp; deliver the whole run so
                // the cursor can move past it without losing any of it.
                server_notes = self
                    .notes
                    .fetch_modified_at(&batch.owner_id, updated_at)
                    .await?;
                Some(updated_at)
            }
        };

        let index: HashMap<&str, &Note> = server_notes
            .iter()
            .filter_map(|note| note.client_id.as_deref().map(|client_id| (client_id, note)))
            .collect();

        let mut staged = Vec::new();
        let mut conflicts = Vec::new();
        for client in &batch.notes {
            if client.client_id.is_empty() {
                tracing::debug!(device = %batch.device_id, "Skipping client note without client_id");
                continue;
            }

            let Some(server) = index.get(client.client_id.as_str()) else {
                staged.push(client.to_note(&batch.owner_id, None));
                continue;
            };

            let resolution = resolve(server, client);
            tracing::debug!(
                owner,
                client_id = %client.client_id,
                client_updated_at = client.updated_at,
                server_updated_at = server.updated_at,
                %resolution,
                "Resolved sync conflict"
            );

            if resolution == Resolution::ClientWins {
                staged.push(client.to_note(&batch.owner_id, Some((server.id, server.created_at))));
            }
            conflicts.push(SyncConflict {
                client_id: client.client_id.clone(),
                resolution,
                server_version: (*server).clone(),
            });
        }

        let new_cursor = backlog_cursor
            .unwrap_or_else(|| now_millis().max(cursor).max(device.sync_cursor));

        let applied = self.notes.batch_upsert(&staged).await?;
        self.devices.update_cursor(&device, new_cursor).await?;

        tracing::info!(
            owner,
            device = %batch.device_id,
            received = batch.notes.len(),
            staged = staged.len(),
            applied,
            conflicts = conflicts.len(),
            delta = server_notes.len(),
            backlog = backlog_cursor.is_some(),
            new_cursor,
            "Batch sync completed"
        );

        Ok(SyncOutcome {
            server_notes,
            new_cursor,
            conflicts,
        })
    }
}

/// Where a capped delta resumes on the next call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backlog {
    /// Resume after this timestamp; everything up to it was delivered
    Resume(i64),
    /// Every fetched note shares this timestamp and more of them are pending
    TieRun(i64),
}

/// Trim an over-fetched delta to `limit` notes.
///
/// Notes that share a timestamp with the first undelivered one are held back
/// with it, since a cursor cannot split a timestamp. When that would leave
/// nothing to deliver the delta is one tie run larger than the cap.
fn hold_back_backlog(delta: &mut Vec<Note>, limit: usize) -> Option<Backlog> {
    let boundary = delta.get(limit)?.updated_at;
    delta.truncate(limit);

    match delta.iter().rposition(|note| note.updated_at < boundary) {
        Some(last) => {
            delta.truncate(last + 1);
            Some(Backlog::Resume(delta[last].updated_at))
        }
        None => Some(Backlog::TieRun(boundary)),
    }
}
