//! Input validation shared by note creation, edits, and sync batches

use crate::error::{Error, Result};

use super::{BoundingBox, ClientNote, Location};

pub const MAX_TITLE_CHARS: usize = 255;
pub const MAX_CLIENT_ID_CHARS: usize = 36;
pub const MAX_DEVICE_ID_CHARS: usize = 255;

pub fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(Error::InvalidInput("title must not be empty".into()));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(Error::InvalidInput(format!(
            "title must be at most {MAX_TITLE_CHARS} characters"
        )));
    }
    Ok(())
}

pub fn validate_client_id(client_id: &str) -> Result<()> {
    if client_id.trim().is_empty() {
        return Err(Error::InvalidInput("client_id must not be empty".into()));
    }
    if client_id.chars().count() > MAX_CLIENT_ID_CHARS {
        return Err(Error::InvalidInput(format!(
            "client_id must be at most {MAX_CLIENT_ID_CHARS} characters"
        )));
    }
    Ok(())
}

pub fn validate_device_id(device_id: &str) -> Result<()> {
    if device_id.trim().is_empty() {
        return Err(Error::InvalidInput("device_id must not be empty".into()));
    }
    if device_id.chars().count() > MAX_DEVICE_ID_CHARS {
        return Err(Error::InvalidInput(format!(
            "device_id must be at most {MAX_DEVICE_ID_CHARS} characters"
        )));
    }
    Ok(())
}

pub fn validate_location(location: &Location) -> Result<()> {
    if location.is_valid() {
        Ok(())
    } else {
        Err(Error::InvalidInput(
            "location must have latitude in [-90, 90], longitude in [-180, 180] and accuracy >= 0"
                .into(),
        ))
    }
}

pub fn validate_bounding_box(bbox: &BoundingBox) -> Result<()> {
    if bbox.is_valid() {
        Ok(())
    } else {
        Err(Error::InvalidInput("invalid bounding box".into()))
    }
}

/// Validate one submitted snapshot before any part of its batch is applied
pub fn validate_client_note(note: &ClientNote) -> Result<()> {
    validate_client_id(&note.client_id)?;
    validate_title(&note.title)
        .map_err(|error| Error::InvalidInput(format!("note {}: {error}", note.client_id)))?;
    if note.latitude.is_some() != note.longitude.is_some() {
        return Err(Error::InvalidInput(format!(
            "note {}: latitude and longitude must be provided together",
            note.client_id
        )));
    }
    if let Some(location) = note.location() {
        validate_location(&location)?;
    }
    Ok(())
}
