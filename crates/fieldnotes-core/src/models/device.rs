//! Device model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::util::now_millis;

/// Server-side identifier of a registered device row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceRecordId(Uuid);

impl DeviceRecordId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for DeviceRecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DeviceRecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DeviceRecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A registered client installation and its sync watermark
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceRecordId,
    pub owner_id: String,
    /// Client-supplied identifier, unique per owner
    pub device_id: String,
    pub platform: String,
    pub name: String,
    /// How far this device has consumed the change stream (Unix ms)
    pub sync_cursor: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Device {
    /// New device with its cursor at the epoch
    #[must_use]
    pub fn new(
        owner_id: impl Into<String>,
        device_id: impl Into<String>,
        platform: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let now = now_millis();
        Self {
            id: DeviceRecordId::new(),
            owner_id: owner_id.into(),
            device_id: device_id.into(),
            platform: platform.into(),
            name: name.into(),
            sync_cursor: 0,
            created_at: now,
            updated_at: now,
        }
    }
}
