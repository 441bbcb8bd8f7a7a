//! Device repository implementation

use crate::error::{Error, Result};
use crate::models::Device;
use crate::util::now_millis;
use libsql::{Connection, Value};

const DEVICE_COLUMNS: &str =
    "id, owner_id, device_id, platform, name, sync_cursor, created_at, updated_at";

/// Trait for device registry operations (async)
#[allow(async_fn_in_trait)]
pub trait DeviceRepository {
    /// Register a device, or refresh its metadata if `(owner, device_id)` exists.
    ///
    /// An existing device keeps its record id and sync cursor. Returns the
    /// stored row.
    async fn register(&self, device: &Device) -> Result<Device>;

    /// Look up a device by owner and client-supplied identifier
    async fn get_by_owner_and_device_id(
        &self,
        owner_id: &str,
        device_id: &str,
    ) -> Result<Option<Device>>;

    /// Advance the stored cursor to `cursor`; never moves it backwards
    async fn update_cursor(&self, device: &Device, cursor: i64) -> Result<()>;

    /// All devices registered by an owner
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Device>>;
}

/// libSQL implementation of `DeviceRepository`
pub struct LibSqlDeviceRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlDeviceRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_device(row: &libsql::Row) -> Result<Device> {
        let id: String = row.get(0)?;
        let id = id
            .parse()
            .map_err(|_| Error::Database(format!("Invalid device ID in storage: {id}")))?;
        Ok(Device {
            id,
            owner_id: row.get(1)?,
            device_id: row.get(2)?,
            platform: row.get(3)?,
            name: row.get(4)?,
            sync_cursor: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }
}

impl DeviceRepository for LibSqlDeviceRepository<'_> {
    async fn register(&self, device: &Device) -> Result<Device> {
        self.conn
            .execute(
                &format!(
                    "INSERT INTO devices ({DEVICE_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                     ON CONFLICT (owner_id, device_id) DO UPDATE SET
                        platform = excluded.platform,
                        name = excluded.name,
                        updated_at = ?9"
                ),
                [
                    Value::Text(device.id.as_str()),
                    Value::Text(device.owner_id.clone()),
                    Value::Text(device.device_id.clone()),
                    Value::Text(device.platform.clone()),
                    Value::Text(device.name.clone()),
                    Value::Integer(device.sync_cursor),
                    Value::Integer(device.created_at),
                    Value::Integer(device.updated_at),
                    Value::Integer(now_millis()),
                ],
            )
            .await?;

        self.get_by_owner_and_device_id(&device.owner_id, &device.device_id)
            .await?
            .ok_or_else(|| Error::DeviceNotFound(device.device_id.clone()))
    }

    async fn get_by_owner_and_device_id(
        &self,
        owner_id: &str,
        device_id: &str,
    ) -> Result<Option<Device>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {DEVICE_COLUMNS} FROM devices WHERE owner_id = ? AND device_id = ?"
                ),
                [owner_id, device_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_device(&row)?)),
            None => Ok(None),
        }
    }

    async fn update_cursor(&self, device: &Device, cursor: i64) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "UPDATE devices
                 SET sync_cursor = MAX(sync_cursor, ?2), updated_at = ?3
                 WHERE id = ?1",
                [
                    Value::Text(device.id.as_str()),
                    Value::Integer(cursor),
                    Value::Integer(now_millis()),
                ],
            )
            .await?;

        if rows == 0 {
            return Err(Error::DeviceNotFound(device.device_id.clone()));
        }
        Ok(())
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Device>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {DEVICE_COLUMNS} FROM devices WHERE owner_id = ? ORDER BY created_at ASC, id ASC"
                ),
                [owner_id],
            )
            .await?;

        let mut devices = Vec::new();
        while let Some(row) = rows.next().await? {
            devices.push(Self::parse_device(&row)?);
        }
        Ok(devices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use pretty_assertions::assert_eq;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_register_and_lookup() {
        let db = setup().await;
        let repo = LibSqlDeviceRepository::new(db.connection());

        let device = Device::new("user-1", "pixel", "android", "Field phone");
        let stored = repo.register(&device).await.unwrap();
        assert_eq!(stored.id, device.id);
        assert_eq!(stored.sync_cursor, 0);

        let fetched = repo
            .get_by_owner_and_device_id("user-1", "pixel")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.name, "Field phone");

        assert!(repo
            .get_by_owner_and_device_id("user-2", "pixel")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_reregister_keeps_identity_and_cursor() {
        let db = setup().await;
        let repo = LibSqlDeviceRepository::new(db.connection());

        let first = repo
            .register(&Device::new("user-1", "pixel", "android", "Old name"))
            .await
            .unwrap();
        repo.update_cursor(&first, 5_000).await.unwrap();

        let again = repo
            .register(&Device::new("user-1", "pixel", "android", "New name"))
            .await
            .unwrap();
        assert_eq!(again.id, first.id);
        assert_eq!(again.name, "New name");
        assert_eq!(again.sync_cursor, 5_000);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_cursor_is_monotonic() {
        let db = setup().await;
        let repo = LibSqlDeviceRepository::new(db.connection());

        let device = repo
            .register(&Device::new("user-1", "ipad", "ios", "Tablet"))
            .await
            .unwrap();

        repo.update_cursor(&device, 200).await.unwrap();
        repo.update_cursor(&device, 100).await.unwrap();

        let stored = repo
            .get_by_owner_and_device_id("user-1", "ipad")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.sync_cursor, 200);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_cursor_unknown_device() {
        let db = setup().await;
        let repo = LibSqlDeviceRepository::new(db.connection());

        let ghost = Device::new("user-1", "ghost", "web", "");
        let err = repo.update_cursor(&ghost, 1).await.unwrap_err();
        assert!(matches!(err, Error::DeviceNotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_by_owner() {
        let db = setup().await;
        let repo = LibSqlDeviceRepository::new(db.connection());

        repo.register(&Device::new("user-1", "a", "ios", "A"))
            .await
            .unwrap();
        repo.register(&Device::new("user-1", "b", "android", "B"))
            .await
            .unwrap();
        repo.register(&Device::new("user-2", "c", "web", "C"))
            .await
            .unwrap();

        let devices = repo.list_by_owner("user-1").await.unwrap();
        let ids: Vec<_> = devices.iter().map(|d| d.device_id.as_str()).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"a"));
        assert!(ids.contains(&"b"));
    }
}
