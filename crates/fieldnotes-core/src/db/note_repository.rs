//! Note repository implementation

use crate::error::{Error, Result};
use crate::models::{BoundingBox, Location, Note, NoteId, PageInfo, PageParams};
use crate::util::now_millis;
use libsql::{Connection, Value};

const NOTE_COLUMNS: &str = "id, owner_id, title, content, latitude, longitude, altitude, accuracy, \
                            client_id, created_at, updated_at, deleted_at";

/// Filters for owner-facing note listings
#[derive(Debug, Clone, Copy, Default)]
pub struct NoteListParams {
    pub page: PageParams,
    pub bounding_box: Option<BoundingBox>,
    pub include_deleted: bool,
}

/// Trait for note storage operations (async)
#[allow(async_fn_in_trait)]
pub trait NoteRepository {
    /// Insert a new note
    async fn create(&self, note: &Note) -> Result<()>;

    /// Get a note by ID, tombstoned or not
    async fn get(&self, id: &NoteId) -> Result<Option<Note>>;

    /// Point lookup by correlation id
    async fn get_by_client_id(&self, owner_id: &str, client_id: &str) -> Result<Option<Note>>;

    /// List an owner's notes, newest first
    async fn list(&self, owner_id: &str, params: &NoteListParams)
        -> Result<(Vec<Note>, PageInfo)>;

    /// Overwrite the mutable fields of an existing note
    async fn update(&self, note: &Note) -> Result<()>;

    /// Tombstone a live note
    async fn soft_delete(&self, id: &NoteId) -> Result<()>;

    /// Notes with `updated_at > since`, tombstones included, oldest first,
    /// at most `limit` of them
    async fn fetch_modified_since(&self, owner_id: &str, since: i64, limit: usize)
        -> Result<Vec<Note>>;

    /// Every note stamped exactly `updated_at`, tombstones included, uncapped
    async fn fetch_modified_at(&self, owner_id: &str, updated_at: i64) -> Result<Vec<Note>>;

    /// Apply all notes in one transaction.
    ///
    /// Each row keyed by `(owner_id, client_id)` is written only when it is new
    /// or strictly newer than the stored row. Returns how many rows changed.
    async fn batch_upsert(&self, notes: &[Note]) -> Result<usize>;
}

/// libSQL implementation of `NoteRepository`
pub struct LibSqlNoteRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlNoteRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a note from a database row
    fn parse_note(row: &libsql::Row) -> Result<Note> {
        let id: String = row.get(0)?;
        let id = id
            .parse()
            .map_err(|_| Error::Database(format!("Invalid note ID in storage: {id}")))?;
        Ok(Note {
            id,
            owner_id: row.get(1)?,
            title: row.get(2)?,
            content: row.get(3)?,
            location: Location::from_parts(row.get(4)?, row.get(5)?, row.get(6)?, row.get(7)?),
            client_id: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
            deleted_at: row.get(11)?,
        })
    }

    async fn query_one(&self, sql: &str, params: impl libsql::params::IntoParams) -> Result<Option<Note>> {
        let mut rows = self.conn.query(sql, params).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_note(&row)?)),
            None => Ok(None),
        }
    }

    async fn query_many(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<Note>> {
        let mut rows = self.conn.query(sql, params).await?;
        let mut notes = Vec::new();
        while let Some(row) = rows.next().await? {
            notes.push(Self::parse_note(&row)?);
        }
        Ok(notes)
    }

    async fn upsert_rows(&self, notes: &[Note]) -> Result<usize> {
        let sql = format!(
            "INSERT INTO notes ({NOTE_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT (owner_id, client_id) DO UPDATE SET
                title = excluded.title,
                content = excluded.content,
                latitude = excluded.latitude,
                longitude = excluded.longitude,
                altitude = excluded.altitude,
                accuracy = excluded.accuracy,
                updated_at = excluded.updated_at,
                deleted_at = excluded.deleted_at
             WHERE notes.updated_at < excluded.updated_at"
        );

        let mut applied = 0;
        for note in notes {
            let changed = self.conn.execute(&sql, note_values(note)).await?;
            applied += usize::try_from(changed).unwrap_or(usize::MAX);
        }
        Ok(applied)
    }
}

impl NoteRepository for LibSqlNoteRepository<'_> {
    async fn create(&self, note: &Note) -> Result<()> {
        self.conn
            .execute(
                &format!(
                    "INSERT INTO notes ({NOTE_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
                ),
                note_values(note),
            )
            .await?;
        Ok(())
    }

    async fn get(&self, id: &NoteId) -> Result<Option<Note>> {
        self.query_one(
            &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?"),
            [id.as_str()],
        )
        .await
    }

    async fn get_by_client_id(&self, owner_id: &str, client_id: &str) -> Result<Option<Note>> {
        self.query_one(
            &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE owner_id = ? AND client_id = ?"),
            [owner_id, client_id],
        )
        .await
    }

    async fn list(
        &self,
        owner_id: &str,
        params: &NoteListParams,
    ) -> Result<(Vec<Note>, PageInfo)> {
        // ?2 toggles tombstones, ?3 toggles the bounding box filter
        let filter = "WHERE owner_id = ?1
                        AND (?2 = 1 OR deleted_at IS NULL)
                        AND (?3 = 0 OR (latitude BETWEEN ?4 AND ?5 AND longitude BETWEEN ?6 AND ?7))";

        let bbox = params.bounding_box;
        let filter_values = [
            Value::Text(owner_id.to_string()),
            Value::Integer(i64::from(params.include_deleted)),
            Value::Integer(i64::from(bbox.is_some())),
            Value::Real(bbox.map_or(0.0, |b| b.min_lat)),
            Value::Real(bbox.map_or(0.0, |b| b.max_lat)),
            Value::Real(bbox.map_or(0.0, |b| b.min_lng)),
            Value::Real(bbox.map_or(0.0, |b| b.max_lng)),
        ];

        let mut rows = self
            .conn
            .query(
                &format!("SELECT COUNT(*) FROM notes {filter}"),
                filter_values.clone(),
            )
            .await?;
        let total: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };

        let [owner, deleted, has_bbox, min_lat, max_lat, min_lng, max_lng] = filter_values;
        let notes = self
            .query_many(
                &format!(
                    "SELECT {NOTE_COLUMNS} FROM notes {filter}
                     ORDER BY updated_at DESC, id DESC
                     LIMIT ?8 OFFSET ?9"
                ),
                [
                    owner,
                    deleted,
                    has_bbox,
                    min_lat,
                    max_lat,
                    min_lng,
                    max_lng,
                    Value::Integer(i64::from(params.page.limit())),
                    Value::Integer(i64::try_from(params.page.offset()).unwrap_or(i64::MAX)),
                ],
            )
            .await?;

        let info = PageInfo::new(params.page, u64::try_from(total).unwrap_or_default());
        Ok((notes, info))
    }

    async fn update(&self, note: &Note) -> Result<()> {
        let location = note.location;
        let rows = self
            .conn
            .execute(
                "UPDATE notes
                 SET title = ?2, content = ?3, latitude = ?4, longitude = ?5,
                     altitude = ?6, accuracy = ?7, updated_at = ?8, deleted_at = ?9
                 WHERE id = ?1",
                [
                    Value::Text(note.id.as_str()),
                    Value::Text(note.title.clone()),
                    Value::Text(note.content.clone()),
                    real(location.map(|l| l.latitude)),
                    real(location.map(|l| l.longitude)),
                    real(location.and_then(|l| l.altitude)),
                    real(location.and_then(|l| l.accuracy)),
                    Value::Integer(note.updated_at),
                    integer(note.deleted_at),
                ],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NoteNotFound(note.id.to_string()));
        }
        Ok(())
    }

    async fn soft_delete(&self, id: &NoteId) -> Result<()> {
        // Both assignments read the pre-update row, so they agree.
        let rows = self
            .conn
            .execute(
                "UPDATE notes
                 SET deleted_at = MAX(updated_at + 1, ?2),
                     updated_at = MAX(updated_at + 1, ?2)
                 WHERE id = ?1 AND deleted_at IS NULL",
                [Value::Text(id.as_str()), Value::Integer(now_millis())],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NoteNotFound(id.to_string()));
        }
        Ok(())
    }

    async fn fetch_modified_since(
        &self,
        owner_id: &str,
        since: i64,
        limit: usize,
    ) -> Result<Vec<Note>> {
        self.query_many(
            &format!(
                "SELECT {NOTE_COLUMNS} FROM notes
                 WHERE owner_id = ?1 AND updated_at > ?2
                 ORDER BY updated_at ASC, id ASC
                 LIMIT ?3"
            ),
            [
                Value::Text(owner_id.to_string()),
                Value::Integer(since),
                Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)),
            ],
        )
        .await
    }

    async fn fetch_modified_at(&self, owner_id: &str, updated_at: i64) -> Result<Vec<Note>> {
        self.query_many(
            &format!(
                "SELECT {NOTE_COLUMNS} FROM notes
                 WHERE owner_id = ?1 AND updated_at = ?2
                 ORDER BY id ASC"
            ),
            [
                Value::Text(owner_id.to_string()),
                Value::Integer(updated_at),
            ],
        )
        .await
    }

    async fn batch_upsert(&self, notes: &[Note]) -> Result<usize> {
        if notes.is_empty() {
            return Ok(0);
        }

        self.conn.execute("BEGIN IMMEDIATE TRANSACTION", ()).await?;

        let applied = match self.upsert_rows(notes).await {
            Ok(applied) => applied,
            Err(e) => {
                self.conn.execute("ROLLBACK", ()).await.ok();
                return Err(e);
            }
        };

        if let Err(e) = self.conn.execute("COMMIT", ()).await {
            self.conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }

        Ok(applied)
    }
}

fn real(value: Option<f64>) -> Value {
    value.map_or(Value::Null, Value::Real)
}

fn integer(value: Option<i64>) -> Value {
    value.map_or(Value::Null, Value::Integer)
}

fn note_values(note: &Note) -> [Value; 12] {
    let location = note.location;
    [
        Value::Text(note.id.as_str()),
        Value::Text(note.owner_id.clone()),
        Value::Text(note.title.clone()),
        Value::Text(note.content.clone()),
        real(location.map(|l| l.latitude)),
        real(location.map(|l| l.longitude)),
        real(location.and_then(|l| l.altitude)),
        real(location.and_then(|l| l.accuracy)),
        note.client_id.clone().map_or(Value::Null, Value::Text),
        Value::Integer(note.created_at),
        Value::Integer(note.updated_at),
        integer(note.deleted_at),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use pretty_assertions::assert_eq;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn note_at(owner: &str, client_id: &str, title: &str, updated_at: i64) -> Note {
        Note {
            id: NoteId::new(),
            owner_id: owner.to_string(),
            title: title.to_string(),
            content: format!("{title} content"),
            location: None,
            client_id: Some(client_id.to_string()),
            created_at: updated_at,
            updated_at,
            deleted_at: None,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_create_and_get() {
        let db = setup().await;
        let repo = LibSqlNoteRepository::new(db.connection());

        let note = Note::new(
            "user-1",
            "Summit",
            "Clear skies",
            Some(Location::new(46.85, -121.76, Some(4392.0), None)),
            Some("n1".to_string()),
        );
        repo.create(&note).await.unwrap();

        let fetched = repo.get(&note.id).await.unwrap().unwrap();
        assert_eq!(fetched, note);

        let by_client = repo.get_by_client_id("user-1", "n1").await.unwrap().unwrap();
        assert_eq!(by_client.id, note.id);
        assert!(repo.get_by_client_id("user-2", "n1").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_excludes_tombstones_and_other_owners() {
        let db = setup().await;
        let repo = LibSqlNoteRepository::new(db.connection());

        let keep = note_at("user-1", "a", "Keep", 100);
        let gone = note_at("user-1", "b", "Gone", 200);
        let other = note_at("user-2", "c", "Other", 300);
        for note in [&keep, &gone, &other] {
            repo.create(note).await.unwrap();
        }
        repo.soft_delete(&gone.id).await.unwrap();

        let (notes, info) = repo
            .list("user-1", &NoteListParams::default())
            .await
            .unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].id, keep.id);
        assert_eq!(info.total_items, 1);

        let params = NoteListParams {
            include_deleted: true,
            ..NoteListParams::default()
        };
        let (notes, _) = repo.list("user-1", &params).await.unwrap();
        assert_eq!(notes.len(), 2);
        // Newest first
        assert_eq!(notes[0].id, gone.id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_bounding_box_and_pagination() {
        let db = setup().await;
        let repo = LibSqlNoteRepository::new(db.connection());

        for (i, lat) in [10.0, 20.0, 30.0, 40.0].into_iter().enumerate() {
            let mut note = note_at("user-1", &format!("n{i}"), "Pin", 100 + i as i64);
            note.location = Some(Location::new(lat, 5.0, None, None));
            repo.create(&note).await.unwrap();
        }
        repo.create(&note_at("user-1", "nowhere", "No location", 500))
            .await
            .unwrap();

        let params = NoteListParams {
            page: PageParams::new(Some(1), Some(2)),
            bounding_box: Some(BoundingBox::new(15.0, 45.0, 0.0, 10.0)),
            include_deleted: false,
        };
        let (notes, info) = repo.list("user-1", &params).await.unwrap();
        assert_eq!(notes.len(), 2);
        assert_eq!(info.total_items, 3);
        assert_eq!(info.total_pages, 2);
        assert!(info.has_next);
        assert_eq!(notes[0].location.unwrap().latitude, 40.0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_missing_note_fails() {
        let db = setup().await;
        let repo = LibSqlNoteRepository::new(db.connection());

        let note = note_at("user-1", "n1", "Ghost", 1);
        let err = repo.update(&note).await.unwrap_err();
        assert!(matches!(err, Error::NoteNotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_soft_delete_moves_timestamp_forward() {
        let db = setup().await;
        let repo = LibSqlNoteRepository::new(db.connection());

        let future = now_millis() + 3_600_000;
        let note = note_at("user-1", "n1", "Clock skew", future);
        repo.create(&note).await.unwrap();
        repo.soft_delete(&note.id).await.unwrap();

        let stored = repo.get(&note.id).await.unwrap().unwrap();
        assert_eq!(stored.updated_at, future + 1);
        assert_eq!(stored.deleted_at, Some(future + 1));

        // Already tombstoned
        assert!(matches!(
            repo.soft_delete(&note.id).await.unwrap_err(),
            Error::NoteNotFound(_)
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_fetch_modified_since_is_strict_ordered_and_limited() {
        let db = setup().await;
        let repo = LibSqlNoteRepository::new(db.connection());

        repo.create(&note_at("user-1", "c", "Third", 300)).await.unwrap();
        repo.create(&note_at("user-1", "a", "First", 100)).await.unwrap();
        repo.create(&note_at("user-1", "b", "Second", 200)).await.unwrap();
        repo.create(&note_at("user-2", "z", "Foreign", 250)).await.unwrap();

        let notes = repo.fetch_modified_since("user-1", 100, 10).await.unwrap();
        let titles: Vec<_> = notes.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["Second", "Third"]);

        let notes = repo.fetch_modified_since("user-1", 0, 2).await.unwrap();
        let titles: Vec<_> = notes.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["First", "Second"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_fetch_modified_since_includes_tombstones() {
        let db = setup().await;
        let repo = LibSqlNoteRepository::new(db.connection());

        let note = note_at("user-1", "n1", "Deleted later", 100);
        repo.create(&note).await.unwrap();
        repo.soft_delete(&note.id).await.unwrap();

        let notes = repo.fetch_modified_since("user-1", 50, 10).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert!(notes[0].is_deleted());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_fetch_modified_at_returns_whole_timestamp() {
        let db = setup().await;
        let repo = LibSqlNoteRepository::new(db.connection());

        for client_id in ["a", "b", "c"] {
            repo.create(&note_at("user-1", client_id, "Tied", 300)).await.unwrap();
        }
        repo.create(&note_at("user-1", "d", "Later", 400)).await.unwrap();
        repo.create(&note_at("user-2", "e", "Foreign", 300)).await.unwrap();

        let notes = repo.fetch_modified_at("user-1", 300).await.unwrap();
        assert_eq!(notes.len(), 3);
        assert!(notes.iter().all(|n| n.owner_id == "user-1" && n.updated_at == 300));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_batch_upsert_only_applies_newer_rows() {
        let db = setup().await;
        let repo = LibSqlNoteRepository::new(db.connection());

        let original = note_at("user-1", "n1", "A", 100);
        assert_eq!(repo.batch_upsert(&[original.clone()]).await.unwrap(), 1);

        // Same correlation id, fresh identity, older timestamp: ignored
        let stale = note_at("user-1", "n1", "Stale", 50);
        // Same timestamp replay: ignored
        let replay = note_at("user-1", "n1", "Replay", 100);
        assert_eq!(repo.batch_upsert(&[stale, replay]).await.unwrap(), 0);

        let stored = repo.get_by_client_id("user-1", "n1").await.unwrap().unwrap();
        assert_eq!(stored.title, "A");
        assert_eq!(stored.id, original.id);

        // Newer timestamp wins but keeps the stored identity
        let newer = note_at("user-1", "n1", "B", 200);
        assert_eq!(repo.batch_upsert(&[newer]).await.unwrap(), 1);
        let stored = repo.get_by_client_id("user-1", "n1").await.unwrap().unwrap();
        assert_eq!(stored.title, "B");
        assert_eq!(stored.id, original.id);
        assert_eq!(stored.created_at, 100);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_batch_upsert_is_all_or_nothing() {
        let db = setup().await;
        let repo = LibSqlNoteRepository::new(db.connection());

        let existing = note_at("user-1", "taken", "Existing", 100);
        repo.create(&existing).await.unwrap();

        // Second row collides on the primary key, which the upsert does not absorb
        let fresh = note_at("user-1", "fresh", "Fresh", 100);
        let mut collision = note_at("user-1", "other", "Collision", 200);
        collision.id = existing.id;

        assert!(repo.batch_upsert(&[fresh, collision]).await.is_err());
        assert!(repo
            .get_by_client_id("user-1", "fresh")
            .await
            .unwrap()
            .is_none());
    }
}
