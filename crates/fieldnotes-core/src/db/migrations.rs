//! Versioned schema migrations tracked in `schema_version`

use crate::error::Result;
use libsql::Connection;

/// Ordered schema steps; each entry is applied in its own transaction
const MIGRATIONS: &[(i32, &[&str])] = &[
    (
        1,
        &[
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
            // NULL client_id values never collide, so notes created without a
            // correlation id are unconstrained.
            "CREATE TABLE IF NOT EXISTS notes (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                title TEXT NOT NULL,
                content TEXT NOT NULL DEFAULT '',
                latitude REAL,
                longitude REAL,
                altitude REAL,
                accuracy REAL,
                client_id TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                deleted_at INTEGER,
                UNIQUE (owner_id, client_id)
            )",
            "CREATE INDEX IF NOT EXISTS idx_notes_owner_updated ON notes(owner_id, updated_at)",
            "CREATE INDEX IF NOT EXISTS idx_notes_owner_location ON notes(owner_id, latitude, longitude)",
        ],
    ),
    (
        2,
        &[
            "CREATE TABLE IF NOT EXISTS devices (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                device_id TEXT NOT NULL,
                platform TEXT NOT NULL DEFAULT '',
                name TEXT NOT NULL DEFAULT '',
                sync_cursor INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                UNIQUE (owner_id, device_id)
            )",
            "CREATE INDEX IF NOT EXISTS idx_devices_owner ON devices(owner_id)",
        ],
    ),
];

/// Apply every migration newer than the stored schema version
pub async fn run(conn: &Connection) -> Result<()> {
    let applied = schema_version(conn).await?;

    for (version, statements) in MIGRATIONS.iter().filter(|(version, _)| *version > applied) {
        apply(conn, *version, statements).await?;
    }

    Ok(())
}

/// Highest applied version, or 0 on a fresh database
async fn schema_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn
        .query(
            "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
            (),
        )
        .await?;
    let tracked = match rows.next().await? {
        Some(row) => row.get::<i64>(0)? > 0,
        None => false,
    };
    if !tracked {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;
    match rows.next().await? {
        Some(row) => Ok(row.get(0)?),
        None => Ok(0),
    }
}

async fn apply(conn: &Connection, version: i32, statements: &[&str]) -> Result<()> {
    conn.execute("BEGIN TRANSACTION", ()).await?;

    let outcome = async {
        for statement in statements {
            conn.execute(statement, ()).await?;
        }
        conn.execute("INSERT INTO schema_version (version) VALUES (?)", [version])
            .await?;
        conn.execute("COMMIT", ()).await?;
        Ok::<_, libsql::Error>(())
    }
    .await;

    if let Err(error) = outcome {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(error.into());
    }

    tracing::info!(version, "Applied schema migration");
    Ok(())
}
