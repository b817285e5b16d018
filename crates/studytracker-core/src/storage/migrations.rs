//! Database schema migrations for the session log.
//!
//! Migrations are versioned and applied every time a connection is opened.
//! The `schema_version` table tracks the current migration version. Each
//! additive step also checks the live table layout first, so a database
//! written before version tracking existed is brought forward without
//! duplicating columns.

use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
///
/// Increment this when adding new migrations.
pub const SCHEMA_VERSION: i32 = 3;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn)?;

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }
    if current_version < 3 {
        migrate_v3(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Returns 0 if no version is set (fresh or pre-tracking database).
pub fn get_schema_version(conn: &Connection) -> SqliteResult<i32> {
    match conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
        row.get::<_, Option<i32>>(0)
    }) {
        Ok(v) => Ok(v.unwrap_or(0)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(e) => Err(e),
    }
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

fn has_column(conn: &Connection, table: &str, column: &str) -> SqliteResult<bool> {
    let count: i32 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
        [table, column],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Migration v1: base session table.
///
/// `CREATE TABLE IF NOT EXISTS` keeps this a no-op for logs that predate
/// version tracking.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS sessions (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            start_utc    TEXT NOT NULL,
            local_date   TEXT NOT NULL,
            end_utc      TEXT,
            duration_sec INTEGER,
            subject      TEXT NOT NULL DEFAULT '',
            note         TEXT NOT NULL DEFAULT '',
            updated_at   TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_sessions_local_date ON sessions(local_date);
        CREATE INDEX IF NOT EXISTS idx_sessions_start_utc ON sessions(start_utc);
        CREATE INDEX IF NOT EXISTS idx_sessions_open ON sessions(end_utc) WHERE end_utc IS NULL;",
    )?;
    set_schema_version(&tx, 1)?;
    tx.commit()
}

/// Migration v2: checkpoint column for in-progress elapsed seconds.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    if !has_column(&tx, "sessions", "elapsed_sec")? {
        tx.execute_batch("ALTER TABLE sessions ADD COLUMN elapsed_sec INTEGER;")?;
    }
    set_schema_version(&tx, 2)?;
    tx.commit()
}

/// Migration v3: which engine produced the session.
///
/// Rows written before this column existed were all produced by the manual timer.
fn migrate_v3(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    if !has_column(&tx, "sessions", "source")? {
        tx.execute_batch(
            "ALTER TABLE sessions ADD COLUMN source TEXT NOT NULL DEFAULT 'timer';",
        )?;
    }
    set_schema_version(&tx, 3)?;
    tx.commit()
}
