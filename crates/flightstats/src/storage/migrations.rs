//! Database migration system for flightstats.
//!
//! This module handles database schema versioning and migrations. A newly
//! created database is marked as awaiting its seed data; the mark is cleared
//! in the same transaction that writes the seed, so a failed seed is retried
//! on the next open.

use rusqlite::Connection;

use crate::error::{Error, Result};

use super::schema::SCHEMA_STATEMENTS;

/// The current schema version.
pub const CURRENT_VERSION: i32 = 1;

/// Key used to store the schema version in the metadata table.
const VERSION_KEY: &str = "schema_version";

/// Present in the metadata table until the initial seed has been written.
const SEED_PENDING_KEY: &str = "seed_pending";

/// Whether `initialize_schema` found an existing database or made a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaState {
    /// No schema version was recorded; the database is new.
    Created,
    /// The database already carried a schema version.
    Existing,
}

/// Initialize the database schema.
///
/// Creates all tables and indexes if they don't exist, then runs any
/// pending migrations to bring the schema up to the current version.
///
/// # Errors
///
/// Returns an error if schema creation or migration fails.
pub fn initialize_schema(conn: &Connection) -> Result<SchemaState> {
    let tx = conn.unchecked_transaction()?;
    for statement in SCHEMA_STATEMENTS {
        tx.execute(statement, [])?;
    }

    let version = get_schema_version(&tx)?;
    if version < CURRENT_VERSION {
        run_migrations(&tx, version)?;
    }

    let state = if version == 0 {
        tx.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, '1')",
            [SEED_PENDING_KEY],
        )?;
        SchemaState::Created
    } else {
        SchemaState::Existing
    };
    tx.commit()?;
    Ok(state)
}

/// Whether the database still awaits its initial seed.
///
/// # Errors
///
/// Returns an error if the metadata table cannot be read.
pub fn is_seed_pending(conn: &Connection) -> Result<bool> {
    let pending: i64 = conn.query_row(
        "SELECT COUNT(*) FROM metadata WHERE key = ?1",
        [SEED_PENDING_KEY],
        |row| row.get(0),
    )?;
    Ok(pending > 0)
}

/// Clear the seed mark. Call inside the transaction that writes the seed.
///
/// # Errors
///
/// Returns an error if the metadata table cannot be written.
pub fn clear_seed_pending(conn: &Connection) -> Result<()> {
    conn.execute("DELETE FROM metadata WHERE key = ?1", [SEED_PENDING_KEY])?;
    Ok(())
}

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (fresh database).
fn get_schema_version(conn: &Connection) -> Result<i32> {
    let result: std::result::Result<String, rusqlite::Error> = conn.query_row(
        "SELECT value FROM metadata WHERE key = ?1",
        [VERSION_KEY],
        |row| row.get(0),
    );

    match result {
        Ok(value) => value.parse().map_err(|_| Error::DatabaseMigration {
            message: format!("invalid schema version: {value}"),
        }),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(e) => Err(e.into()),
    }
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
        (VERSION_KEY, version.to_string()),
    )?;
    Ok(())
}

fn run_migrations(conn: &Connection, from_version: i32) -> Result<()> {
    let mut current = from_version;

    while current < CURRENT_VERSION {
        current += 1;
        run_migration(conn, current)?;
    }

    set_schema_version(conn, CURRENT_VERSION)?;
    Ok(())
}

fn run_migration(conn: &Connection, version: i32) -> Result<()> {
    match version {
        // Version 1 is the base schema created by `SCHEMA_STATEMENTS`.
        1 => Ok(()),
        _ => Err(Error::DatabaseMigration {
            message: format!("unknown migration version: {version}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_db() -> Connection {
        Connection::open_in_memory().expect("failed to create in-memory database")
    }

    #[test]
    fn test_initialize_schema_creates_tables() {
        let conn = create_test_db();
        initialize_schema(&conn).expect("failed to initialize schema");

        for table in ["flights", "metadata"] {
            let count: i32 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table {table}");
        }
    }

    #[test]
    fn test_initialize_schema_reports_created_then_existing() {
        let conn = create_test_db();

        let first = initialize_schema(&conn).expect("first init failed");
        assert_eq!(first, SchemaState::Created);

        let second = initialize_schema(&conn).expect("second init failed");
        assert_eq!(second, SchemaState::Existing);

        let version = get_schema_version(&conn).unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_seed_pending_until_cleared() {
        let conn = create_test_db();
        initialize_schema(&conn).unwrap();
        assert!(is_seed_pending(&conn).unwrap());

        // A reopen before the seed landed keeps the mark.
        assert_eq!(initialize_schema(&conn).unwrap(), SchemaState::Existing);
        assert!(is_seed_pending(&conn).unwrap());

        clear_seed_pending(&conn).unwrap();
        assert!(!is_seed_pending(&conn).unwrap());
        initialize_schema(&conn).unwrap();
        assert!(!is_seed_pending(&conn).unwrap());
    }

    #[test]
    fn test_migrations_record_current_version_once() {
        let conn = create_test_db();
        conn.execute(
            "CREATE TABLE metadata (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
            [],
        )
        .unwrap();

        run_migration(&conn, 1).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), 0);

        run_migrations(&conn, 0).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_get_schema_version_fresh_db() {
        let conn = create_test_db();
        conn.execute(
            "CREATE TABLE metadata (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
            [],
        )
        .unwrap();

        let version = get_schema_version(&conn).unwrap();
        assert_eq!(version, 0);
    }

    #[test]
    fn test_set_and_get_schema_version() {
        let conn = create_test_db();
        conn.execute(
            "CREATE TABLE metadata (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
            [],
        )
        .unwrap();

        set_schema_version(&conn, 42).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), 42);
    }

    #[test]
    fn test_invalid_schema_version() {
        let conn = create_test_db();
        initialize_schema(&conn).unwrap();
        conn.execute(
            "UPDATE metadata SET value = 'garbage' WHERE key = ?1",
            [VERSION_KEY],
        )
        .unwrap();

        let err = get_schema_version(&conn).unwrap_err();
        assert!(err.to_string().contains("invalid schema version"));
    }

    #[test]
    fn test_run_migration_unknown_version() {
        let conn = create_test_db();
        initialize_schema(&conn).unwrap();

        let result = run_migration(&conn, 999);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("unknown migration version"));
    }

    #[test]
    fn test_indexes_created() {
        let conn = create_test_db();
        initialize_schema(&conn).expect("failed to initialize schema");

        let indexes: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='index' AND tbl_name='flights'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(indexes.iter().any(|n| n.contains("number")));
        assert!(indexes.iter().any(|n| n.contains("date")));
    }
}
