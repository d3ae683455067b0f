//! Storage layer for flightstats.
//!
//! This module provides `SQLite`-based persistent storage for flight records,
//! the per-flight-number aggregate queries, and the change notifications that
//! drive live views.

pub mod migrations;
pub mod schema;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::flight::{FlightAverage, FlightRecord};

use self::migrations::SchemaState;
use self::schema::FLIGHT_COLUMNS;

/// Capacity of the change notification channel.
///
/// Subscribers that fall further behind see a lag and re-query once.
const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Notification published after every committed write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreChange {
    /// Monotonic write counter, starting at 1.
    pub version: u64,
    /// Number of rows the write inserted.
    pub inserted: usize,
}

/// Storage engine for flight records.
///
/// A single connection sits behind a mutex, so writes are serialized and a
/// reader sees either the state before or after a batch commit. Change
/// notifications are published while the lock is still held; subscribers
/// therefore observe them in commit order.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Mutex<Connection>,
    /// Whether the schema was created by this open.
    state: SchemaState,
    /// Number of committed writes.
    version: AtomicU64,
    /// Change notification sender.
    changes: broadcast::Sender<StoreChange>,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        // WAL lets other processes read while a batch is being written
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let state = migrations::initialize_schema(&conn)?;
        let created = state == SchemaState::Created;

        info!(created, "Database opened successfully at {}", path.display());
        Ok(Self::from_parts(path, conn, state))
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let path = PathBuf::from(":memory:");
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        let state = migrations::initialize_schema(&conn)?;

        Ok(Self::from_parts(path, conn, state))
    }

    fn from_parts(path: PathBuf, conn: Connection, state: SchemaState) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            path,
            conn: Mutex::new(conn),
            state,
            version: AtomicU64::new(0),
            changes,
        }
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether this open created the database schema from scratch.
    #[must_use]
    pub fn was_created(&self) -> bool {
        self.state == SchemaState::Created
    }

    /// Subscribe to change notifications.
    ///
    /// The receiver only sees writes committed after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }

    /// Number of writes committed through this instance.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::internal("database connection lock poisoned"))
    }

    /// Must be called with the connection lock held.
    fn publish(&self, inserted: usize) {
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        // No receivers is not an error
        let _ = self.changes.send(StoreChange { version, inserted });
        debug!(version, inserted, "Published store change");
    }

    /// Insert a flight record.
    ///
    /// Any `id` already set on the record is ignored; returns the assigned ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn insert(&self, flight: &FlightRecord) -> Result<i64> {
        let conn = self.lock()?;
        let id = Self::insert_row(&conn, flight)?;
        debug!("Inserted flight {} with id {}", flight.flight_number, id);
        self.publish(1);
        Ok(id)
    }

    /// Insert a batch of flight records in a single transaction.
    ///
    /// Readers observe either none or all of the batch. Returns the assigned
    /// IDs in input order. An empty batch is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails; nothing from the
    /// batch is stored in that case.
    pub fn insert_many(&self, flights: &[FlightRecord]) -> Result<Vec<i64>> {
        if flights.is_empty() {
            return Ok(Vec::new());
        }
        self.insert_batch(flights, false)
    }

    /// Whether the database was created but its initial seed never landed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn needs_seed(&self) -> Result<bool> {
        let conn = self.lock()?;
        migrations::is_seed_pending(&conn)
    }

    /// Write the initial seed and clear the pending-seed mark atomically.
    ///
    /// An empty batch only clears the mark. If the insert fails the mark
    /// stays set and the seed is attempted again on the next open.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn insert_seed(&self, flights: &[FlightRecord]) -> Result<Vec<i64>> {
        self.insert_batch(flights, true)
    }

    fn insert_batch(&self, flights: &[FlightRecord], seed: bool) -> Result<Vec<i64>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let ids = flights
            .iter()
            .map(|flight| Self::insert_row(&tx, flight))
            .collect::<Result<Vec<_>>>()?;
        if seed {
            migrations::clear_seed_pending(&tx)?;
        }
        tx.commit()?;

        if !ids.is_empty() {
            info!("Inserted batch of {} flights", ids.len());
            self.publish(ids.len());
        }
        Ok(ids)
    }

    fn insert_row(conn: &Connection, flight: &FlightRecord) -> Result<i64> {
        let mut stmt = conn.prepare_cached(
            r"
            INSERT INTO flights (
                flight_number, origin, destination,
                scheduled_departure_time, scheduled_arrival_time,
                actual_departure_time, actual_arrival_time, date
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
        )?;
        stmt.execute(params![
            flight.flight_number,
            flight.origin,
            flight.destination,
            flight.scheduled_departure_time,
            flight.scheduled_arrival_time,
            flight.actual_departure_time,
            flight.actual_arrival_time,
            flight.date,
        ])?;
        Ok(conn.last_insert_rowid())
    }

    /// Get every flight record, ordered by date then scheduled departure.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn all_records(&self) -> Result<Vec<FlightRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {FLIGHT_COLUMNS} FROM flights \
             ORDER BY date, scheduled_departure_time, id"
        ))?;

        let flights = stmt
            .query_map([], Self::row_to_flight)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(flights)
    }

    /// Get the flight records for one flight number.
    ///
    /// An unknown flight number yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn records_by_flight_number(&self, flight_number: &str) -> Result<Vec<FlightRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {FLIGHT_COLUMNS} FROM flights WHERE flight_number = ?1 \
             ORDER BY date, scheduled_departure_time, id"
        ))?;

        let flights = stmt
            .query_map([flight_number], Self::row_to_flight)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(flights)
    }

    /// Average actual duration per flight number, ordered by flight number.
    ///
    /// Durations are summed as integers and the mean is truncated, so the
    /// result is exact for any realistic record count.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn flight_averages(&self) -> Result<Vec<FlightAverage>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            r"
            SELECT flight_number,
                   SUM(actual_arrival_time - actual_departure_time) / COUNT(*)
            FROM flights
            GROUP BY flight_number
            ORDER BY flight_number
            ",
        )?;

        let averages = stmt
            .query_map([], |row| {
                Ok(FlightAverage {
                    flight_number: row.get(0)?,
                    avg_duration: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(averages)
    }

    /// Average actual duration in milliseconds keyed by flight number.
    ///
    /// Contains exactly one entry per distinct flight number in the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn average_durations(&self) -> Result<BTreeMap<String, i64>> {
        Ok(self
            .flight_averages()?
            .into_iter()
            .map(|avg| (avg.flight_number, avg.avg_duration))
            .collect())
    }

    /// Average actual duration in milliseconds for one flight number.
    ///
    /// Returns 0 when the flight number has no records.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn average_duration_for(&self, flight_number: &str) -> Result<i64> {
        let conn = self.lock()?;
        let avg: Option<i64> = conn.query_row(
            r"
            SELECT SUM(actual_arrival_time - actual_departure_time) / COUNT(*)
            FROM flights WHERE flight_number = ?1
            ",
            [flight_number],
            |row| row.get(0),
        )?;
        Ok(avg.unwrap_or(0))
    }

    /// Count total flight records in storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count(&self) -> Result<i64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM flights", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Check whether the store holds no records.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.count()? == 0)
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let (total_flights, flight_numbers, earliest_date, latest_date): (
            i64,
            i64,
            Option<i64>,
            Option<i64>,
        ) = {
            let conn = self.lock()?;
            conn.query_row(
                r"
                SELECT COUNT(*), COUNT(DISTINCT flight_number), MIN(date), MAX(date)
                FROM flights
                ",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?
        };

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            total_flights,
            flight_numbers,
            earliest_date,
            latest_date,
            db_size_bytes,
        })
    }

    /// Convert a database row to a `FlightRecord`.
    fn row_to_flight(row: &rusqlite::Row) -> rusqlite::Result<FlightRecord> {
        Ok(FlightRecord {
            id: Some(row.get(0)?),
            flight_number: row.get(1)?,
            origin: row.get(2)?,
            destination: row.get(3)?,
            scheduled_departure_time: row.get(4)?,
            scheduled_arrival_time: row.get(5)?,
            actual_departure_time: row.get(6)?,
            actual_arrival_time: row.get(7)?,
            date: row.get(8)?,
        })
    }
}

/// Statistics about the storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    /// Total number of flight records stored.
    pub total_flights: i64,
    /// Number of distinct flight numbers.
    pub flight_numbers: i64,
    /// Earliest flight date (epoch milliseconds).
    pub earliest_date: Option<i64>,
    /// Latest flight date (epoch milliseconds).
    pub latest_date: Option<i64>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}
