//! `SQLite` schema definitions for flightstats.
//!
//! This module contains the SQL statements for creating and managing
//! the database schema.

/// SQL statement to create the flights table.
pub const CREATE_FLIGHTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS flights (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    flight_number TEXT NOT NULL,
    origin TEXT NOT NULL,
    destination TEXT NOT NULL,
    scheduled_departure_time INTEGER NOT NULL,
    scheduled_arrival_time INTEGER NOT NULL,
    actual_departure_time INTEGER NOT NULL,
    actual_arrival_time INTEGER NOT NULL,
    date INTEGER NOT NULL
)
";

/// SQL statement to create an index on `flight_number` for filtering and grouping.
pub const CREATE_FLIGHT_NUMBER_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_flights_number ON flights(flight_number)
";

/// SQL statement to create an index on `date` for ordering.
pub const CREATE_DATE_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_flights_date ON flights(date)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_FLIGHTS_TABLE,
    CREATE_FLIGHT_NUMBER_INDEX,
    CREATE_DATE_INDEX,
    CREATE_METADATA_TABLE,
];

/// Column list shared by every flight `SELECT`, in `row_to_flight` order.
pub const FLIGHT_COLUMNS: &str = "id, flight_number, origin, destination, \
     scheduled_departure_time, scheduled_arrival_time, \
     actual_departure_time, actual_arrival_time, date";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_statements_not_empty() {
        assert!(!SCHEMA_STATEMENTS.is_empty());
        for stmt in SCHEMA_STATEMENTS {
            assert!(!stmt.is_empty());
        }
    }

    #[test]
    fn test_create_flights_table_contains_required_columns() {
        assert!(CREATE_FLIGHTS_TABLE.contains("id INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(CREATE_FLIGHTS_TABLE.contains("flight_number TEXT NOT NULL"));
        assert!(CREATE_FLIGHTS_TABLE.contains("actual_departure_time INTEGER NOT NULL"));
        assert!(CREATE_FLIGHTS_TABLE.contains("actual_arrival_time INTEGER NOT NULL"));
        assert!(CREATE_FLIGHTS_TABLE.contains("date INTEGER NOT NULL"));
    }

    #[test]
    fn test_flight_columns_match_table() {
        for column in FLIGHT_COLUMNS.split(',').map(str::trim) {
            assert!(
                CREATE_FLIGHTS_TABLE.contains(column),
                "missing column: {column}"
            );
        }
    }

    #[test]
    fn test_create_metadata_table_structure() {
        assert!(CREATE_METADATA_TABLE.contains("key TEXT PRIMARY KEY"));
        assert!(CREATE_METADATA_TABLE.contains("value TEXT NOT NULL"));
    }
}
