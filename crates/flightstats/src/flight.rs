//! Core flight types for flightstats.
//!
//! This module defines the flight record stored by the storage layer and the
//! per-flight-number average derived from it.

use serde::{Deserialize, Serialize};

/// Milliseconds in one minute.
pub const MILLIS_PER_MINUTE: i64 = 60_000;

/// A single logged flight leg.
///
/// All instants are epoch milliseconds. `date` is the local midnight of the
/// flight's calendar day and is only used for display grouping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightRecord {
    /// Unique identifier for this record (assigned by storage layer).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    /// Route/service identifier, shared by many records across dates.
    pub flight_number: String,

    /// Departure airport label.
    pub origin: String,

    /// Arrival airport label.
    pub destination: String,

    /// Scheduled departure, epoch milliseconds.
    pub scheduled_departure_time: i64,

    /// Scheduled arrival, epoch milliseconds.
    pub scheduled_arrival_time: i64,

    /// Actual departure, epoch milliseconds.
    pub actual_departure_time: i64,

    /// Actual arrival, epoch milliseconds.
    pub actual_arrival_time: i64,

    /// Local midnight of the flight's calendar day, epoch milliseconds.
    pub date: i64,
}

impl FlightRecord {
    /// Actual flight duration in milliseconds.
    #[must_use]
    pub fn actual_duration(&self) -> i64 {
        self.actual_arrival_time - self.actual_departure_time
    }

    /// Combined departure and arrival delay in whole minutes.
    ///
    /// The two delays are summed before the division, so delay carried from
    /// departure into arrival is counted twice. Negative when the flight ran
    /// early.
    #[must_use]
    pub fn delay_minutes(&self) -> i64 {
        ((self.actual_departure_time - self.scheduled_departure_time)
            + (self.actual_arrival_time - self.scheduled_arrival_time))
            / MILLIS_PER_MINUTE
    }

    /// Whether this record should be displayed as delayed.
    #[must_use]
    pub fn is_delayed(&self) -> bool {
        self.delay_minutes() > 0
    }
}

/// Average actual duration for one flight number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightAverage {
    /// The flight number.
    pub flight_number: String,
    /// Mean actual duration in milliseconds, truncated.
    pub avg_duration: i64,
}

impl FlightAverage {
    /// The average in whole minutes.
    #[must_use]
    pub fn minutes(&self) -> i64 {
        self.avg_duration / MILLIS_PER_MINUTE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: i64 = 1_700_000_000_000;

    fn record(dep_delay_ms: i64, arr_delay_ms: i64) -> FlightRecord {
        let scheduled_departure_time = T;
        let scheduled_arrival_time = T + 6 * 60 * MILLIS_PER_MINUTE;
        FlightRecord {
            id: None,
            flight_number: "NY101".to_string(),
            origin: "New York".to_string(),
            destination: "Los Angeles".to_string(),
            scheduled_departure_time,
            scheduled_arrival_time,
            actual_departure_time: scheduled_departure_time + dep_delay_ms,
            actual_arrival_time: scheduled_arrival_time + arr_delay_ms,
            date: T - 8 * 60 * MILLIS_PER_MINUTE,
        }
    }

    #[test]
    fn test_actual_duration() {
        let flight = record(15 * MILLIS_PER_MINUTE, 17 * MILLIS_PER_MINUTE);
        assert_eq!(flight.actual_duration(), 21_720_000);
    }

    #[test]
    fn test_delay_minutes_sums_both_legs() {
        let flight = record(900_000, 900_000);
        assert_eq!(flight.delay_minutes(), 30);
        assert!(flight.is_delayed());
    }

    #[test]
    fn test_delay_minutes_truncates_after_summing() {
        // 40s + 40s = 80s, which is one whole minute
        let flight = record(40_000, 40_000);
        assert_eq!(flight.delay_minutes(), 1);
    }

    #[test]
    fn test_delay_minutes_early_arrival() {
        let flight = record(0, -10 * MILLIS_PER_MINUTE);
        assert_eq!(flight.delay_minutes(), -10);
        assert!(!flight.is_delayed());
    }

    #[test]
    fn test_on_time_is_not_delayed() {
        let flight = record(0, 0);
        assert_eq!(flight.delay_minutes(), 0);
        assert!(!flight.is_delayed());
    }

    #[test]
    fn test_average_minutes() {
        let avg = FlightAverage {
            flight_number: "NY101".to_string(),
            avg_duration: 21_660_000,
        };
        assert_eq!(avg.minutes(), 361);
    }

    #[test]
    fn test_record_serialization() {
        let flight = record(0, 0);
        let json = serde_json::to_string(&flight).unwrap();
        assert!(!json.contains("\"id\""));
        assert!(json.contains("\"flight_number\":\"NY101\""));

        let deserialized: FlightRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(flight, deserialized);
    }
}
