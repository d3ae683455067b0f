//! Text and JSON renderings of the averages and flight lists.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, Local, TimeZone};
use serde::Serialize;

use crate::flight::{FlightRecord, MILLIS_PER_MINUTE};

/// Format a duration in whole minutes as `{h}h {m}min`.
#[must_use]
pub fn format_duration(minutes: i64) -> String {
    format!("{}h {}min", minutes / 60, minutes % 60)
}

/// Format a duration in milliseconds, truncated to whole minutes.
#[must_use]
pub fn format_millis(millis: i64) -> String {
    format_duration(millis / MILLIS_PER_MINUTE)
}

/// Local date-time of an epoch-millisecond instant.
#[must_use]
pub fn local_date(millis: i64) -> Option<DateTime<Local>> {
    Local.timestamp_millis_opt(millis).single()
}

fn format_local(millis: i64, pattern: &str) -> String {
    local_date(millis).map_or_else(|| "?".to_string(), |dt| dt.format(pattern).to_string())
}

/// One line per flight number.
#[must_use]
pub fn render_averages(averages: &BTreeMap<String, i64>) -> String {
    let mut out = String::from("Average Flight Times\n");
    if averages.is_empty() {
        out.push_str("  (no flights recorded)\n");
    }
    for (flight_number, avg) in averages {
        let _ = writeln!(
            out,
            "  Flight {flight_number:<8} Average Duration: {}",
            format_millis(*avg)
        );
    }
    out
}

/// One block per flight: number and date, route and duration, and the delay
/// when positive.
#[must_use]
pub fn render_flight(flight: &FlightRecord) -> String {
    let mut out = format!(
        "  {:<8} {}  {}-{}\n    {} → {}  {}\n",
        flight.flight_number,
        format_local(flight.date, "%b %d"),
        format_local(flight.actual_departure_time, "%H:%M"),
        format_local(flight.actual_arrival_time, "%H:%M"),
        flight.origin,
        flight.destination,
        format_millis(flight.actual_duration()),
    );
    if flight.is_delayed() {
        let _ = writeln!(out, "    Delay: {} min", flight.delay_minutes());
    }
    out
}

/// Header plus every flight.
#[must_use]
pub fn render_flights(flights: &[FlightRecord]) -> String {
    let mut out = format!("All Flight Records ({})\n", flights.len());
    for flight in flights {
        out.push_str(&render_flight(flight));
    }
    out
}

/// A flight with its derived values, for JSON output.
#[derive(Debug, Serialize)]
pub struct FlightView<'a> {
    /// The stored record.
    #[serde(flatten)]
    pub flight: &'a FlightRecord,
    /// Actual duration in milliseconds.
    pub actual_duration: i64,
    /// Combined delay in minutes.
    pub delay_minutes: i64,
}

impl<'a> From<&'a FlightRecord> for FlightView<'a> {
    fn from(flight: &'a FlightRecord) -> Self {
        Self {
            flight,
            actual_duration: flight.actual_duration(),
            delay_minutes: flight.delay_minutes(),
        }
    }
}

/// Both lists as one JSON document.
#[derive(Debug, Serialize)]
pub struct Report<'a> {
    /// Average actual duration in milliseconds per flight number.
    pub averages: &'a BTreeMap<String, i64>,
    /// Every flight with derived fields.
    pub flights: Vec<FlightView<'a>>,
}

impl<'a> Report<'a> {
    /// Build a report over borrowed snapshots.
    #[must_use]
    pub fn new(averages: &'a BTreeMap<String, i64>, flights: &'a [FlightRecord]) -> Self {
        Self {
            averages,
            flights: flights.iter().map(FlightView::from).collect(),
        }
    }
}
