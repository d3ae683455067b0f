//! Synthetic flight data.
//!
//! Fabricates flight records for three fixed routes with random departure
//! delay and arrival jitter. Used to seed a freshly created store with a week
//! of history and by the periodic [`RefreshJob`] to append another day.

use std::sync::Arc;

use chrono::{Days, Local, NaiveDate, TimeZone};
use rand::Rng;
use tracing::{debug, info, warn};

use crate::config::GeneratorConfig;
use crate::error::{Error, Result};
use crate::flight::{FlightRecord, MILLIS_PER_MINUTE};
use crate::storage::Storage;

const MILLIS_PER_HOUR: i64 = 60 * MILLIS_PER_MINUTE;

/// Number of days of history written when a store is first created.
pub const SEED_DAYS: usize = 7;

/// A fixed daily service and the bounds of its random jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    /// Flight number.
    pub flight_number: &'static str,
    /// Departure airport label.
    pub origin: &'static str,
    /// Arrival airport label.
    pub destination: &'static str,
    /// Scheduled departure, hours after local midnight.
    pub departure_hour: i64,
    /// Scheduled flight length in hours.
    pub scheduled_hours: i64,
    /// Upper bound (inclusive) of the departure delay in minutes.
    pub max_delay_minutes: i64,
    /// Upper bound (inclusive) of extra arrival jitter in minutes.
    pub max_arrival_jitter_minutes: i64,
}

/// The three services every generated day contains.
pub static ROUTES: [Route; 3] = [
    Route {
        flight_number: "NY101",
        origin: "New York",
        destination: "Los Angeles",
        departure_hour: 8,
        scheduled_hours: 6,
        max_delay_minutes: 45,
        max_arrival_jitter_minutes: 30,
    },
    Route {
        flight_number: "CH202",
        origin: "Chicago",
        destination: "Miami",
        departure_hour: 13,
        scheduled_hours: 3,
        max_delay_minutes: 60,
        max_arrival_jitter_minutes: 20,
    },
    Route {
        flight_number: "SF303",
        origin: "San Francisco",
        destination: "Seattle",
        departure_hour: 18,
        scheduled_hours: 2,
        max_delay_minutes: 30,
        max_arrival_jitter_minutes: 15,
    },
];

impl Route {
    /// Generate one flight of this route on the day starting at `date`
    /// (epoch milliseconds of local midnight).
    pub fn generate<R: Rng + ?Sized>(&self, date: i64, rng: &mut R) -> FlightRecord {
        let scheduled_departure_time = date + self.departure_hour * MILLIS_PER_HOUR;
        let scheduled_arrival_time = scheduled_departure_time + self.scheduled_hours * MILLIS_PER_HOUR;

        let delay = rng.gen_range(0..=self.max_delay_minutes) * MILLIS_PER_MINUTE;
        let jitter = rng.gen_range(0..=self.max_arrival_jitter_minutes) * MILLIS_PER_MINUTE;

        FlightRecord {
            id: None,
            flight_number: self.flight_number.to_string(),
            origin: self.origin.to_string(),
            destination: self.destination.to_string(),
            scheduled_departure_time,
            scheduled_arrival_time,
            actual_departure_time: scheduled_departure_time + delay,
            actual_arrival_time: scheduled_arrival_time + delay + jitter,
            date,
        }
    }
}

/// Epoch milliseconds of local midnight on `day`.
///
/// # Errors
///
/// Returns an error if midnight does not exist in the local time zone.
pub fn local_midnight(day: NaiveDate) -> Result<i64> {
    midnight_in(&Local, day)
}

fn midnight_in<Tz: TimeZone>(tz: &Tz, day: NaiveDate) -> Result<i64> {
    let naive = day.and_hms_opt(0, 0, 0).ok_or_else(|| Error::internal("invalid midnight"))?;
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp_millis())
        .ok_or_else(|| Error::internal(format!("no local midnight on {day}")))
}

/// Generate one record per route for the day starting at `date`.
pub fn day_records<R: Rng + ?Sized>(date: i64, routes: &[Route], rng: &mut R) -> Vec<FlightRecord> {
    routes.iter().map(|route| route.generate(date, rng)).collect()
}

/// Generate the initial week of history: every route on each of the
/// [`SEED_DAYS`] days before `today`.
///
/// # Errors
///
/// Returns an error if a day's local midnight cannot be resolved.
pub fn seed_records<R: Rng + ?Sized>(today: NaiveDate, rng: &mut R) -> Result<Vec<FlightRecord>> {
    let first = today
        .checked_sub_days(Days::new(SEED_DAYS as u64))
        .ok_or_else(|| Error::internal("seed window out of range"))?;

    let mut flights = Vec::with_capacity(ROUTES.len() * SEED_DAYS);
    for day in first.iter_days().take(SEED_DAYS) {
        flights.extend(day_records(local_midnight(day)?, &ROUTES, rng));
    }
    Ok(flights)
}

/// Seed the store with a week of history if it has never been seeded.
///
/// The seed and the store's pending-seed mark are written in one
/// transaction, so an interrupted seed is retried on the next open.
/// Returns the number of records inserted.
///
/// # Errors
///
/// Returns an error if generation or the batch insert fails.
pub fn seed_if_needed(storage: &Storage, config: &GeneratorConfig) -> Result<usize> {
    if !storage.needs_seed()? {
        debug!("Database already seeded, skipping seed");
        return Ok(0);
    }
    if !config.seed_on_create {
        info!("Seeding disabled, leaving new database empty");
        storage.insert_seed(&[])?;
        return Ok(0);
    }
    if !storage.was_created() {
        warn!("Previous seed did not complete, seeding again");
    }

    let today = Local::now().date_naive();
    let flights = seed_records(today, &mut rand::thread_rng())?;
    let ids = storage.insert_seed(&flights)?;
    info!("Seeded database with {} flights", ids.len());
    Ok(ids.len())
}

/// Destination for generated batches.
pub trait FlightSink: Send + Sync {
    /// Atomically insert a batch, returning the assigned IDs.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch could not be stored.
    fn insert_batch(&self, flights: &[FlightRecord]) -> Result<Vec<i64>>;
}

impl FlightSink for Storage {
    fn insert_batch(&self, flights: &[FlightRecord]) -> Result<Vec<i64>> {
        self.insert_many(flights)
    }
}

/// Result reported to whatever scheduled the refresh job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The day's batch was stored.
    Success {
        /// Number of records inserted.
        inserted: usize,
    },
    /// The run failed; the scheduler should try again later.
    Retry {
        /// Why the run failed.
        reason: String,
    },
}

impl JobOutcome {
    /// Whether the run succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// The periodic job that appends one day of synthetic flights.
///
/// By default only `NY101` is generated; `all_routes` adds the other two.
/// Concurrent runs are safe since each inserts its batch atomically.
#[derive(Debug)]
pub struct RefreshJob<S = Storage> {
    sink: Arc<S>,
    all_routes: bool,
}

impl<S: FlightSink + 'static> RefreshJob<S> {
    /// Create a refresh job writing to `sink`.
    #[must_use]
    pub fn new(sink: Arc<S>, all_routes: bool) -> Self {
        Self { sink, all_routes }
    }

    /// Create a refresh job using the generator configuration.
    #[must_use]
    pub fn from_config(sink: Arc<S>, config: &GeneratorConfig) -> Self {
        Self::new(sink, config.refresh_all_routes)
    }

    fn routes(&self) -> &'static [Route] {
        if self.all_routes {
            &ROUTES
        } else {
            &ROUTES[..1]
        }
    }

    /// Generate and store today's batch.
    ///
    /// Never fails; errors are logged and reported as [`JobOutcome::Retry`].
    pub fn run(&self) -> JobOutcome {
        self.run_for(Local::now().date_naive(), &mut rand::thread_rng())
    }

    /// Generate and store the batch for `day` using `rng`.
    pub fn run_for<R: Rng + ?Sized>(&self, day: NaiveDate, rng: &mut R) -> JobOutcome {
        match self.try_run(day, rng) {
            Ok(inserted) => {
                info!("Refresh inserted {inserted} flights for {day}");
                JobOutcome::Success { inserted }
            }
            Err(e) => {
                warn!("Refresh for {day} failed, will retry: {e}");
                JobOutcome::Retry {
                    reason: e.to_string(),
                }
            }
        }
    }

    fn try_run<R: Rng + ?Sized>(&self, day: NaiveDate, rng: &mut R) -> Result<usize> {
        let flights = day_records(local_midnight(day)?, self.routes(), rng);
        Ok(self.sink.insert_batch(&flights)?.len())
    }

    /// Run on the blocking pool so async schedulers are not stalled.
    pub async fn run_async(&self) -> JobOutcome {
        let job = Self::new(Arc::clone(&self.sink), self.all_routes);
        match tokio::task::spawn_blocking(move || job.run()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Refresh task failed, will retry: {e}");
                JobOutcome::Retry {
                    reason: Error::from(e).to_string(),
                }
            }
        }
    }
}
