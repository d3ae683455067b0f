//! `flightstats` - Flight records and per-flight-number average durations
//!
//! This library stores flight legs in a local `SQLite` database, derives the
//! average actual duration of each flight number, and exposes both as live
//! views that update after every write. A synthetic data generator seeds new
//! databases and appends a day of flights when the refresh job runs.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod error;
pub mod flight;
pub mod generator;
pub mod live;
pub mod logging;
pub mod report;
pub mod repository;
pub mod storage;

pub use config::Config;
pub use error::{Error, Result};
pub use flight::{FlightAverage, FlightRecord};
pub use generator::{JobOutcome, RefreshJob};
pub use live::LiveView;
pub use logging::init_logging;
pub use repository::FlightRepository;
pub use storage::{Storage, StorageStats, StoreChange};
