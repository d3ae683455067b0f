//! Async facade over [`Storage`].
//!
//! The repository is what consumers hold. Writes and one-shot reads run on
//! Tokio's blocking pool; the list and average queries are exposed as
//! [`LiveView`]s that follow the store.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::Result;
use crate::flight::FlightRecord;
use crate::live::LiveView;
use crate::storage::{Storage, StorageStats};

/// Pass-through repository for flight records and their averages.
#[derive(Debug, Clone)]
pub struct FlightRepository {
    storage: Arc<Storage>,
}

impl FlightRepository {
    /// Wrap a shared storage instance.
    #[must_use]
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// The underlying storage.
    #[must_use]
    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Storage) -> Result<T> + Send + 'static,
    {
        let storage = Arc::clone(&self.storage);
        tokio::task::spawn_blocking(move || f(&storage)).await?
    }

    /// Insert one flight, returning its assigned ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn insert(&self, flight: FlightRecord) -> Result<i64> {
        self.blocking(move |s| s.insert(&flight)).await
    }

    /// Insert a batch atomically, returning the assigned IDs.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn insert_many(&self, flights: Vec<FlightRecord>) -> Result<Vec<i64>> {
        self.blocking(move |s| s.insert_many(&flights)).await
    }

    /// Live list of every flight.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial query fails.
    pub async fn all_flights(&self) -> Result<LiveView<Vec<FlightRecord>>> {
        LiveView::spawn("all_flights", Arc::clone(&self.storage), Storage::all_records).await
    }

    /// Live list of the flights with one flight number.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial query fails.
    pub async fn flights_by_number(
        &self,
        flight_number: &str,
    ) -> Result<LiveView<Vec<FlightRecord>>> {
        let number = flight_number.to_string();
        LiveView::spawn(
            format!("flights_by_number({flight_number})"),
            Arc::clone(&self.storage),
            move |s: &Storage| s.records_by_flight_number(&number),
        )
        .await
    }

    /// Live map from flight number to average actual duration (ms).
    ///
    /// # Errors
    ///
    /// Returns an error if the initial query fails.
    pub async fn average_durations(&self) -> Result<LiveView<BTreeMap<String, i64>>> {
        LiveView::spawn(
            "average_durations",
            Arc::clone(&self.storage),
            Storage::average_durations,
        )
        .await
    }

    /// Average actual duration (ms) for one flight number; 0 if unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn average_duration_for(&self, flight_number: &str) -> Result<i64> {
        let number = flight_number.to_string();
        self.blocking(move |s| s.average_duration_for(&number)).await
    }

    /// Storage statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn stats(&self) -> Result<StorageStats> {
        self.blocking(Storage::stats).await
    }
}
