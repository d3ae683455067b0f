//! Live query views.
//!
//! A [`LiveView`] wraps a storage query and keeps its latest result in a
//! `tokio::sync::watch` channel. A background task listens for
//! [`StoreChange`](crate::storage::StoreChange) notifications, re-runs the
//! query on the blocking pool, and publishes the new snapshot when it
//! differs from the previous one.
//!
//! The task stops once the view and every receiver obtained from
//! [`LiveView::subscribe`] have been dropped.

use std::sync::Arc;

use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::watch;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::storage::Storage;

/// A query result that follows the store's contents.
#[derive(Debug)]
pub struct LiveView<T> {
    name: String,
    rx: watch::Receiver<T>,
}

impl<T> LiveView<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Run `query` once and keep re-running it after every committed write.
    ///
    /// Every run of the query, the first included, happens on Tokio's
    /// blocking pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial query fails. Later failures are logged
    /// and the previous snapshot is kept.
    pub async fn spawn<F>(name: impl Into<String>, storage: Arc<Storage>, query: F) -> Result<Self>
    where
        F: Fn(&Storage) -> Result<T> + Send + Sync + 'static,
    {
        let name = name.into();

        // Subscribe first so a write racing the initial query is not lost.
        let mut changes = storage.subscribe();
        let query = Arc::new(query);
        let initial = {
            let storage = Arc::clone(&storage);
            let query = Arc::clone(&query);
            tokio::task::spawn_blocking(move || query(&storage)).await??
        };
        let (tx, rx) = watch::channel(initial);

        let view = name.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = tx.closed() => break,
                    change = changes.recv() => match change {
                        Ok(change) => trace!(view = %view, version = change.version, "Store changed"),
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(view = %view, skipped, "Live view lagged, re-querying");
                        }
                        Err(RecvError::Closed) => break,
                    },
                }

                // Fold any queued notifications into this one re-query.
                loop {
                    match changes.try_recv() {
                        Ok(_) | Err(TryRecvError::Lagged(_)) => {}
                        Err(_) => break,
                    }
                }

                let storage = Arc::clone(&storage);
                let query = Arc::clone(&query);
                match tokio::task::spawn_blocking(move || query(&storage)).await {
                    Ok(Ok(snapshot)) => {
                        tx.send_if_modified(|current| {
                            if *current == snapshot {
                                false
                            } else {
                                *current = snapshot;
                                true
                            }
                        });
                    }
                    Ok(Err(e)) => warn!(view = %view, "Live view query failed: {e}"),
                    Err(e) => warn!(view = %view, "Live view query task failed: {e}"),
                }
            }
            debug!(view = %view, "Live view stopped");
        });

        Ok(Self { name, rx })
    }

    /// Name of this view, used in logs and errors.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The most recent snapshot.
    #[must_use]
    pub fn current(&self) -> T {
        self.rx.borrow().clone()
    }

    /// A new receiver that is notified on every published snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.rx.clone()
    }

    /// Wait for the next snapshot and return it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ViewClosed`] if the background task has stopped.
    pub async fn changed(&mut self) -> Result<T> {
        self.rx
            .changed()
            .await
            .map_err(|_| Error::view_closed(self.name.clone()))?;
        Ok(self.rx.borrow_and_update().clone())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::flight::FlightRecord;

    const WAIT: Duration = Duration::from_secs(5);

    fn flight(flight_number: &str, duration: i64) -> FlightRecord {
        FlightRecord {
            id: None,
            flight_number: flight_number.to_string(),
            origin: "Chicago".to_string(),
            destination: "Miami".to_string(),
            scheduled_departure_time: 0,
            scheduled_arrival_time: duration,
            actual_departure_time: 0,
            actual_arrival_time: duration,
            date: 0,
        }
    }

    #[tokio::test]
    async fn test_initial_snapshot() {
        let storage = Arc::new(Storage::open_in_memory().unwrap());
        storage.insert(&flight("CH202", 1000)).unwrap();

        let view = LiveView::spawn("count", Arc::clone(&storage), Storage::count)
            .await
            .unwrap();
        assert_eq!(view.name(), "count");
        assert_eq!(view.current(), 1);
    }

    #[tokio::test]
    async fn test_changed_after_insert() {
        let storage = Arc::new(Storage::open_in_memory().unwrap());
        let mut view = LiveView::spawn("count", Arc::clone(&storage), Storage::count)
            .await
            .unwrap();
        assert_eq!(view.current(), 0);

        storage.insert(&flight("CH202", 1000)).unwrap();
        let value = timeout(WAIT, view.changed()).await.unwrap().unwrap();
        assert_eq!(value, 1);

        storage
            .insert_many(&[flight("CH202", 1000), flight("SF303", 1000)])
            .unwrap();
        let value = timeout(WAIT, view.changed()).await.unwrap().unwrap();
        assert_eq!(value, 3);
    }

    #[tokio::test]
    async fn test_subscriber_receives_updates() {
        let storage = Arc::new(Storage::open_in_memory().unwrap());
        let view = LiveView::spawn(
            "averages",
            Arc::clone(&storage),
            Storage::average_durations,
        )
        .await
        .unwrap();
        let mut rx = view.subscribe();
        assert!(rx.borrow().is_empty());

        storage
            .insert_many(&[flight("NY101", 21_720_000), flight("NY101", 21_600_000)])
            .unwrap();
        timeout(WAIT, rx.changed()).await.unwrap().unwrap();
        assert_eq!(rx.borrow()["NY101"], 21_660_000);
    }

    #[tokio::test]
    async fn test_unchanged_result_is_not_republished() {
        let storage = Arc::new(Storage::open_in_memory().unwrap());
        let mut view = LiveView::spawn("ch202", Arc::clone(&storage), |s: &Storage| {
            s.records_by_flight_number("CH202")
        })
        .await
        .unwrap();
        let rx = view.subscribe();

        // A write for another flight number leaves this view's result alone.
        storage.insert(&flight("SF303", 1000)).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!rx.has_changed().unwrap());

        storage.insert(&flight("CH202", 1000)).unwrap();

        let value = timeout(WAIT, view.changed()).await.unwrap().unwrap();
        assert_eq!(value.len(), 1);
        assert_eq!(value[0].flight_number, "CH202");
    }

    #[tokio::test]
    async fn test_initial_query_error() {
        let storage = Arc::new(Storage::open_in_memory().unwrap());
        let result: Result<LiveView<i64>> =
            LiveView::spawn("broken", storage, |_: &Storage| Err(Error::internal("nope"))).await;
        assert!(result.is_err());
    }
}
