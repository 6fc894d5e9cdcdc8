use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::directory::ThreadDirectory;

/// Owns a running refresh loop. Dropping it cancels the loop together with
/// any fetch still in flight.
pub struct RefreshHandle {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl RefreshHandle {
    /// Stop the loop and wait for it to exit.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Keep `directory` fresh: fetch once immediately (with the loading flag
/// raised), then every `interval` and whenever `thread_changes` reports a
/// different current thread.
///
/// Refreshes run as independent tasks and may overlap; the directory's
/// tickets decide which result is published.
pub fn spawn_refresher(
    directory: Arc<ThreadDirectory>,
    interval: Option<Duration>,
    mut thread_changes: watch::Receiver<Option<String>>,
) -> RefreshHandle {
    let (shutdown_tx, mut shutdown) = watch::channel(false);

    let task = tokio::spawn(async move {
        directory.set_loading(true);
        let initial = tokio::select! {
            threads = directory.fetch_threads() => Some(threads),
            _ = shutdown.changed() => None,
        };
        directory.set_loading(false);
        let Some(initial) = initial else {
            info!("Thread refresher shut down during the initial load");
            return;
        };
        debug!("Initial thread refresh returned {} threads", initial.len());

        let mut ticker = interval.filter(|d| !d.is_zero()).map(|period| {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker
        });
        if let Some(ticker) = ticker.as_mut() {
            // The first tick completes immediately.
            ticker.tick().await;
        }
        thread_changes.borrow_and_update();

        let mut in_flight: JoinSet<()> = JoinSet::new();
        let mut runtime_alive = true;

        loop {
            tokio::select! {
                _ = next_tick(&mut ticker) => {
                    spawn_fetch(&mut in_flight, &directory);
                }
                changed = thread_changes.changed(), if runtime_alive => {
                    if changed.is_err() {
                        debug!("Conversation runtime dropped; thread-change refreshes stop");
                        runtime_alive = false;
                        continue;
                    }
                    let current = thread_changes.borrow_and_update().clone();
                    debug!("Current thread changed to {current:?}; refreshing");
                    spawn_fetch(&mut in_flight, &directory);
                }
                Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
                _ = shutdown.changed() => {
                    info!("Thread refresher shutting down");
                    break;
                }
            }
        }
        // Dropping the JoinSet aborts fetches that are still running.
    });

    RefreshHandle {
        shutdown: shutdown_tx,
        task: Some(task),
    }
}

fn spawn_fetch(in_flight: &mut JoinSet<()>, directory: &Arc<ThreadDirectory>) {
    let directory = directory.clone();
    in_flight.spawn(async move {
        directory.fetch_threads().await;
    });
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
