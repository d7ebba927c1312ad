use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::session::store::{SessionStore, SessionStoreRef};

/// Handle to the background TTL sweep
#[derive(Debug)]
pub struct SweeperHandle {
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop sweeping. Sessions already in the store are left alone.
    pub fn shutdown(self) {
        self.task.abort();
    }
}

/// Spawn a task that evicts sessions older than `ttl` every `interval`.
///
/// The task runs detached from request handling; a failed sweep is logged and
/// retried on the next tick.
pub fn spawn_sweeper(store: SessionStoreRef, interval: Duration, ttl: Duration) -> SweeperHandle {
    let period = interval.max(Duration::from_millis(1));

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match store.sweep_expired(ttl, Utc::now()).await {
                Ok(0) => debug!("Session sweep found nothing to evict"),
                Ok(count) => info!(count, "Evicted expired sessions"),
                Err(e) => warn!(error = %e, "Session sweep failed"),
            }
        }
    });

    info!(interval_secs = period.as_secs(), ttl_secs = ttl.as_secs(), "Started session sweeper");
    SweeperHandle { task }
}
