//! Periodic eviction of stale jobs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::store::JobStore;

/// Evicts jobs that have not been touched within the TTL.
pub struct ExpirySweeper {
    store: Arc<JobStore>,
    ttl: Duration,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl ExpirySweeper {
    pub fn new(store: Arc<JobStore>, ttl: Duration, interval: Duration) -> Self {
        Self {
            store,
            ttl,
            interval,
            shutdown: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
        }
    }

    /// Runs one eviction pass and returns the number of jobs removed.
    pub fn sweep(&self) -> usize {
        sweep_once(&self.store, self.ttl)
    }

    /// Start the sweep loop on the current tokio runtime.
    pub fn start(&self) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let shutdown = Arc::clone(&self.shutdown);
        let wake = Arc::clone(&self.wake);
        let ttl = self.ttl;
        let interval = self.interval;

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(interval);
            interval_timer.tick().await; // skip immediate first tick

            loop {
                if shutdown.load(Ordering::Acquire) {
                    break;
                }

                tokio::select! {
                    _ = interval_timer.tick() => {},
                    _ = wake.notified() => {},
                }

                if shutdown.load(Ordering::Acquire) {
                    break;
                }

                sweep_once(&store, ttl);
            }
            log::debug!("Expiry sweeper stopped");
        })
    }

    /// Signals the sweeper to stop.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.wake.notify_one();
    }
}

fn sweep_once(store: &JobStore, ttl: Duration) -> usize {
    let ttl = match chrono::Duration::from_std(ttl) {
        Ok(ttl) => ttl,
        Err(e) => {
            log::error!("Job TTL out of range, skipping sweep: {}", e);
            return 0;
        }
    };
    let evicted = store.evict_expired(ttl, chrono::Utc::now());
    if evicted > 0 {
        log::info!("Evicted {} expired jobs, {} remaining", evicted, store.len());
    }
    evicted
}
