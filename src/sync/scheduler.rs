//! Periodic job runner
//!
//! Each job ticks on its own `tokio::time::interval`. A tick runs as a
//! spawned task so a slow tick never delays the timer; the per-job
//! `running` flag makes a tick that fires while the previous one is still
//! in flight skip instead of overlapping. Failed ticks are logged and the
//! next tick runs as scheduled.

use crate::error::MonitorResult;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

/// `tokio::time::interval` panics on a zero period
const MIN_PERIOD: Duration = Duration::from_millis(1);

#[derive(Debug, Default)]
pub struct JobStats {
    pub started: AtomicU64,
    pub skipped: AtomicU64,
    pub failed: AtomicU64,
}

/// Held for the duration of one tick; clears the running flag on drop
pub struct RunningGuard {
    running: Arc<AtomicBool>,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

pub struct PeriodicJob {
    name: &'static str,
    period: Duration,
    running: Arc<AtomicBool>,
    stats: Arc<JobStats>,
}

impl PeriodicJob {
    pub fn new(name: &'static str, period: Duration) -> Self {
        Self {
            name,
            period: period.max(MIN_PERIOD),
            running: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(JobStats::default()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn stats(&self) -> Arc<JobStats> {
        self.stats.clone()
    }

    /// Claim the job for one tick, or `None` while a tick is in flight
    pub fn try_begin(&self) -> Option<RunningGuard> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunningGuard {
                running: self.running.clone(),
            })
    }

    /// Run `tick` every period until the returned handle is aborted
    pub fn spawn<F, Fut, T>(self, tick: F) -> JoinHandle<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = MonitorResult<T>> + Send + 'static,
        T: std::fmt::Debug + Send + 'static,
    {
        tokio::spawn(async move {
            log::info!("⏰ Starting {} job (interval: {:?})", self.name, self.period);

            let mut timer = interval(self.period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                timer.tick().await;

                let guard = match self.try_begin() {
                    Some(guard) => guard,
                    None => {
                        self.stats.skipped.fetch_add(1, Ordering::Relaxed);
                        log::warn!("⏭️  {} tick skipped: previous tick still running", self.name);
                        continue;
                    }
                };
                self.stats.started.fetch_add(1, Ordering::Relaxed);

                let name = self.name;
                let stats = self.stats.clone();
                let fut = tick();
                tokio::spawn(async move {
                    let _guard = guard;
                    match fut.await {
                        Ok(result) => log::debug!("✅ {} tick: {:?}", name, result),
                        Err(e) => {
                            stats.failed.fetch_add(1, Ordering::Relaxed);
                            log::error!("❌ {} tick failed: {}", name, e);
                        }
                    }
                });
            }
        })
    }
}
