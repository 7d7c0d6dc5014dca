//! Scheduled driver for the review pipeline.
//!
//! One task, one tick at a time. A slow tick delays the next one instead
//! of overlapping it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::pipeline::processor::ReviewPipeline;

/// Spawns the polling task.
pub struct ReviewPoller;

impl ReviewPoller {
    /// Start ticking `pipeline` every `interval`. The first tick runs immediately.
    pub fn spawn(pipeline: Arc<ReviewPipeline>, interval: Duration) -> PollerHandle {
        let shutdown = Arc::new(AtomicBool::new(false));
        let wake = Arc::new(Notify::new());

        let task_shutdown = Arc::clone(&shutdown);
        let task_wake = Arc::clone(&wake);
        let handle = tokio::spawn(async move {
            info!("Review poller started, polling every {}s", interval.as_secs_f64());

            let mut tick = tokio::time::interval(interval);
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = tick.tick() => {}
                    _ = task_wake.notified() => {}
                }

                if task_shutdown.load(Ordering::Relaxed) {
                    info!("Review poller shutting down");
                    return;
                }

                let report = pipeline.run_tick().await;
                if report.search_failed {
                    error!(tick = %report.tick_id, "Tick aborted: mailbox unavailable");
                } else if !report.is_empty() {
                    info!(
                        tick = %report.tick_id,
                        listed = report.listed,
                        reviewed = report.reviewed,
                        general = report.general,
                        malformed = report.malformed,
                        retained = report.retained,
                        fetch_failed = report.fetch_failed,
                        aborted = report.aborted,
                        "Tick complete"
                    );
                }
            }
        });

        PollerHandle {
            handle,
            shutdown,
            wake,
        }
    }
}

/// Running poller. Dropping it leaves the task running; call [`stop`](Self::stop).
pub struct PollerHandle {
    handle: JoinHandle<()>,
    shutdown: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl PollerHandle {
    /// Request shutdown and wait for the in-flight tick, if any, to finish.
    pub async fn stop(self) {
        self.shutdown.store(true, Ordering::Relaxed);
        self.wake.notify_one();
        if let Err(e) = self.handle.await {
            error!("Review poller task failed: {e}");
        }
    }
}
