//! Background driver that runs the sweeper on a fixed interval.

use std::sync::Arc;
use std::time::Duration;

use paidrelay_core::INode;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::sweeper::Sweeper;

/// Runs a sweep every `interval` until shut down.
///
/// The first sweep starts immediately. A failed pass is logged and the next
/// one runs on schedule.
pub struct SweeperTask {
    sweeper: Sweeper,
    node: Arc<dyn INode>,
    interval: Duration,
}

impl SweeperTask {
    pub fn new(sweeper: Sweeper, node: Arc<dyn INode>, interval: Duration) -> Self {
        Self {
            sweeper,
            node,
            interval,
        }
    }

    /// Use the sweeper's configured interval.
    pub fn from_sweeper(sweeper: Sweeper, node: Arc<dyn INode>) -> Self {
        let interval = sweeper.config().interval();
        Self::new(sweeper, node, interval)
    }

    /// Run until `shutdown` becomes `true` or its sender is dropped.
    ///
    /// Returns the number of sweep passes started.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> usize {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut passes = 0;

        tracing::info!(interval_secs = self.interval.as_secs(), "sweeper task started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {
                    passes += 1;
                    if let Err(e) = self.sweeper.sweep(self.node.as_ref()).await {
                        tracing::error!(error = %e, "sweep pass failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!(passes, "sweeper task stopped");
        passes
    }
}
