//! Drain phase of graceful shutdown.
//!
//! Runs after the HTTP listener has stopped. Completes once the queue is empty
//! and nothing is in flight: no pending fan-out, no dispatch (inline or
//! detached) still running. Only then may the worker pool be stopped.

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::engine::DispatchEngine;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct ShutdownCoordinator {
    engine: Arc<DispatchEngine>,
    poll_interval: Duration,
}

impl ShutdownCoordinator {
    pub fn new(engine: Arc<DispatchEngine>) -> Self {
        Self {
            engine,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub async fn drain(&self) {
        let queue = self.engine.queue();
        let tracker = self.engine.tracker();

        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            ticker.tick().await;
            let depth = queue.depth();
            if depth == 0 {
                break;
            }
            info!(queue_depth = depth, "Waiting for dispatch queue to drain");
        }

        loop {
            tokio::select! {
                _ = tracker.wait_idle() => break,
                _ = tokio::time::sleep(self.poll_interval) => {
                    info!(in_flight = tracker.count(), "Waiting for in-flight pushes");
                }
            }
        }

        info!("Dispatch drained");
    }
}
