//! Intake and fan-out
//!
//! Turns accepted `/push` batches into one [`DispatchUnit`] per token. Runs
//! after the HTTP reply has been sent; per-request problems only reach the
//! push log.

use pn_common::{DispatchUnit, NotificationRequest};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::engine::DispatchEngine;
use crate::validator::validate;
use crate::{push_log, push_metrics};

/// Process-wide sequence ids: strictly increasing, starting at 1, never reused.
#[derive(Debug)]
pub struct SequenceGenerator {
    next: AtomicU64,
}

impl SequenceGenerator {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for SequenceGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntakeReport {
    /// Units placed on the queue
    pub accepted: usize,
    /// Units dropped because their platform is disabled
    pub disabled: usize,
    /// Requests that failed validation
    pub rejected: usize,
}

/// Validate each request and enqueue one unit per token.
///
/// An invalid request contributes no units at all. Waits whenever the queue
/// is full.
pub async fn fan_out(engine: &DispatchEngine, notifications: Vec<NotificationRequest>) -> IntakeReport {
    let mut report = IntakeReport::default();

    for request in notifications {
        let platform = match validate(&request, &engine.settings().validation) {
            Ok(platform) => platform,
            Err(e) => {
                push_log::invalid_request(&request, &e);
                push_metrics::record_rejected(&e.to_string());
                report.rejected += 1;
                continue;
            }
        };

        let enabled = engine.routes().is_enabled(platform);
        let NotificationRequest { tokens, content } = request;
        let content = Arc::new(content);

        for token in tokens {
            let unit = DispatchUnit::new(engine.sequence().next(), token, platform, content.clone());

            if !enabled {
                push_log::disabled(&unit);
                report.disabled += 1;
                continue;
            }

            push_log::accepted(&unit);
            let seq_id = unit.seq_id;
            match engine.queue().enqueue(unit).await {
                Ok(()) => report.accepted += 1,
                Err(e) => error!(seq_id, error = %e, "Failed to enqueue unit"),
            }
        }
    }

    debug!(
        accepted = report.accepted,
        disabled = report.disabled,
        rejected = report.rejected,
        "Fan-out complete"
    );
    report
}

/// Run [`fan_out`] in a detached task, registered with the in-flight tracker
/// before it starts so a drain cannot miss it.
pub fn spawn_fan_out(engine: Arc<DispatchEngine>, notifications: Vec<NotificationRequest>) -> JoinHandle<IntakeReport> {
    let guard = engine.tracker().enter();

    tokio::spawn(async move {
        let report = fan_out(&engine, notifications).await;
        drop(guard);
        report
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_starts_at_one_and_increases() {
        let sequence = SequenceGenerator::new();
        assert_eq!(sequence.next(), 1);
        assert_eq!(sequence.next(), 2);
        assert_eq!(sequence.next(), 3);
    }

    #[test]
    fn test_sequence_unique_across_threads() {
        let sequence = Arc::new(SequenceGenerator::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let sequence = sequence.clone();
                std::thread::spawn(move || (0..1000).map(|_| sequence.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut ids: Vec<u64> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 4000);
        assert_eq!(ids[0], 1);
    }
}
