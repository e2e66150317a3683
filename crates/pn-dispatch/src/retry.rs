//! Bounded per-unit delivery loop.
//!
//! Retries run in place, in whichever task owns the unit. A unit never goes
//! back onto the queue.

use pn_common::DispatchUnit;
use pn_gateway::PushBackend;
use std::time::Instant;
use tracing::debug;

use crate::classify::{classify, ErrorClass};
use crate::stats::PushStats;
use crate::{push_log, push_metrics};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { attempts: u32 },
    Failed { attempts: u32, class: ErrorClass },
}

impl DeliveryOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            DeliveryOutcome::Delivered { attempts } | DeliveryOutcome::Failed { attempts, .. } => *attempts,
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }
}

/// Push `unit` at most `retry_max + 1` times, stopping at the first success or
/// terminal error. Every failed attempt is logged; stats record the outcome once.
pub async fn deliver(
    stats: &PushStats,
    backend: &dyn PushBackend,
    retry_max: u32,
    mut unit: DispatchUnit,
) -> DeliveryOutcome {
    let platform = unit.platform;
    let mut attempts = 0;
    let mut last_class = ErrorClass::Terminal;

    for attempt in 0..=retry_max {
        unit.attempt = attempt;
        attempts = attempt + 1;

        let started = Instant::now();
        let result = backend.push(&unit).await;
        let elapsed = started.elapsed();
        push_metrics::record_attempt(platform, elapsed);

        match result {
            Ok(()) => {
                push_log::succeeded(&unit, elapsed);
                stats.record_success(platform);
                push_metrics::record_push(platform, true);
                return DeliveryOutcome::Delivered { attempts };
            }
            Err(error) => {
                push_log::failed(&unit, &error, elapsed);
                last_class = classify(&error, platform);
                if !last_class.is_retryable() {
                    break;
                }
                if attempt < retry_max {
                    debug!(seq_id = unit.seq_id, attempt, retry_max, "Retrying push");
                }
            }
        }
    }

    stats.record_error(platform);
    push_metrics::record_push(platform, false);
    DeliveryOutcome::Failed {
        attempts,
        class: last_class,
    }
}
