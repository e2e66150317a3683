//! Prometheus metrics for the dispatch engine

use metrics::{counter, gauge, histogram};
use pn_common::Platform;
use std::time::Duration;

/// Record a unit's final outcome
pub fn record_push(platform: Platform, success: bool) {
    counter!(
        "pn_push_total",
        "platform" => platform.as_str(),
        "outcome" => if success { "success" } else { "error" }
    )
    .increment(1);
}

/// Record one backend call, successful or not
pub fn record_attempt(platform: Platform, duration: Duration) {
    counter!(
        "pn_push_attempts_total",
        "platform" => platform.as_str()
    )
    .increment(1);

    histogram!(
        "pn_push_duration_seconds",
        "platform" => platform.as_str()
    )
    .record(duration.as_secs_f64());
}

/// Record a validation rejection at intake
pub fn record_rejected(reason: &str) {
    counter!(
        "pn_push_rejected_total",
        "reason" => reason.to_string()
    )
    .increment(1);
}

pub fn set_queue_depth(depth: usize) {
    gauge!("pn_queue_depth").set(depth as f64);
}

pub fn set_detached_dispatches(count: i64) {
    gauge!("pn_detached_dispatches").set(count as f64);
}
