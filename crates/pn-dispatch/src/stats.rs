//! Per-platform delivery counters and the `/stat/app` snapshot.

use pn_common::Platform;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use utoipa::ToSchema;

#[derive(Debug, Default)]
struct PlatformCounters {
    success: AtomicU64,
    error: AtomicU64,
}

impl PlatformCounters {
    fn snapshot(&self) -> PlatformStat {
        PlatformStat {
            push_success: self.success.load(Ordering::Relaxed),
            push_error: self.error.load(Ordering::Relaxed),
        }
    }
}

/// Counts one outcome per dispatch unit, never per attempt.
#[derive(Debug, Default)]
pub struct PushStats {
    ios: PlatformCounters,
    android: PlatformCounters,
    fcm_v1: PlatformCounters,
}

impl PushStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn counters(&self, platform: Platform) -> &PlatformCounters {
        match platform {
            Platform::Ios => &self.ios,
            Platform::Android => &self.android,
            Platform::FcmV1 => &self.fcm_v1,
        }
    }

    pub fn record_success(&self, platform: Platform) {
        self.counters(platform).success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self, platform: Platform) {
        self.counters(platform).error.fetch_add(1, Ordering::Relaxed);
    }

    pub fn platform(&self, platform: Platform) -> PlatformStat {
        self.counters(platform).snapshot()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct PlatformStat {
    pub push_success: u64,
    pub push_error: u64,
}

/// Point-in-time view. Fields are loaded individually, so totals taken while
/// pushes complete may be mutually inconsistent by a few counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct StatsSnapshot {
    pub queue_max: usize,
    pub queue_usage: usize,
    pub pusher_max: i64,
    pub pusher_count: i64,
    pub ios: PlatformStat,
    pub android: PlatformStat,
    pub fcm_v1: PlatformStat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_are_per_platform() {
        let stats = PushStats::new();
        stats.record_success(Platform::Ios);
        stats.record_success(Platform::Ios);
        stats.record_error(Platform::Android);

        assert_eq!(
            stats.platform(Platform::Ios),
            PlatformStat {
                push_success: 2,
                push_error: 0
            }
        );
        assert_eq!(stats.platform(Platform::Android).push_error, 1);
        assert_eq!(stats.platform(Platform::FcmV1), PlatformStat::default());
    }

    #[test]
    fn test_snapshot_wire_format() {
        let snapshot = StatsSnapshot {
            queue_max: 512,
            queue_usage: 3,
            pusher_max: 10,
            pusher_count: 2,
            ios: PlatformStat {
                push_success: 5,
                push_error: 1,
            },
            android: PlatformStat::default(),
            fcm_v1: PlatformStat::default(),
        };

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["queue_max"], 512);
        assert_eq!(json["pusher_count"], 2);
        assert_eq!(json["ios"]["push_success"], 5);
        assert_eq!(json["fcm_v1"]["push_error"], 0);
    }
}
