//! Dispatch engine context
//!
//! Everything the intake path, the workers and the HTTP handlers share lives
//! in one [`DispatchEngine`], passed around as `Arc<DispatchEngine>`.

use pn_common::Platform;
use pn_config::{AppConfig, CoreConfig};
use pn_gateway::{ApnsClient, FcmV1Client, GcmClient, PushBackend};
use std::sync::Arc;
use tracing::{info, warn};

use crate::admission::AdmissionController;
use crate::error::DispatchError;
use crate::intake::SequenceGenerator;
use crate::queue::DispatchQueue;
use crate::stats::{PushStats, StatsSnapshot};
use crate::tracker::InFlightTracker;
use crate::validator::ValidationPolicy;

/// How units of one platform are delivered.
#[derive(Clone, Default)]
pub struct PlatformRoute {
    pub enabled: bool,
    pub retry_max: u32,
    pub backend: Option<Arc<dyn PushBackend>>,
}

impl PlatformRoute {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn enabled(backend: Arc<dyn PushBackend>, retry_max: u32) -> Self {
        Self {
            enabled: true,
            retry_max,
            backend: Some(backend),
        }
    }
}

impl std::fmt::Debug for PlatformRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformRoute")
            .field("enabled", &self.enabled)
            .field("retry_max", &self.retry_max)
            .field("backend", &self.backend.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlatformRoutes {
    pub ios: PlatformRoute,
    pub android: PlatformRoute,
    pub fcm_v1: PlatformRoute,
}

impl PlatformRoutes {
    pub fn get(&self, platform: Platform) -> &PlatformRoute {
        match platform {
            Platform::Ios => &self.ios,
            Platform::Android => &self.android,
            Platform::FcmV1 => &self.fcm_v1,
        }
    }

    pub fn is_enabled(&self, platform: Platform) -> bool {
        self.get(platform).enabled
    }

    /// Build a gateway client for every enabled platform.
    pub fn from_config(config: &AppConfig) -> Result<Self, DispatchError> {
        let mut routes = Self::default();

        if config.ios.enabled {
            let client = ApnsClient::from_config(&config.ios)?;
            routes.ios = PlatformRoute::enabled(Arc::new(client), config.ios.retry_max);
        }
        if config.android.enabled {
            let client = GcmClient::from_config(&config.android)?;
            routes.android = PlatformRoute::enabled(Arc::new(client), config.android.retry_max);
        }
        if config.fcm_v1.enabled {
            let client = FcmV1Client::from_config(&config.fcm_v1)?;
            routes.fcm_v1 = PlatformRoute::enabled(Arc::new(client), config.fcm_v1.retry_max);
        }

        for platform in Platform::ALL {
            if !routes.is_enabled(platform) {
                warn!(platform = %platform, "Platform disabled; pushes will be logged and dropped");
            }
        }

        Ok(routes)
    }
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub workers: usize,
    pub queue_capacity: usize,
    pub notification_max: usize,
    pub pusher_max: i64,
    pub validation: ValidationPolicy,
}

impl EngineSettings {
    pub fn from_config(core: &CoreConfig) -> Self {
        Self {
            workers: core.workers,
            queue_capacity: core.queues,
            notification_max: core.notification_max,
            pusher_max: core.pusher_max,
            validation: ValidationPolicy {
                allows_empty_message: core.allows_empty_message,
            },
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&CoreConfig::default())
    }
}

pub struct DispatchEngine {
    settings: EngineSettings,
    routes: PlatformRoutes,
    queue: DispatchQueue,
    admission: AdmissionController,
    stats: PushStats,
    tracker: InFlightTracker,
    sequence: SequenceGenerator,
}

impl DispatchEngine {
    pub fn new(settings: EngineSettings, routes: PlatformRoutes) -> Self {
        let tracker = InFlightTracker::new();
        let queue = DispatchQueue::new(settings.queue_capacity, tracker.clone());
        let admission = AdmissionController::new(settings.pusher_max);

        info!(
            workers = settings.workers,
            queue_capacity = settings.queue_capacity,
            pusher_max = settings.pusher_max,
            "Dispatch engine created"
        );

        Self {
            settings,
            routes,
            queue,
            admission,
            stats: PushStats::new(),
            tracker,
            sequence: SequenceGenerator::new(),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn routes(&self) -> &PlatformRoutes {
        &self.routes
    }

    pub fn queue(&self) -> &DispatchQueue {
        &self.queue
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    pub fn stats(&self) -> &PushStats {
        &self.stats
    }

    pub fn tracker(&self) -> &InFlightTracker {
        &self.tracker
    }

    pub fn sequence(&self) -> &SequenceGenerator {
        &self.sequence
    }

    pub fn stats_snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            queue_max: self.queue.capacity(),
            queue_usage: self.queue.depth(),
            pusher_max: self.admission.ceiling(),
            pusher_count: self.admission.live(),
            ios: self.stats.platform(Platform::Ios),
            android: self.stats.platform(Platform::Android),
            fcm_v1: self.stats.platform(Platform::FcmV1),
        }
    }
}
