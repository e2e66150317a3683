//! Shared fixtures for dispatch integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use pn_common::{DispatchUnit, NotificationContent, NotificationRequest, Platform};
use pn_dispatch::push_log::PUSH_LOG_TARGET;
use pn_dispatch::{DispatchEngine, EngineSettings, PlatformRoute, PlatformRoutes, ValidationPolicy};
use pn_gateway::{ApnsReason, PushBackend, PushError};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Succeed,
    Retryable,
    Terminal,
    /// Panic on the given sequence id, succeed otherwise
    PanicOn(u64),
}

/// Backend with a fixed behavior, an optional delay and a call log.
pub struct MockBackend {
    platform: Platform,
    behavior: Behavior,
    delay: Duration,
    calls: AtomicU32,
    seen: Mutex<Vec<u64>>,
}

impl MockBackend {
    pub fn new(platform: Platform, behavior: Behavior) -> Arc<Self> {
        Self::with_delay(platform, behavior, Duration::ZERO)
    }

    pub fn with_delay(platform: Platform, behavior: Behavior, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            platform,
            behavior,
            delay,
            calls: AtomicU32::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<u64> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl PushBackend for MockBackend {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn push(&self, unit: &DispatchUnit) -> pn_gateway::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().push(unit.seq_id);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match self.behavior {
            Behavior::Succeed => Ok(()),
            Behavior::Retryable => Err(PushError::Apns {
                status: 503,
                reason: ApnsReason::ServiceUnavailable,
            }),
            Behavior::Terminal => Err(PushError::Apns {
                status: 410,
                reason: ApnsReason::Unregistered,
            }),
            Behavior::PanicOn(seq_id) if unit.seq_id == seq_id => panic!("backend crashed on unit {}", seq_id),
            Behavior::PanicOn(_) => Ok(()),
        }
    }
}

pub fn settings(queue_capacity: usize, pusher_max: i64) -> EngineSettings {
    EngineSettings {
        workers: 2,
        queue_capacity,
        notification_max: 100,
        pusher_max,
        validation: ValidationPolicy::default(),
    }
}

/// Engine with only iOS routed to `backend`.
pub fn ios_engine(backend: Arc<MockBackend>, retry_max: u32, settings: EngineSettings) -> Arc<DispatchEngine> {
    let routes = PlatformRoutes {
        ios: PlatformRoute::enabled(backend, retry_max),
        ..Default::default()
    };
    Arc::new(DispatchEngine::new(settings, routes))
}

pub fn request(platform: Platform, tokens: &[&str], message: &str) -> NotificationRequest {
    NotificationRequest {
        tokens: tokens.iter().map(|t| t.to_string()).collect(),
        content: NotificationContent {
            platform: platform.code(),
            message: message.to_string(),
            ..Default::default()
        },
    }
}

/// Poll `condition` until it holds or `timeout` passes.
pub async fn wait_for<F: Fn() -> bool>(condition: F, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

// ============================================================================
// Push log capture
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct PushLogEntry {
    pub status: String,
    pub seq_id: Option<u64>,
    pub token: String,
    pub error: Option<String>,
}

#[derive(Default)]
struct EntryVisitor(PushLogEntry);

impl Visit for EntryVisitor {
    fn record_u64(&mut self, field: &Field, value: u64) {
        if field.name() == "seq_id" {
            self.0.seq_id = Some(value);
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.record_value(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record_value(field, format!("{:?}", value));
    }
}

impl EntryVisitor {
    fn record_value(&mut self, field: &Field, value: String) {
        match field.name() {
            "status" => self.0.status = value,
            "token" => self.0.token = value,
            "error" => self.0.error = Some(value),
            _ => {}
        }
    }
}

/// Collects push log events emitted on the current thread.
#[derive(Clone, Default)]
pub struct PushLogCapture {
    entries: Arc<Mutex<Vec<PushLogEntry>>>,
}

impl PushLogCapture {
    /// Install as the thread's default subscriber for the guard's lifetime.
    /// Tests using this must run on the current-thread runtime.
    pub fn install() -> (Self, tracing::subscriber::DefaultGuard) {
        let capture = Self::default();
        let subscriber = tracing_subscriber::registry().with(capture.clone());
        let guard = tracing::subscriber::set_default(subscriber);
        (capture, guard)
    }

    pub fn entries(&self) -> Vec<PushLogEntry> {
        self.entries.lock().clone()
    }

    pub fn with_status(&self, status: &str) -> Vec<PushLogEntry> {
        self.entries().into_iter().filter(|e| e.status == status).collect()
    }
}

impl<S: Subscriber> Layer<S> for PushLogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if event.metadata().target() != PUSH_LOG_TARGET {
            return;
        }
        let mut visitor = EntryVisitor::default();
        event.record(&mut visitor);
        self.entries.lock().push(visitor.0);
    }
}
