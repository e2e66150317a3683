//! Push Relay Dispatch Engine
//!
//! The path from an accepted batch to a delivered notification:
//! - Intake: validation and per-token fan-out onto a bounded queue
//! - Worker pool: W loops draining the queue
//! - Admission: inline versus detached dispatch under a live ceiling
//! - Retry: bounded in-place attempts with per-platform error classification
//! - Stats, push log and metrics
//! - Shutdown drain
//!
//! The HTTP surface lives in [`api`].

pub mod admission;
pub mod api;
pub mod classify;
pub mod engine;
pub mod error;
pub mod intake;
pub mod push_log;
pub mod push_metrics;
pub mod queue;
pub mod retry;
pub mod shutdown;
pub mod stats;
pub mod tracker;
pub mod validator;
pub mod worker;

pub use admission::{AdmissionController, AdmissionPermit};
pub use api::{create_router, AppState};
pub use classify::{classify, ErrorClass};
pub use engine::{DispatchEngine, EngineSettings, PlatformRoute, PlatformRoutes};
pub use error::{ApiError, DispatchError};
pub use intake::{fan_out, spawn_fan_out, IntakeReport, SequenceGenerator};
pub use queue::{DispatchQueue, QueuedUnit};
pub use retry::{deliver, DeliveryOutcome};
pub use shutdown::ShutdownCoordinator;
pub use stats::{PlatformStat, PushStats, StatsSnapshot};
pub use tracker::{InFlightGuard, InFlightTracker};
pub use validator::{validate, ValidationError, ValidationPolicy};
pub use worker::WorkerPool;

pub type Result<T> = std::result::Result<T, DispatchError>;
