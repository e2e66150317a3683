//! Push Gateway Clients
//!
//! One client per platform, all behind the [`PushBackend`] trait:
//! - `ApnsClient`: APNs HTTP/2 provider API (certificate or provider token auth)
//! - `GcmClient`: legacy GCM/FCM HTTP API
//! - `FcmV1Client`: FCM HTTP v1 API (service account or static bearer token)
//!
//! Clients are cheap to share: each wraps a pooled `reqwest::Client` and is
//! safe for concurrent use from any number of dispatch tasks.

use async_trait::async_trait;
use pn_common::{DispatchUnit, Platform};
use std::time::Duration;

pub mod apns;
pub mod error;
pub mod fcm_v1;
pub mod gcm;

pub use apns::{ApnsAuth, ApnsClient, ApnsSettings, ProviderToken};
pub use error::{ApnsReason, FcmErrorCode, GcmError, PushError};
pub use fcm_v1::{FcmV1Auth, FcmV1Client, ServiceAccountKey, ServiceAccountTokens};
pub use gcm::GcmClient;

pub type Result<T> = std::result::Result<T, PushError>;

/// Sends one notification to one device token.
///
/// Implementations must bound each call with their own timeout; the caller
/// never cancels a push in flight.
#[async_trait]
pub trait PushBackend: Send + Sync {
    fn platform(&self) -> Platform;

    async fn push(&self, unit: &DispatchUnit) -> Result<()>;
}

/// Connection settings shared by every gateway client.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub keepalive_timeout: Duration,
    pub keepalive_conns: usize,
}

impl HttpSettings {
    pub fn from_secs(timeout: u64, keepalive_timeout: u64, keepalive_conns: usize) -> Self {
        Self {
            timeout: Duration::from_secs(timeout),
            keepalive_timeout: Duration::from_secs(keepalive_timeout),
            keepalive_conns,
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self::from_secs(5, 90, 4)
    }
}

/// Build a pooled client. HTTPS endpoints negotiate HTTP/2 via ALPN.
pub(crate) fn build_http_client(
    settings: &HttpSettings,
    identity: Option<reqwest::Identity>,
) -> Result<reqwest::Client> {
    let keepalive = settings.keepalive_timeout.as_secs();
    let mut builder = reqwest::Client::builder()
        .pool_max_idle_per_host(settings.keepalive_conns)
        .pool_idle_timeout(settings.keepalive_timeout)
        .tcp_keepalive((keepalive > 0).then(|| pn_config::keepalive_interval(keepalive)));

    // A zero timeout means "no timeout", matching the config file semantics.
    if !settings.timeout.is_zero() {
        builder = builder
            .timeout(settings.timeout)
            .connect_timeout(settings.timeout);
    }

    if let Some(identity) = identity {
        builder = builder.identity(identity);
    }

    builder
        .build()
        .map_err(|e| PushError::Config(format!("failed to build http client: {}", e)))
}

/// Read a non-success body for error reporting, tolerating read failures.
pub(crate) async fn read_error_body(response: reqwest::Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|e| format!("<unreadable body: {}>", e))
}
