//! APNs provider API client
//!
//! Sends `POST {host}/3/device/{token}` with the `aps` payload. Authentication
//! is either a TLS client certificate or an ES256 provider token carried in the
//! `authorization` header.

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use parking_lot::RwLock;
use pn_common::{DispatchUnit, NotificationContent, Platform};
use pn_config::IosConfig;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::path::Path;
use tracing::{debug, info};

use crate::{build_http_client, read_error_body, HttpSettings, PushBackend, PushError, Result};
use crate::error::ApnsReason;

pub const DEVELOPMENT_HOST: &str = "https://api.development.push.apple.com";
pub const PRODUCTION_HOST: &str = "https://api.push.apple.com";

/// Maximum payload size accepted by APNs for regular notifications.
pub const MAX_PAYLOAD_SIZE: usize = 4096;

/// Provider tokens must be refreshed at most once every 20 minutes and are
/// rejected after an hour.
const TOKEN_REFRESH_SECS: i64 = 50 * 60;

// ============================================================================
// Provider token
// ============================================================================

#[derive(Debug, Serialize)]
struct ProviderClaims<'a> {
    iss: &'a str,
    iat: i64,
}

struct CachedToken {
    bearer: String,
    issued_at: i64,
}

/// ES256 provider token signed with a `.p8` auth key, cached between refreshes.
pub struct ProviderToken {
    key: EncodingKey,
    key_id: String,
    team_id: String,
    cached: RwLock<Option<CachedToken>>,
}

impl ProviderToken {
    pub fn new(key_pem: &[u8], key_id: impl Into<String>, team_id: impl Into<String>) -> Result<Self> {
        let key = EncodingKey::from_ec_pem(key_pem)
            .map_err(|e| PushError::Config(format!("invalid APNs auth key: {}", e)))?;

        Ok(Self {
            key,
            key_id: key_id.into(),
            team_id: team_id.into(),
            cached: RwLock::new(None),
        })
    }

    pub fn from_file(path: impl AsRef<Path>, key_id: impl Into<String>, team_id: impl Into<String>) -> Result<Self> {
        let path = path.as_ref();
        let pem = std::fs::read(path)
            .map_err(|e| PushError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::new(&pem, key_id, team_id)
    }

    /// Current bearer token, signing a new one when the cached token is stale.
    pub fn bearer(&self) -> Result<String> {
        let now = Utc::now().timestamp();

        if let Some(cached) = self.cached.read().as_ref() {
            if now - cached.issued_at < TOKEN_REFRESH_SECS {
                return Ok(cached.bearer.clone());
            }
        }

        let mut cached = self.cached.write();
        // Another task may have refreshed while we waited for the write lock.
        if let Some(current) = cached.as_ref() {
            if now - current.issued_at < TOKEN_REFRESH_SECS {
                return Ok(current.bearer.clone());
            }
        }

        let mut header = Header::new(Algorithm::ES256);
        header.kid = Some(self.key_id.clone());
        let claims = ProviderClaims {
            iss: &self.team_id,
            iat: now,
        };
        let bearer = jsonwebtoken::encode(&header, &claims, &self.key)?;

        debug!(key_id = %self.key_id, "Signed new APNs provider token");
        *cached = Some(CachedToken {
            bearer: bearer.clone(),
            issued_at: now,
        });
        Ok(bearer)
    }
}

// ============================================================================
// Client
// ============================================================================

pub enum ApnsAuth {
    /// Trust established by the TLS identity, or by a proxy in front of APNs
    Certificate(Option<reqwest::Identity>),
    Token(ProviderToken),
}

#[derive(Debug, Clone)]
pub struct ApnsSettings {
    pub host: String,
    pub topic: String,
    pub apns_id: String,
    pub http: HttpSettings,
}

impl ApnsSettings {
    pub fn from_config(config: &IosConfig) -> Self {
        let host = if !config.endpoint.is_empty() {
            config.endpoint.clone()
        } else if config.sandbox {
            DEVELOPMENT_HOST.to_string()
        } else {
            PRODUCTION_HOST.to_string()
        };

        Self {
            host,
            topic: config.topic.clone(),
            apns_id: config.apns_id.clone(),
            http: HttpSettings::from_secs(config.timeout, config.keepalive_timeout, config.keepalive_conns),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApnsErrorBody {
    reason: String,
}

pub struct ApnsClient {
    client: reqwest::Client,
    settings: ApnsSettings,
    token: Option<ProviderToken>,
}

impl ApnsClient {
    pub fn new(settings: ApnsSettings, auth: ApnsAuth) -> Result<Self> {
        let (identity, token) = match auth {
            ApnsAuth::Certificate(identity) => (identity, None),
            ApnsAuth::Token(token) => (None, Some(token)),
        };
        let client = build_http_client(&settings.http, identity)?;

        Ok(Self {
            client,
            settings,
            token,
        })
    }

    /// Build a client from the `[ios]` section, reading key material from disk.
    pub fn from_config(config: &IosConfig) -> Result<Self> {
        let settings = ApnsSettings::from_config(config);

        let auth = if config.is_token_based() {
            ApnsAuth::Token(ProviderToken::from_file(
                &config.token_auth_key_path,
                &config.token_auth_key_id,
                &config.token_auth_team_id,
            )?)
        } else if config.is_certificate_based() {
            if !config.pem_key_passphrase.is_empty() {
                return Err(PushError::Config(
                    "encrypted APNs keys are not supported; decrypt pem_key_path first".to_string(),
                ));
            }
            ApnsAuth::Certificate(Some(load_identity(&config.pem_cert_path, &config.pem_key_path)?))
        } else {
            return Err(PushError::Config("no APNs credentials configured".to_string()));
        };

        info!(host = %settings.host, topic = %settings.topic, "APNs client configured");
        Self::new(settings, auth)
    }

    fn request_url(&self, token: &str) -> String {
        format!("{}/3/device/{}", self.settings.host.trim_end_matches('/'), token)
    }
}

fn load_identity(cert_path: &str, key_path: &str) -> Result<reqwest::Identity> {
    let read = |path: &str| {
        std::fs::read(path).map_err(|e| PushError::Config(format!("failed to read {}: {}", path, e)))
    };

    let mut pem = read(cert_path)?;
    pem.push(b'\n');
    pem.extend(read(key_path)?);

    reqwest::Identity::from_pem(&pem)
        .map_err(|e| PushError::Config(format!("invalid APNs certificate or key: {}", e)))
}

/// Build the APNs JSON payload: the `aps` dictionary plus extension keys at
/// the top level. Extensions never replace `aps`.
pub fn build_payload(content: &NotificationContent) -> Map<String, Value> {
    let mut alert = Map::new();
    if !content.title.is_empty() {
        alert.insert("title".to_string(), json!(content.title));
    }
    if !content.subtitle.is_empty() {
        alert.insert("subtitle".to_string(), json!(content.subtitle));
    }
    if !content.message.is_empty() {
        alert.insert("body".to_string(), json!(content.message));
    }

    let mut aps = Map::new();
    if !alert.is_empty() {
        aps.insert("alert".to_string(), Value::Object(alert));
    }
    if let Some(badge) = content.badge {
        aps.insert("badge".to_string(), json!(badge.max(0)));
    }
    if !content.sound.is_empty() {
        aps.insert("sound".to_string(), json!(content.sound));
    }
    if !content.category.is_empty() {
        aps.insert("category".to_string(), json!(content.category));
    }
    if content.content_available {
        aps.insert("content-available".to_string(), json!(1));
    }
    if content.mutable_content {
        aps.insert("mutable-content".to_string(), json!(1));
    }

    let mut payload = Map::new();
    payload.insert("aps".to_string(), Value::Object(aps));
    for entry in &content.extend {
        if entry.key != "aps" {
            payload.insert(entry.key.clone(), json!(entry.value));
        }
    }
    payload
}

#[async_trait]
impl PushBackend for ApnsClient {
    fn platform(&self) -> Platform {
        Platform::Ios
    }

    async fn push(&self, unit: &DispatchUnit) -> Result<()> {
        let content = &unit.content;
        let body = serde_json::to_vec(&build_payload(content))?;
        if body.len() > MAX_PAYLOAD_SIZE {
            return Err(PushError::PayloadTooLarge {
                size: body.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }

        let push_type = content.push_type();
        let mut request = self
            .client
            .post(self.request_url(&unit.token))
            .header("content-type", "application/json")
            .header("apns-push-type", push_type.as_str())
            .header("apns-priority", push_type.apns_priority().to_string());

        if !self.settings.topic.is_empty() {
            request = request.header("apns-topic", &self.settings.topic);
        }
        if !self.settings.apns_id.is_empty() {
            request = request.header("apns-id", &self.settings.apns_id);
        }
        if !content.collapse_key.is_empty() {
            request = request.header("apns-collapse-id", &content.collapse_key);
        }
        if let Some(expiration) = expiration_at(Utc::now().timestamp(), content.expiry) {
            request = request.header("apns-expiration", expiration.to_string());
        }
        if let Some(token) = &self.token {
            request = request.header("authorization", format!("bearer {}", token.bearer()?));
        }

        let response = request.body(body).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let status = status.as_u16();
        let body = read_error_body(response).await;
        match serde_json::from_str::<ApnsErrorBody>(&body) {
            Ok(error) => Err(PushError::Apns {
                status,
                reason: ApnsReason::parse(&error.reason),
            }),
            Err(_) => Err(PushError::Status { status, body }),
        }
    }
}

/// Absolute `apns-expiration` for a relative expiry in seconds. Zero or
/// negative means no header.
fn expiration_at(now: i64, expiry: i64) -> Option<i64> {
    (expiry > 0).then(|| now.saturating_add(expiry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pn_common::ExtendEntry;

    #[test]
    fn test_payload_alert_fields() {
        let content = NotificationContent {
            platform: 1,
            title: "Title".to_string(),
            message: "Hello".to_string(),
            badge: Some(2),
            sound: "default".to_string(),
            content_available: true,
            ..Default::default()
        };

        let payload = Value::Object(build_payload(&content));
        assert_eq!(payload["aps"]["alert"]["title"], "Title");
        assert_eq!(payload["aps"]["alert"]["body"], "Hello");
        assert!(payload["aps"]["alert"].get("subtitle").is_none());
        assert_eq!(payload["aps"]["badge"], 2);
        assert_eq!(payload["aps"]["sound"], "default");
        assert_eq!(payload["aps"]["content-available"], 1);
        assert!(payload["aps"].get("mutable-content").is_none());
    }

    #[test]
    fn test_negative_badge_clamps_to_zero() {
        let content = NotificationContent {
            message: "hi".to_string(),
            badge: Some(-4),
            ..Default::default()
        };

        let payload = build_payload(&content);
        assert_eq!(payload["aps"]["badge"], 0);
    }

    #[test]
    fn test_expiration_saturates() {
        assert_eq!(expiration_at(1_000, 60), Some(1_060));
        assert_eq!(expiration_at(1_000, 0), None);
        assert_eq!(expiration_at(1_000, -5), None);
        assert_eq!(expiration_at(1_000, i64::MAX), Some(i64::MAX));
    }

    #[test]
    fn test_payload_extend_cannot_replace_aps() {
        let content = NotificationContent {
            message: "hi".to_string(),
            extend: vec![
                ExtendEntry { key: "url".to_string(), value: "https://example.com".to_string() },
                ExtendEntry { key: "aps".to_string(), value: "nope".to_string() },
            ],
            ..Default::default()
        };

        let payload = build_payload(&content);
        assert_eq!(payload["url"], "https://example.com");
        assert!(payload["aps"].is_object());
    }

    #[test]
    fn test_settings_host_selection() {
        let mut config = IosConfig::default();
        assert_eq!(ApnsSettings::from_config(&config).host, DEVELOPMENT_HOST);

        config.sandbox = false;
        assert_eq!(ApnsSettings::from_config(&config).host, PRODUCTION_HOST);

        config.endpoint = "http://127.0.0.1:9999".to_string();
        assert_eq!(ApnsSettings::from_config(&config).host, "http://127.0.0.1:9999");
    }

    #[test]
    fn test_from_config_requires_credentials() {
        let config = IosConfig::default();
        assert!(matches!(ApnsClient::from_config(&config), Err(PushError::Config(_))));
    }

    #[test]
    fn test_provider_token_rejects_garbage_key() {
        let result = ProviderToken::new(b"not a key", "KEY", "TEAM");
        assert!(matches!(result, Err(PushError::Config(_))));
    }
}
