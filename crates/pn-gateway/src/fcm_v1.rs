//! FCM HTTP v1 client
//!
//! Sends `POST {endpoint}/v1/projects/{project}/messages:send`. The bearer
//! token is either configured statically or minted from a service account key
//! through the OAuth2 JWT bearer grant and cached until shortly before expiry.

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use pn_common::{DispatchUnit, NotificationContent, Platform};
use pn_config::FcmV1Config;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::FcmErrorCode;
use crate::{build_http_client, read_error_body, HttpSettings, PushBackend, PushError, Result};

const MESSAGING_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Refresh this many seconds before the access token expires.
const EXPIRY_MARGIN_SECS: i64 = 60;

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Serialize)]
pub struct FcmV1Request<'a> {
    pub message: FcmV1Message<'a>,
}

#[derive(Debug, Serialize)]
pub struct FcmV1Message<'a> {
    pub token: &'a str,
    pub notification: FcmV1Notification<'a>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<&'a str, &'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub android: Option<FcmV1AndroidConfig<'a>>,
}

#[derive(Debug, Serialize)]
pub struct FcmV1Notification<'a> {
    pub title: &'a str,
    pub body: &'a str,
}

#[derive(Debug, Serialize)]
pub struct FcmV1AndroidConfig<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collapse_key: Option<&'a str>,
    /// Duration in seconds with an `s` suffix, e.g. `"3600s"`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<String>,
}

impl<'a> FcmV1Request<'a> {
    pub fn new(token: &'a str, content: &'a NotificationContent) -> Self {
        let data = content
            .extend
            .iter()
            .map(|entry| (entry.key.as_str(), entry.value.as_str()))
            .collect();

        let collapse_key = (!content.collapse_key.is_empty()).then_some(content.collapse_key.as_str());
        let ttl = (content.time_to_live > 0).then(|| format!("{}s", content.time_to_live));
        let android = (collapse_key.is_some() || ttl.is_some())
            .then_some(FcmV1AndroidConfig { collapse_key, ttl });

        Self {
            message: FcmV1Message {
                token,
                notification: FcmV1Notification {
                    title: &content.title,
                    body: &content.body,
                },
                data,
                android,
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FcmV1ErrorBody {
    error: FcmV1ErrorStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FcmV1ErrorStatus {
    message: String,
    status: String,
    details: Vec<FcmV1ErrorDetail>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct FcmV1ErrorDetail {
    error_code: String,
}

impl FcmV1ErrorStatus {
    fn code(&self) -> FcmErrorCode {
        let detail = self
            .details
            .iter()
            .map(|d| d.error_code.as_str())
            .find(|code| !code.is_empty());
        FcmErrorCode::parse(detail.unwrap_or(&self.status))
    }
}

// ============================================================================
// Service account tokens
// ============================================================================

/// Fields of a Google service account JSON key used for token minting.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    pub token_uri: String,
}

impl ServiceAccountKey {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| PushError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| PushError::Config(format!("invalid service account file {}: {}", path.display(), e)))
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

struct AccessToken {
    value: String,
    expires_at: i64,
}

pub struct ServiceAccountTokens {
    account: ServiceAccountKey,
    key: EncodingKey,
    cached: Mutex<Option<AccessToken>>,
}

impl ServiceAccountTokens {
    pub fn new(account: ServiceAccountKey) -> Result<Self> {
        let key = EncodingKey::from_rsa_pem(account.private_key.as_bytes())
            .map_err(|e| PushError::Config(format!("invalid service account private key: {}", e)))?;

        Ok(Self {
            account,
            key,
            cached: Mutex::new(None),
        })
    }

    async fn access_token(&self, client: &reqwest::Client) -> Result<String> {
        // Held across the exchange so concurrent pushes share one refresh.
        let mut cached = self.cached.lock().await;
        let now = Utc::now().timestamp();

        if let Some(token) = cached.as_ref() {
            if token.expires_at - EXPIRY_MARGIN_SECS > now {
                return Ok(token.value.clone());
            }
        }

        let claims = AssertionClaims {
            iss: &self.account.client_email,
            scope: MESSAGING_SCOPE,
            aud: &self.account.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        let assertion = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.key)?;

        let response = client
            .post(&self.account.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = read_error_body(response).await;
            // An unavailable token endpoint is not a credentials problem.
            if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(PushError::Status {
                    status: status.as_u16(),
                    body,
                });
            }
            return Err(PushError::Auth(format!("token exchange failed with status {}: {}", status.as_u16(), body)));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| PushError::Auth(format!("invalid token response: {}", e)))?;

        debug!(expires_in = token.expires_in, "Obtained FCM access token");
        *cached = Some(AccessToken {
            value: token.access_token.clone(),
            expires_at: now + token.expires_in,
        });
        Ok(token.access_token)
    }
}

// ============================================================================
// Client
// ============================================================================

pub enum FcmV1Auth {
    Static(String),
    ServiceAccount(ServiceAccountTokens),
}

pub struct FcmV1Client {
    client: reqwest::Client,
    send_url: String,
    auth: FcmV1Auth,
}

impl FcmV1Client {
    pub fn new(endpoint: &str, project_id: &str, auth: FcmV1Auth, http: &HttpSettings) -> Result<Self> {
        if project_id.is_empty() {
            return Err(PushError::Config("missing FCM project id".to_string()));
        }

        Ok(Self {
            client: build_http_client(http, None)?,
            send_url: format!(
                "{}/v1/projects/{}/messages:send",
                endpoint.trim_end_matches('/'),
                project_id
            ),
            auth,
        })
    }

    pub fn from_config(config: &FcmV1Config) -> Result<Self> {
        let auth = if !config.credentials_file.is_empty() {
            let account = ServiceAccountKey::from_file(&config.credentials_file)?;
            FcmV1Auth::ServiceAccount(ServiceAccountTokens::new(account)?)
        } else if !config.access_token.is_empty() {
            FcmV1Auth::Static(config.access_token.clone())
        } else {
            return Err(PushError::Config("no FCM v1 credentials configured".to_string()));
        };
        let http = HttpSettings::from_secs(config.timeout, config.keepalive_timeout, config.keepalive_conns);

        info!(project_id = %config.project_id, "FCM v1 client configured");
        Self::new(&config.endpoint, &config.project_id, auth, &http)
    }

    pub fn send_url(&self) -> &str {
        &self.send_url
    }

    async fn bearer(&self) -> Result<String> {
        match &self.auth {
            FcmV1Auth::Static(token) => Ok(token.clone()),
            FcmV1Auth::ServiceAccount(tokens) => tokens.access_token(&self.client).await,
        }
    }
}

#[async_trait]
impl PushBackend for FcmV1Client {
    fn platform(&self) -> Platform {
        Platform::FcmV1
    }

    async fn push(&self, unit: &DispatchUnit) -> Result<()> {
        let request = FcmV1Request::new(&unit.token, &unit.content);
        let bearer = self.bearer().await?;

        let response = self
            .client
            .post(&self.send_url)
            .bearer_auth(bearer)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let status = status.as_u16();
        let body = read_error_body(response).await;
        match serde_json::from_str::<FcmV1ErrorBody>(&body) {
            Ok(error) if !error.error.status.is_empty() || !error.error.details.is_empty() => Err(PushError::FcmV1 {
                status,
                code: error.error.code(),
                message: error.error.message,
            }),
            _ => Err(PushError::Status { status, body }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pn_common::ExtendEntry;

    #[test]
    fn test_request_shape() {
        let content = NotificationContent {
            platform: 3,
            title: "T".to_string(),
            body: "B".to_string(),
            collapse_key: "ck".to_string(),
            time_to_live: 60,
            extend: vec![ExtendEntry { key: "k".to_string(), value: "v".to_string() }],
            ..Default::default()
        };

        let value = serde_json::to_value(FcmV1Request::new("tok", &content)).unwrap();
        assert_eq!(value["message"]["token"], "tok");
        assert_eq!(value["message"]["notification"]["title"], "T");
        assert_eq!(value["message"]["notification"]["body"], "B");
        assert_eq!(value["message"]["data"]["k"], "v");
        assert_eq!(value["message"]["android"]["collapse_key"], "ck");
        assert_eq!(value["message"]["android"]["ttl"], "60s");
    }

    #[test]
    fn test_minimal_request_omits_optional_sections() {
        let content = NotificationContent {
            title: "T".to_string(),
            body: "B".to_string(),
            ..Default::default()
        };
        let value = serde_json::to_value(FcmV1Request::new("tok", &content)).unwrap();
        assert!(value["message"].get("data").is_none());
        assert!(value["message"].get("android").is_none());
    }

    #[test]
    fn test_error_code_prefers_detail() {
        let body: FcmV1ErrorBody = serde_json::from_str(
            r#"{"error":{"code":404,"message":"not found","status":"NOT_FOUND",
                "details":[{"@type":"type.googleapis.com/google.firebase.fcm.v1.FcmError","errorCode":"UNREGISTERED"}]}}"#,
        )
        .unwrap();
        assert_eq!(body.error.code(), FcmErrorCode::Unregistered);

        let body: FcmV1ErrorBody =
            serde_json::from_str(r#"{"error":{"code":503,"message":"x","status":"UNAVAILABLE"}}"#).unwrap();
        assert_eq!(body.error.code(), FcmErrorCode::Unavailable);
    }

    #[test]
    fn test_send_url() {
        let client = FcmV1Client::new(
            "https://fcm.googleapis.com/",
            "demo",
            FcmV1Auth::Static("t".to_string()),
            &HttpSettings::default(),
        )
        .unwrap();
        assert_eq!(client.send_url(), "https://fcm.googleapis.com/v1/projects/demo/messages:send");
    }

    #[test]
    fn test_missing_project() {
        let result = FcmV1Client::new("https://x", "", FcmV1Auth::Static("t".to_string()), &HttpSettings::default());
        assert!(matches!(result, Err(PushError::Config(_))));
    }
}
