//! Legacy GCM/FCM HTTP client

use async_trait::async_trait;
use pn_common::{DispatchUnit, NotificationContent, Platform, MAX_TIME_TO_LIVE};
use pn_config::AndroidConfig;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::GcmError;
use crate::{build_http_client, read_error_body, HttpSettings, PushBackend, PushError, Result};

pub const FCM_SEND_ENDPOINT: &str = "https://fcm.googleapis.com/fcm/send";
pub const GCM_SEND_ENDPOINT: &str = "https://gcm-http.googleapis.com/gcm/send";

#[derive(Debug, Serialize)]
pub struct GcmMessage<'a> {
    pub registration_ids: Vec<&'a str>,
    #[serde(skip_serializing_if = "is_empty")]
    pub collapse_key: &'a str,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub delay_while_idle: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to_live: Option<u32>,
    pub data: Map<String, Value>,
}

fn is_empty(value: &&str) -> bool {
    value.is_empty()
}

impl<'a> GcmMessage<'a> {
    /// `data.message` carries the text; extension entries are added alongside.
    pub fn new(token: &'a str, content: &'a NotificationContent) -> Self {
        let mut data = Map::new();
        data.insert("message".to_string(), Value::String(content.message.clone()));
        for entry in &content.extend {
            data.insert(entry.key.clone(), Value::String(entry.value.clone()));
        }

        Self {
            registration_ids: vec![token],
            collapse_key: &content.collapse_key,
            delay_while_idle: content.delay_while_idle,
            time_to_live: (content.time_to_live > 0)
                .then(|| content.time_to_live.min(MAX_TIME_TO_LIVE)),
            data,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GcmResponse {
    pub multicast_id: i64,
    pub success: u32,
    pub failure: u32,
    pub canonical_ids: u32,
    pub results: Vec<GcmResult>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GcmResult {
    pub message_id: String,
    pub registration_id: String,
    pub error: String,
}

pub struct GcmClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl GcmClient {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, http: &HttpSettings) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(PushError::Config("missing GCM api key".to_string()));
        }

        Ok(Self {
            client: build_http_client(http, None)?,
            endpoint: endpoint.into(),
            api_key,
        })
    }

    pub fn from_config(config: &AndroidConfig) -> Result<Self> {
        let endpoint = if !config.endpoint.is_empty() {
            config.endpoint.as_str()
        } else if config.use_fcm {
            FCM_SEND_ENDPOINT
        } else {
            GCM_SEND_ENDPOINT
        };
        let http = HttpSettings::from_secs(config.timeout, config.keepalive_timeout, config.keepalive_conns);

        info!(endpoint, "GCM client configured");
        Self::new(endpoint, &config.apikey, &http)
    }
}

#[async_trait]
impl PushBackend for GcmClient {
    fn platform(&self) -> Platform {
        Platform::Android
    }

    async fn push(&self, unit: &DispatchUnit) -> Result<()> {
        let message = GcmMessage::new(&unit.token, &unit.content);

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("key={}", self.api_key))
            .json(&message)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(PushError::Auth("GCM rejected the api key".to_string()));
        }
        if !status.is_success() {
            let body = read_error_body(response).await;
            return Err(PushError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: GcmResponse = response
            .json()
            .await
            .map_err(|e| PushError::Transport(format!("invalid GCM response: {}", e)))?;

        match body.results.first() {
            Some(result) if !result.error.is_empty() => Err(PushError::Gcm(GcmError::parse(&result.error))),
            Some(result) => {
                if !result.registration_id.is_empty() {
                    debug!(
                        seq_id = unit.seq_id,
                        canonical_id = %result.registration_id,
                        "GCM returned a canonical registration id"
                    );
                }
                Ok(())
            }
            None => Err(PushError::Transport("GCM response has no results".to_string())),
        }
    }
}
