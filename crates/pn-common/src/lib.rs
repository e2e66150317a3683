//! Push Relay Common Types
//!
//! Types shared by the gateway clients, the dispatch engine and the binaries:
//! - `Platform`: the closed set of delivery targets
//! - `NotificationRequest` / `PushBatch`: the `/push` wire format
//! - `DispatchUnit`: one token's worth of a notification
//! - `PushStatus`: push log status values

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use utoipa::ToSchema;

pub mod logging;

/// Upper bound accepted by GCM for `time_to_live` (4 weeks).
pub const MAX_TIME_TO_LIVE: u32 = 2_419_200;

// ============================================================================
// Platform
// ============================================================================

/// Delivery platform. Wire code is an integer (1 = iOS, 2 = Android, 3 = FCM v1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Ios,
    Android,
    FcmV1,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Ios, Platform::Android, Platform::FcmV1];

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Platform::Ios),
            2 => Some(Platform::Android),
            3 => Some(Platform::FcmV1),
            _ => None,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Platform::Ios => 1,
            Platform::Android => 2,
            Platform::FcmV1 => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Ios => "ios",
            Platform::Android => "android",
            Platform::FcmV1 => "fcm_v1",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Push type
// ============================================================================

/// APNs push type. Anything outside this set is rejected at validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushType {
    Alert,
    Background,
}

impl PushType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "alert" => Some(PushType::Alert),
            "background" => Some(PushType::Background),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PushType::Alert => "alert",
            PushType::Background => "background",
        }
    }

    /// Background pushes must be sent with priority 5; alerts use 10.
    pub fn apns_priority(self) -> u8 {
        match self {
            PushType::Alert => 10,
            PushType::Background => 5,
        }
    }
}

// ============================================================================
// Request wire format
// ============================================================================

/// Free-form key/value pair merged into platform payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ExtendEntry {
    pub key: String,
    #[serde(rename = "val")]
    pub value: String,
}

/// Fields shared by every token of one notification request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct NotificationContent {
    /// Raw platform code; resolved to `Platform` by validation
    pub platform: i64,
    pub message: String,
    pub title: String,
    pub subtitle: String,
    pub body: String,
    /// Any integer is accepted; APNs receives negatives as 0
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<i64>,
    pub category: String,
    pub sound: String,
    pub content_available: bool,
    pub mutable_content: bool,
    /// Seconds from now until APNs discards the notification
    pub expiry: i64,
    pub collapse_key: String,
    pub delay_while_idle: bool,
    pub time_to_live: u32,
    /// Caller correlation id, carried into the push log
    pub identifier: String,
    pub extend: Vec<ExtendEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_type: Option<String>,
}

impl NotificationContent {
    /// Push type with the APNs default applied.
    pub fn push_type(&self) -> PushType {
        self.push_type
            .as_deref()
            .and_then(PushType::parse)
            .unwrap_or(PushType::Alert)
    }
}

/// One notification as received on `/push`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NotificationRequest {
    #[serde(rename = "token", default)]
    pub tokens: Vec<String>,
    #[serde(flatten)]
    pub content: NotificationContent,
}

/// Request body of `/push`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct PushBatch {
    #[serde(default)]
    pub notifications: Vec<NotificationRequest>,
}

// ============================================================================
// Dispatch unit
// ============================================================================

/// A single token's delivery, tracked independently from intake to outcome.
///
/// The shared content is immutable and reference counted; `attempt` is the
/// only field that changes after fan-out.
#[derive(Debug, Clone)]
pub struct DispatchUnit {
    pub seq_id: u64,
    pub token: String,
    pub platform: Platform,
    pub content: Arc<NotificationContent>,
    pub attempt: u32,
}

impl DispatchUnit {
    pub fn new(seq_id: u64, token: impl Into<String>, platform: Platform, content: Arc<NotificationContent>) -> Self {
        Self {
            seq_id,
            token: token.into(),
            platform,
            content,
            attempt: 0,
        }
    }
}

// ============================================================================
// Push log status
// ============================================================================

/// `status` field of push log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PushStatus {
    #[serde(rename = "accepted-push")]
    Accepted,
    #[serde(rename = "succeeded-push")]
    Succeeded,
    #[serde(rename = "failed-push")]
    Failed,
    #[serde(rename = "disabled-push")]
    Disabled,
    #[serde(rename = "invalid-request")]
    InvalidRequest,
}

impl PushStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PushStatus::Accepted => "accepted-push",
            PushStatus::Succeeded => "succeeded-push",
            PushStatus::Failed => "failed-push",
            PushStatus::Disabled => "disabled-push",
            PushStatus::InvalidRequest => "invalid-request",
        }
    }
}

impl fmt::Display for PushStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
