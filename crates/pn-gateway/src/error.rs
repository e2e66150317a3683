use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PushError {
    #[error("apns rejected notification: {reason} (status {status})")]
    Apns { status: u16, reason: ApnsReason },

    #[error("gcm rejected notification: {0}")]
    Gcm(GcmError),

    #[error("fcm rejected notification: {code} (status {status}): {message}")]
    FcmV1 {
        status: u16,
        code: FcmErrorCode,
        message: String,
    },

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for PushError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            PushError::Timeout(e.to_string())
        } else if e.is_connect() {
            PushError::Connect(e.to_string())
        } else {
            PushError::Transport(e.to_string())
        }
    }
}

impl From<jsonwebtoken::errors::Error> for PushError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        PushError::Auth(e.to_string())
    }
}

// ============================================================================
// APNs reasons
// ============================================================================

/// `reason` values returned by APNs in non-200 responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApnsReason {
    BadCollapseId,
    BadDeviceToken,
    BadExpirationDate,
    BadMessageId,
    BadPriority,
    BadTopic,
    DeviceTokenNotForTopic,
    DuplicateHeaders,
    IdleTimeout,
    InvalidPushType,
    MissingDeviceToken,
    MissingTopic,
    PayloadEmpty,
    TopicDisallowed,
    BadCertificate,
    BadCertificateEnvironment,
    ExpiredProviderToken,
    Forbidden,
    InvalidProviderToken,
    MissingProviderToken,
    BadPath,
    MethodNotAllowed,
    Unregistered,
    PayloadTooLarge,
    TooManyProviderTokenUpdates,
    TooManyRequests,
    InternalServerError,
    ServiceUnavailable,
    Shutdown,
    Other(String),
}

impl ApnsReason {
    pub fn parse(reason: &str) -> Self {
        match reason {
            "BadCollapseId" => ApnsReason::BadCollapseId,
            "BadDeviceToken" => ApnsReason::BadDeviceToken,
            "BadExpirationDate" => ApnsReason::BadExpirationDate,
            "BadMessageId" => ApnsReason::BadMessageId,
            "BadPriority" => ApnsReason::BadPriority,
            "BadTopic" => ApnsReason::BadTopic,
            "DeviceTokenNotForTopic" => ApnsReason::DeviceTokenNotForTopic,
            "DuplicateHeaders" => ApnsReason::DuplicateHeaders,
            "IdleTimeout" => ApnsReason::IdleTimeout,
            "InvalidPushType" => ApnsReason::InvalidPushType,
            "MissingDeviceToken" => ApnsReason::MissingDeviceToken,
            "MissingTopic" => ApnsReason::MissingTopic,
            "PayloadEmpty" => ApnsReason::PayloadEmpty,
            "TopicDisallowed" => ApnsReason::TopicDisallowed,
            "BadCertificate" => ApnsReason::BadCertificate,
            "BadCertificateEnvironment" => ApnsReason::BadCertificateEnvironment,
            "ExpiredProviderToken" => ApnsReason::ExpiredProviderToken,
            "Forbidden" => ApnsReason::Forbidden,
            "InvalidProviderToken" => ApnsReason::InvalidProviderToken,
            "MissingProviderToken" => ApnsReason::MissingProviderToken,
            "BadPath" => ApnsReason::BadPath,
            "MethodNotAllowed" => ApnsReason::MethodNotAllowed,
            "Unregistered" => ApnsReason::Unregistered,
            "PayloadTooLarge" => ApnsReason::PayloadTooLarge,
            "TooManyProviderTokenUpdates" => ApnsReason::TooManyProviderTokenUpdates,
            "TooManyRequests" => ApnsReason::TooManyRequests,
            "InternalServerError" => ApnsReason::InternalServerError,
            "ServiceUnavailable" => ApnsReason::ServiceUnavailable,
            "Shutdown" => ApnsReason::Shutdown,
            other => ApnsReason::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ApnsReason::BadCollapseId => "BadCollapseId",
            ApnsReason::BadDeviceToken => "BadDeviceToken",
            ApnsReason::BadExpirationDate => "BadExpirationDate",
            ApnsReason::BadMessageId => "BadMessageId",
            ApnsReason::BadPriority => "BadPriority",
            ApnsReason::BadTopic => "BadTopic",
            ApnsReason::DeviceTokenNotForTopic => "DeviceTokenNotForTopic",
            ApnsReason::DuplicateHeaders => "DuplicateHeaders",
            ApnsReason::IdleTimeout => "IdleTimeout",
            ApnsReason::InvalidPushType => "InvalidPushType",
            ApnsReason::MissingDeviceToken => "MissingDeviceToken",
            ApnsReason::MissingTopic => "MissingTopic",
            ApnsReason::PayloadEmpty => "PayloadEmpty",
            ApnsReason::TopicDisallowed => "TopicDisallowed",
            ApnsReason::BadCertificate => "BadCertificate",
            ApnsReason::BadCertificateEnvironment => "BadCertificateEnvironment",
            ApnsReason::ExpiredProviderToken => "ExpiredProviderToken",
            ApnsReason::Forbidden => "Forbidden",
            ApnsReason::InvalidProviderToken => "InvalidProviderToken",
            ApnsReason::MissingProviderToken => "MissingProviderToken",
            ApnsReason::BadPath => "BadPath",
            ApnsReason::MethodNotAllowed => "MethodNotAllowed",
            ApnsReason::Unregistered => "Unregistered",
            ApnsReason::PayloadTooLarge => "PayloadTooLarge",
            ApnsReason::TooManyProviderTokenUpdates => "TooManyProviderTokenUpdates",
            ApnsReason::TooManyRequests => "TooManyRequests",
            ApnsReason::InternalServerError => "InternalServerError",
            ApnsReason::ServiceUnavailable => "ServiceUnavailable",
            ApnsReason::Shutdown => "Shutdown",
            ApnsReason::Other(reason) => reason,
        }
    }
}

impl fmt::Display for ApnsReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// GCM result errors
// ============================================================================

/// `results[].error` values of the legacy GCM/FCM HTTP API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GcmError {
    MissingRegistration,
    InvalidRegistration,
    NotRegistered,
    InvalidPackageName,
    MismatchSenderId,
    MessageTooBig,
    InvalidDataKey,
    InvalidTtl,
    Unavailable,
    InternalServerError,
    Timeout,
    DeviceMessageRateExceeded,
    TopicsMessageRateExceeded,
    Other(String),
}

impl GcmError {
    pub fn parse(error: &str) -> Self {
        match error {
            "MissingRegistration" => GcmError::MissingRegistration,
            "InvalidRegistration" => GcmError::InvalidRegistration,
            "NotRegistered" => GcmError::NotRegistered,
            "InvalidPackageName" => GcmError::InvalidPackageName,
            "MismatchSenderId" => GcmError::MismatchSenderId,
            "MessageTooBig" => GcmError::MessageTooBig,
            "InvalidDataKey" => GcmError::InvalidDataKey,
            "InvalidTtl" => GcmError::InvalidTtl,
            "Unavailable" => GcmError::Unavailable,
            "InternalServerError" => GcmError::InternalServerError,
            "Timeout" => GcmError::Timeout,
            "DeviceMessageRateExceeded" => GcmError::DeviceMessageRateExceeded,
            "TopicsMessageRateExceeded" => GcmError::TopicsMessageRateExceeded,
            other => GcmError::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            GcmError::MissingRegistration => "MissingRegistration",
            GcmError::InvalidRegistration => "InvalidRegistration",
            GcmError::NotRegistered => "NotRegistered",
            GcmError::InvalidPackageName => "InvalidPackageName",
            GcmError::MismatchSenderId => "MismatchSenderId",
            GcmError::MessageTooBig => "MessageTooBig",
            GcmError::InvalidDataKey => "InvalidDataKey",
            GcmError::InvalidTtl => "InvalidTtl",
            GcmError::Unavailable => "Unavailable",
            GcmError::InternalServerError => "InternalServerError",
            GcmError::Timeout => "Timeout",
            GcmError::DeviceMessageRateExceeded => "DeviceMessageRateExceeded",
            GcmError::TopicsMessageRateExceeded => "TopicsMessageRateExceeded",
            GcmError::Other(error) => error,
        }
    }
}

impl fmt::Display for GcmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// FCM v1 error codes
// ============================================================================

/// FCM v1 `errorCode` detail, falling back to the RPC `status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FcmErrorCode {
    InvalidArgument,
    Unregistered,
    SenderIdMismatch,
    QuotaExceeded,
    Unavailable,
    Internal,
    ThirdPartyAuthError,
    Other(String),
}

impl FcmErrorCode {
    pub fn parse(code: &str) -> Self {
        match code {
            "INVALID_ARGUMENT" => FcmErrorCode::InvalidArgument,
            "UNREGISTERED" | "NOT_FOUND" => FcmErrorCode::Unregistered,
            "SENDER_ID_MISMATCH" | "PERMISSION_DENIED" => FcmErrorCode::SenderIdMismatch,
            "QUOTA_EXCEEDED" | "RESOURCE_EXHAUSTED" => FcmErrorCode::QuotaExceeded,
            "UNAVAILABLE" => FcmErrorCode::Unavailable,
            "INTERNAL" => FcmErrorCode::Internal,
            "THIRD_PARTY_AUTH_ERROR" => FcmErrorCode::ThirdPartyAuthError,
            other => FcmErrorCode::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            FcmErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            FcmErrorCode::Unregistered => "UNREGISTERED",
            FcmErrorCode::SenderIdMismatch => "SENDER_ID_MISMATCH",
            FcmErrorCode::QuotaExceeded => "QUOTA_EXCEEDED",
            FcmErrorCode::Unavailable => "UNAVAILABLE",
            FcmErrorCode::Internal => "INTERNAL",
            FcmErrorCode::ThirdPartyAuthError => "THIRD_PARTY_AUTH_ERROR",
            FcmErrorCode::Other(code) => code,
        }
    }
}

impl fmt::Display for FcmErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
