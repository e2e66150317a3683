//! Backend error classification
//!
//! Sorts each gateway failure into retryable or terminal for the delivery
//! loop. Anything not known to be transient is terminal.

use pn_common::Platform;
use pn_gateway::{ApnsReason, FcmErrorCode, GcmError, PushError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Transient; another attempt may succeed.
    Retryable,
    /// Retrying cannot change the outcome.
    Terminal,
}

impl ErrorClass {
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorClass::Retryable)
    }
}

/// Classify a backend failure. Unknown errors are terminal.
pub fn classify(error: &PushError, platform: Platform) -> ErrorClass {
    match error {
        PushError::Timeout(_) | PushError::Connect(_) | PushError::Transport(_) => ErrorClass::Retryable,

        PushError::Apns { reason, .. } => match reason {
            ApnsReason::IdleTimeout
            | ApnsReason::Shutdown
            | ApnsReason::InternalServerError
            | ApnsReason::ServiceUnavailable
            | ApnsReason::TooManyRequests => ErrorClass::Retryable,
            _ => ErrorClass::Terminal,
        },

        PushError::Gcm(error) => match error {
            GcmError::Unavailable | GcmError::InternalServerError | GcmError::Timeout => ErrorClass::Retryable,
            _ => ErrorClass::Terminal,
        },

        PushError::FcmV1 { code, status, .. } => match code {
            FcmErrorCode::Unavailable | FcmErrorCode::Internal | FcmErrorCode::QuotaExceeded => {
                ErrorClass::Retryable
            }
            FcmErrorCode::Other(_) => classify_status(*status, platform),
            _ => ErrorClass::Terminal,
        },

        PushError::Status { status, .. } => classify_status(*status, platform),

        PushError::PayloadTooLarge { .. }
        | PushError::Encoding(_)
        | PushError::Auth(_)
        | PushError::Config(_) => ErrorClass::Terminal,
    }
}

fn classify_status(status: u16, platform: Platform) -> ErrorClass {
    match (platform, status) {
        (_, 500..=599) => ErrorClass::Retryable,
        (Platform::FcmV1, 429) => ErrorClass::Retryable,
        _ => ErrorClass::Terminal,
    }
}
