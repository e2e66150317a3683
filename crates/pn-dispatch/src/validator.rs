//! Structural validation of a single notification request.

use pn_common::{NotificationRequest, Platform, PushType};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("empty token")]
    EmptyToken,

    #[error("invalid platform")]
    InvalidPlatform,

    #[error("empty message")]
    EmptyMessage,

    #[error("empty title or body")]
    EmptyTitleOrBody,

    #[error("invalid push type")]
    InvalidPushType,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationPolicy {
    pub allows_empty_message: bool,
}

/// Check one request and resolve its platform. Returns the first violation.
///
/// Whether the platform is enabled is decided at intake, not here, so that
/// disabled pushes are still logged per token.
pub fn validate(request: &NotificationRequest, policy: &ValidationPolicy) -> Result<Platform, ValidationError> {
    if request.tokens.iter().any(|token| token.is_empty()) {
        return Err(ValidationError::EmptyToken);
    }

    let content = &request.content;
    let platform = Platform::from_code(content.platform).ok_or(ValidationError::InvalidPlatform)?;

    match platform {
        Platform::Ios | Platform::Android => {
            if content.message.is_empty() && !policy.allows_empty_message {
                return Err(ValidationError::EmptyMessage);
            }
        }
        Platform::FcmV1 => {
            if content.title.is_empty() || content.body.is_empty() {
                return Err(ValidationError::EmptyTitleOrBody);
            }
        }
    }

    if let Some(push_type) = content.push_type.as_deref() {
        if PushType::parse(push_type).is_none() {
            return Err(ValidationError::InvalidPushType);
        }
    }

    Ok(platform)
}
