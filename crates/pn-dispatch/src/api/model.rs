use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Body of every `/push` and `/config/pushers` reply, success or failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ApiMessage {
    pub message: String,
}

impl ApiMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn ok() -> Self {
        Self::new("ok")
    }
}

/// Query of `PUT /config/pushers`. Kept as a string so a bad value gets our
/// own 400 body instead of the extractor's rejection.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PushersQuery {
    /// New detached-dispatch ceiling; 0 dispatches everything inline
    pub max: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Always UP while the process serves requests
    pub status: String,
    pub version: String,
}
