use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use pn_gateway::PushError;
use thiserror::Error;

use crate::api::model::ApiMessage;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Dispatch queue closed")]
    QueueClosed,

    #[error("Backend error: {0}")]
    Backend(#[from] PushError),
}

/// Batch-level rejections on the HTTP surface. Everything past fan-out is
/// reported through the push log instead.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("method must be {0}")]
    MethodNotAllowed(&'static str),

    #[error("request body is empty")]
    EmptyBody,

    #[error("Request-body is malformed")]
    MalformedBody(#[source] serde_json::Error),

    #[error("empty notification")]
    EmptyNotification,

    #[error("number of notifications({count}) over limit({limit})")]
    TooManyNotifications { count: usize, limit: usize },

    #[error("parameter 'max' is required")]
    MissingMax,

    #[error("invalid value for 'max'")]
    InvalidMax(String),

    #[error("Response-body could not be created")]
    Encoding(#[from] serde_json::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Encoding(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };

        (status, Json(ApiMessage::new(self.to_string()))).into_response()
    }
}
