//! Push Relay HTTP API
//!
//! - `POST /push`: accept a notification batch
//! - `PUT /config/pushers`: change the detached-dispatch ceiling
//! - `GET /stat/app`: delivery statistics
//! - `GET /config/app`: active configuration, secrets redacted
//! - `GET /health`, `GET /metrics`, `GET /api-doc/openapi.json`

use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use bytes::Bytes;
use metrics_exporter_prometheus::PrometheusHandle;
use pn_common::PushBatch;
use pn_config::AppConfig;
use std::sync::Arc;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};
use utoipa::OpenApi;

use crate::engine::DispatchEngine;
use crate::error::ApiError;
use crate::intake::spawn_fan_out;
use crate::stats::{PlatformStat, StatsSnapshot};

pub mod model;

use model::{ApiMessage, HealthResponse, PushersQuery};

/// Value of the `Server` header on every response
pub const SERVER_HEADER: &str = concat!("pn-server/", env!("CARGO_PKG_VERSION"));

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<DispatchEngine>,
    /// Configuration the process started with; the ceiling is read live
    pub config: Arc<AppConfig>,
    /// Prometheus handle, when a recorder is installed
    pub metrics: Option<PrometheusHandle>,
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Push Relay API",
        version = "0.1.0",
        description = "Accepts push notification batches and relays them to APNs, GCM and FCM"
    ),
    paths(
        push_handler,
        pushers_handler,
        stat_app_handler,
        config_app_handler,
        health_handler,
        metrics_handler,
    ),
    components(schemas(
        PushBatch,
        ApiMessage,
        StatsSnapshot,
        PlatformStat,
        AppConfig,
        HealthResponse,
    )),
    tags(
        (name = "push", description = "Notification intake"),
        (name = "config", description = "Runtime configuration"),
        (name = "monitoring", description = "Stats, health and metrics"),
    )
)]
pub struct ApiDoc;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/push", any(push_handler))
        .route("/config/pushers", any(pushers_handler))
        .route("/stat/app", get(stat_app_handler))
        .route("/config/app", get(config_app_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api-doc/openapi.json", get(openapi_handler))
        .layer(SetResponseHeaderLayer::overriding(
            header::SERVER,
            HeaderValue::from_static(SERVER_HEADER),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// Push
// ============================================================================

/// Accept a notification batch. Replies once batch-level checks pass; per
/// token delivery happens afterwards and is reported in the push log.
#[utoipa::path(
    post,
    path = "/push",
    tag = "push",
    request_body = PushBatch,
    responses(
        (status = 200, description = "Batch accepted", body = ApiMessage),
        (status = 400, description = "Batch rejected", body = ApiMessage)
    )
)]
async fn push_handler(
    State(state): State<AppState>,
    method: Method,
    body: Bytes,
) -> Result<Json<ApiMessage>, ApiError> {
    if method != Method::POST {
        return Err(ApiError::MethodNotAllowed("POST"));
    }
    if body.is_empty() {
        return Err(ApiError::EmptyBody);
    }

    let batch: PushBatch = serde_json::from_slice(&body).map_err(ApiError::MalformedBody)?;

    let count = batch.notifications.len();
    if count == 0 {
        return Err(ApiError::EmptyNotification);
    }
    let limit = state.engine.settings().notification_max;
    if count > limit {
        return Err(ApiError::TooManyNotifications { count, limit });
    }

    debug!(notifications = count, "Push batch accepted");
    spawn_fan_out(state.engine.clone(), batch.notifications);

    Ok(Json(ApiMessage::ok()))
}

// ============================================================================
// Runtime configuration
// ============================================================================

/// Set the ceiling for detached dispatches. Applies to the next admission
/// decision; dispatches already running are unaffected.
#[utoipa::path(
    put,
    path = "/config/pushers",
    tag = "config",
    params(PushersQuery),
    responses(
        (status = 200, description = "Ceiling updated", body = ApiMessage),
        (status = 400, description = "Missing or invalid value", body = ApiMessage)
    )
)]
async fn pushers_handler(
    State(state): State<AppState>,
    method: Method,
    Query(query): Query<PushersQuery>,
) -> Result<Json<ApiMessage>, ApiError> {
    if method != Method::PUT {
        return Err(ApiError::MethodNotAllowed("PUT"));
    }

    let raw = query.max.ok_or(ApiError::MissingMax)?;
    let max = match raw.trim().parse::<i64>() {
        Ok(max) if max >= 0 => max,
        _ => return Err(ApiError::InvalidMax(raw)),
    };

    let previous = state.engine.admission().ceiling();
    state.engine.admission().set_ceiling(max);
    info!(previous, pusher_max = max, "Detached dispatch ceiling updated");

    Ok(Json(ApiMessage::ok()))
}

/// Active configuration with secrets replaced by `...`
#[utoipa::path(
    get,
    path = "/config/app",
    tag = "config",
    responses(
        (status = 200, description = "Redacted configuration", body = AppConfig)
    )
)]
async fn config_app_handler(State(state): State<AppState>) -> Json<AppConfig> {
    let mut config = state.config.redacted();
    config.core.pusher_max = state.engine.admission().ceiling();
    Json(config)
}

// ============================================================================
// Monitoring
// ============================================================================

#[utoipa::path(
    get,
    path = "/stat/app",
    tag = "monitoring",
    responses(
        (status = 200, description = "Delivery statistics", body = StatsSnapshot)
    )
)]
async fn stat_app_handler(State(state): State<AppState>) -> Result<Response, ApiError> {
    let body = serde_json::to_vec_pretty(&state.engine.stats_snapshot())?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response())
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "monitoring",
    responses(
        (status = 200, description = "Process is serving", body = HealthResponse)
    )
)]
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "UP".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/metrics",
    tag = "monitoring",
    responses(
        (status = 200, description = "Prometheus metrics", content_type = "text/plain"),
        (status = 503, description = "No metrics recorder installed")
    )
)]
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}

async fn openapi_handler() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
