//! Push log
//!
//! One structured event per validation failure and per dispatch attempt, all
//! under [`PUSH_LOG_TARGET`]. With `LOG_FORMAT=json` these become the JSON
//! lines read back by `pn-recover`, so field names are part of the format:
//!
//! `status`, `seq_id`, `platform`, `token`, `ptime`, `error`, `retry`,
//! `identifier`, `message`. Accepted pushes also carry the rest of the
//! notification content so it can be resubmitted as is; `extend` is written as
//! a JSON array string.

use pn_common::{DispatchUnit, NotificationRequest, PushStatus};
use pn_gateway::PushError;
use std::time::Duration;
use tracing::{info, warn};

use crate::validator::ValidationError;

pub const PUSH_LOG_TARGET: &str = "pn::push";

pub fn accepted(unit: &DispatchUnit) {
    info!(
        target: PUSH_LOG_TARGET,
        status = %PushStatus::Accepted,
        seq_id = unit.seq_id,
        platform = %unit.platform,
        token = %unit.token,
        ptime = 0.0_f64,
        retry = unit.attempt,
        identifier = %unit.content.identifier,
        title = %unit.content.title,
        subtitle = %unit.content.subtitle,
        body = %unit.content.body,
        badge = unit.content.badge,
        sound = %unit.content.sound,
        category = %unit.content.category,
        content_available = unit.content.content_available,
        mutable_content = unit.content.mutable_content,
        expiry = unit.content.expiry,
        collapse_key = %unit.content.collapse_key,
        delay_while_idle = unit.content.delay_while_idle,
        time_to_live = unit.content.time_to_live,
        push_type = unit.content.push_type.as_deref(),
        extend = %serde_json::to_string(&unit.content.extend).unwrap_or_default(),
        message = %unit.content.message
    );
}

pub fn disabled(unit: &DispatchUnit) {
    info!(
        target: PUSH_LOG_TARGET,
        status = %PushStatus::Disabled,
        seq_id = unit.seq_id,
        platform = %unit.platform,
        token = %unit.token,
        ptime = 0.0_f64,
        retry = unit.attempt,
        identifier = %unit.content.identifier,
        message = %unit.content.message
    );
}

pub fn succeeded(unit: &DispatchUnit, ptime: Duration) {
    info!(
        target: PUSH_LOG_TARGET,
        status = %PushStatus::Succeeded,
        seq_id = unit.seq_id,
        platform = %unit.platform,
        token = %unit.token,
        ptime = ptime.as_secs_f64(),
        retry = unit.attempt,
        identifier = %unit.content.identifier,
        message = %unit.content.message
    );
}

pub fn failed(unit: &DispatchUnit, error: &PushError, ptime: Duration) {
    warn!(
        target: PUSH_LOG_TARGET,
        status = %PushStatus::Failed,
        seq_id = unit.seq_id,
        platform = %unit.platform,
        token = %unit.token,
        ptime = ptime.as_secs_f64(),
        error = %error,
        retry = unit.attempt,
        identifier = %unit.content.identifier,
        message = %unit.content.message
    );
}

/// Logged once per rejected request, before any sequence id is assigned.
pub fn invalid_request(request: &NotificationRequest, error: &ValidationError) {
    warn!(
        target: PUSH_LOG_TARGET,
        status = %PushStatus::InvalidRequest,
        platform = request.content.platform,
        token = %request.tokens.join(","),
        ptime = 0.0_f64,
        error = %error,
        retry = 0_u32,
        identifier = %request.content.identifier,
        message = %request.content.message
    );
}
