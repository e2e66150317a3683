//! Structured Logging Configuration
//!
//! - JSON output for production (`LOG_FORMAT=json`), one flattened object per
//!   event so push log lines can be replayed by `pn-recover`
//! - Human-readable output otherwise
//!
//! `RUST_LOG` takes precedence over the level passed in by the caller, which
//! normally comes from the `[log]` config section.
//!
//! ```rust,ignore
//! pn_common::logging::init_logging("pn-server", "info");
//! tracing::info!(seq_id = 7, platform = "ios", "push accepted");
//! ```

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Initialize logging for a service.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging(service_name: &str, default_level: &str) {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    let env_filter = build_filter(default_level);

    let installed = if log_format.eq_ignore_ascii_case("json") {
        init_json_logging(env_filter)
    } else {
        init_text_logging(env_filter)
    };

    if installed {
        tracing::debug!(service = service_name, format = %log_format, "logging initialized");
    }
}

fn build_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

fn init_json_logging(env_filter: EnvFilter) -> bool {
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(false)
                .with_file(false)
                .with_line_number(false)
                .with_thread_ids(false)
                .with_target(true)
                .flatten_event(true)
                .with_span_events(FmtSpan::NONE),
        )
        .try_init()
        .is_ok()
}

fn init_text_logging(env_filter: EnvFilter) -> bool {
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .with_ansi(true),
        )
        .try_init()
        .is_ok()
}
