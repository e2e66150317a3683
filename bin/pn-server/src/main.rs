//! Push Relay Server
//!
//! Accepts notification batches over HTTP and relays them to APNs, GCM and
//! FCM v1 through a bounded queue and a fixed worker pool.
//!
//! Shutdown on SIGINT/SIGTERM happens in two phases: the HTTP listener stops
//! first (bounded by `core.shutdown_timeout`), then everything already
//! accepted is drained before the workers exit.

use std::future::IntoFuture;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use pn_config::{AppConfig, ConfigLoader};
use pn_dispatch::{
    create_router, AppState, DispatchEngine, EngineSettings, PlatformRoutes, ShutdownCoordinator, WorkerPool,
};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "pn-server", version)]
#[command(about = "Push notification relay for APNs, GCM and FCM")]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "PN_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP port, overrides core.port
    #[arg(long)]
    port: Option<u16>,

    /// Dispatch workers, overrides core.workers
    #[arg(long)]
    workers: Option<usize>,

    /// Queue capacity, overrides core.queues
    #[arg(long)]
    queues: Option<usize>,

    /// Print an annotated example configuration and exit
    #[arg(long)]
    example_config: bool,
}

impl Args {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(port) = self.port {
            config.core.port = port;
        }
        if let Some(workers) = self.workers {
            config.core.workers = workers;
        }
        if let Some(queues) = self.queues {
            config.core.queues = queues;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    if args.example_config {
        print!("{}", AppConfig::example_toml());
        return Ok(());
    }

    let loader = match &args.config {
        Some(path) => ConfigLoader::with_path(path),
        None => ConfigLoader::new(),
    };
    let mut config = loader.load().context("failed to load configuration")?;
    args.apply(&mut config);
    config.validate().context("invalid configuration")?;

    pn_common::logging::init_logging("pn-server", &config.log.level);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        workers = config.core.workers,
        queues = config.core.queues,
        pusher_max = config.core.pusher_max,
        ios = config.ios.enabled,
        android = config.android.enabled,
        fcm_v1 = config.fcm_v1.enabled,
        "Starting push relay"
    );

    let metrics = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            info!("Prometheus metrics recorder installed");
            Some(handle)
        }
        Err(e) => {
            warn!(error = %e, "Metrics recorder unavailable; /metrics disabled");
            None
        }
    };

    let routes = PlatformRoutes::from_config(&config).context("failed to configure push gateways")?;
    let engine = Arc::new(DispatchEngine::new(EngineSettings::from_config(&config.core), routes));
    let pool = WorkerPool::start(engine.clone(), config.core.workers);

    let addr = format!("{}:{}", config.core.host, config.core.port);
    let shutdown_timeout = Duration::from_secs(config.core.shutdown_timeout);

    let app = create_router(AppState {
        engine: engine.clone(),
        config: Arc::new(config),
        metrics,
    });

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(%addr, "HTTP server listening");

    // Phase one: stop intake.
    let (signal_tx, signal_rx) = oneshot::channel();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = signal_tx.send(());
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            result.context("HTTP server error")?;
        }
        _ = signal_rx => {
            info!(timeout_secs = shutdown_timeout.as_secs(), "Shutdown signal received, closing HTTP intake");
            match tokio::time::timeout(shutdown_timeout, &mut server).await {
                Ok(result) => result.context("HTTP server error")?,
                Err(_) => warn!("Open HTTP connections outlived the shutdown timeout"),
            }
        }
    }

    // Phase two: deliver what was accepted.
    ShutdownCoordinator::new(engine.clone()).drain().await;
    pool.stop().await;

    let stats = engine.stats_snapshot();
    info!(
        ios_success = stats.ios.push_success,
        ios_error = stats.ios.push_error,
        android_success = stats.android.push_success,
        android_error = stats.android.push_error,
        fcm_v1_success = stats.fcm_v1.push_success,
        fcm_v1_error = stats.fcm_v1.push_error,
        "Push relay stopped"
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config() {
        let args = Args::parse_from(["pn-server", "--port", "9000", "--workers", "3"]);
        let mut config = AppConfig::default();
        args.apply(&mut config);

        assert_eq!(config.core.port, 9000);
        assert_eq!(config.core.workers, 3);
        assert_eq!(config.core.queues, 512);
    }

    #[test]
    fn test_cli_config_path() {
        let args = Args::parse_from(["pn-server", "-c", "/tmp/pn.toml"]);
        assert_eq!(args.config, Some(PathBuf::from("/tmp/pn.toml")));
        assert!(!args.example_config);
    }
}
