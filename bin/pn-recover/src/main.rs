//! Push Relay Log Reconciliation
//!
//! Reads a JSON-lines push log written by `pn-server` (`LOG_FORMAT=json`) and
//! reports pushes that were accepted but never delivered. Optionally emits
//! them as `/push` batches, or posts those batches to a running relay.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};

mod reconcile;

use reconcile::{build_batches, reconcile};

#[derive(Parser, Debug)]
#[command(name = "pn-recover", version)]
#[command(about = "Find accepted but undelivered pushes in a push relay log")]
struct Args {
    /// Push log file (JSON lines)
    log: PathBuf,

    /// Print resubmittable `{"notifications":[...]}` batches, one per line
    #[arg(long)]
    emit_batch: bool,

    /// POST the batches to this relay base URL, e.g. http://localhost:1056
    #[arg(long, env = "PN_RECOVER_ENDPOINT")]
    endpoint: Option<String>,

    /// Notifications per batch; keep at or below the relay's core.notification_max
    #[arg(long, default_value_t = 100)]
    batch_max: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Diagnostics go to stderr so stdout stays a clean batch stream.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let file = File::open(&args.log).with_context(|| format!("failed to open {}", args.log.display()))?;
    let result = reconcile(BufReader::new(file)).context("failed to read push log")?;

    info!(
        accepted = result.accepted,
        succeeded = result.succeeded,
        undelivered = result.undelivered.len(),
        skipped_lines = result.skipped_lines,
        "Push log reconciled"
    );

    if !args.emit_batch && args.endpoint.is_none() {
        for entry in &result.undelivered {
            println!(
                "{}\t{}\t{}\t{}",
                entry.seq_id.unwrap_or_default(),
                entry.platform().map(|p| p.as_str()).unwrap_or("?"),
                entry.token,
                entry.message
            );
        }
        return Ok(());
    }

    let batches = build_batches(&result.undelivered, args.batch_max);

    if args.emit_batch {
        for batch in &batches {
            println!("{}", serde_json::to_string(batch)?);
        }
    }

    if let Some(endpoint) = &args.endpoint {
        submit(endpoint, &batches).await?;
    }

    Ok(())
}

async fn submit(endpoint: &str, batches: &[pn_common::PushBatch]) -> Result<()> {
    let url = format!("{}/push", endpoint.trim_end_matches('/'));
    let client = reqwest::Client::new();
    let mut failures = 0;

    for (index, batch) in batches.iter().enumerate() {
        let response = client
            .post(&url)
            .json(batch)
            .send()
            .await
            .with_context(|| format!("failed to reach {}", url))?;

        let status = response.status();
        if status.is_success() {
            info!(batch = index, notifications = batch.notifications.len(), "Batch resubmitted");
        } else {
            let body = response.text().await.unwrap_or_default();
            warn!(batch = index, %status, body = %body, "Relay rejected batch");
            failures += 1;
        }
    }

    if failures > 0 {
        bail!("{} of {} batches rejected", failures, batches.len());
    }
    Ok(())
}
