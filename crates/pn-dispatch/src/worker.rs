//! Worker pool
//!
//! W long-lived tasks pull units off the shared queue. For each unit the
//! admission controller decides whether it is delivered inline, blocking this
//! worker for all of its attempts, or in a detached task.

use pn_common::DispatchUnit;
use pn_gateway::PushBackend;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::engine::DispatchEngine;
use crate::queue::QueuedUnit;
use crate::{push_metrics, retry};

const METRICS_INTERVAL: Duration = Duration::from_secs(1);

pub struct WorkerPool {
    shutdown_tx: broadcast::Sender<()>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `workers` dispatch loops plus a gauge sampler.
    pub fn start(engine: Arc<DispatchEngine>, workers: usize) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let workers = workers.max(1);
        let mut handles = Vec::with_capacity(workers + 1);

        for worker_id in 0..workers {
            let engine = engine.clone();
            let mut shutdown_rx = shutdown_tx.subscribe();

            handles.push(tokio::spawn(async move {
                debug!(worker_id, "Worker started");
                loop {
                    tokio::select! {
                        biased;
                        _ = shutdown_rx.recv() => break,
                        next = engine.queue().dequeue() => match next {
                            Some(queued) => handle_unit(&engine, queued).await,
                            None => break,
                        },
                    }
                }
                debug!(worker_id, "Worker stopped");
            }));
        }

        {
            let engine = engine.clone();
            let mut shutdown_rx = shutdown_tx.subscribe();

            handles.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(METRICS_INTERVAL);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            push_metrics::set_queue_depth(engine.queue().depth());
                            push_metrics::set_detached_dispatches(engine.admission().live());
                        }
                        _ = shutdown_rx.recv() => break,
                    }
                }
            }));
        }

        info!(workers, "Worker pool started");
        Self { shutdown_tx, handles }
    }

    /// Signal every loop to exit and wait for them. Detached dispatches
    /// already running are not awaited here; the drain covers them.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Worker task ended abnormally");
            }
        }
        info!("Worker pool stopped");
    }
}

/// Deliver one dequeued unit, inline or detached.
pub async fn handle_unit(engine: &Arc<DispatchEngine>, queued: QueuedUnit) {
    let QueuedUnit { unit, guard } = queued;
    let route = engine.routes().get(unit.platform);

    let backend = match (&route.backend, route.enabled) {
        (Some(backend), true) => backend.clone(),
        _ => {
            warn!(seq_id = unit.seq_id, platform = %unit.platform, "No backend for platform, discarding unit");
            engine.stats().record_error(unit.platform);
            return;
        }
    };
    let retry_max = route.retry_max;

    match engine.admission().try_admit() {
        Some(permit) => {
            let engine = engine.clone();
            tokio::spawn(async move {
                dispatch(engine, backend, retry_max, unit).await;
                drop(permit);
                drop(guard);
            });
        }
        None => {
            dispatch(engine.clone(), backend, retry_max, unit).await;
            drop(guard);
        }
    }
}

/// Run the delivery loop in its own task so a panicking backend costs one
/// unit, not the worker.
async fn dispatch(engine: Arc<DispatchEngine>, backend: Arc<dyn PushBackend>, retry_max: u32, unit: DispatchUnit) {
    let (seq_id, platform) = (unit.seq_id, unit.platform);
    let delivery = {
        let engine = engine.clone();
        tokio::spawn(async move {
            retry::deliver(engine.stats(), backend.as_ref(), retry_max, unit).await;
        })
    };

    if let Err(e) = delivery.await {
        error!(seq_id, platform = %platform, error = %e, "Delivery task aborted, unit dropped");
        engine.stats().record_error(platform);
        push_metrics::record_push(platform, false);
    }
}
