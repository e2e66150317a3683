//! Bounded FIFO between intake and the worker pool.

use pn_common::DispatchUnit;
use tokio::sync::{mpsc, Mutex};

use crate::error::DispatchError;
use crate::tracker::{InFlightGuard, InFlightTracker};

/// A unit waiting in, or just taken from, the queue. The guard keeps the
/// unit visible to the drain until its dispatch finishes.
#[derive(Debug)]
pub struct QueuedUnit {
    pub unit: DispatchUnit,
    pub guard: InFlightGuard,
}

/// Single bounded queue shared by every worker.
///
/// `enqueue` waits while the queue is full; nothing is ever dropped.
pub struct DispatchQueue {
    sender: mpsc::Sender<QueuedUnit>,
    receiver: Mutex<mpsc::Receiver<QueuedUnit>>,
    tracker: InFlightTracker,
}

impl DispatchQueue {
    pub fn new(capacity: usize, tracker: InFlightTracker) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        Self {
            sender,
            receiver: Mutex::new(receiver),
            tracker,
        }
    }

    pub async fn enqueue(&self, unit: DispatchUnit) -> Result<(), DispatchError> {
        let queued = QueuedUnit {
            unit,
            guard: self.tracker.enter(),
        };
        self.sender
            .send(queued)
            .await
            .map_err(|_| DispatchError::QueueClosed)
    }

    /// Wait for the next unit. Cancel safe.
    pub async fn dequeue(&self) -> Option<QueuedUnit> {
        let mut receiver = self.receiver.lock().await;
        receiver.recv().await
    }

    pub fn try_dequeue(&self) -> Option<QueuedUnit> {
        let mut receiver = self.receiver.try_lock().ok()?;
        receiver.try_recv().ok()
    }

    pub fn depth(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.sender.max_capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.depth() == 0
    }
}
