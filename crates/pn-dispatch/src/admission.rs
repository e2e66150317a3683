//! Admission control for detached dispatches.
//!
//! The ceiling is read on every decision so `PUT /config/pushers` takes effect
//! immediately. Check and increment are separate atomic operations: under
//! contention the live count can briefly overshoot the ceiling by the number
//! of racing workers.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

#[derive(Debug)]
pub struct AdmissionController {
    ceiling: AtomicI64,
    live: Arc<AtomicI64>,
}

impl AdmissionController {
    pub fn new(ceiling: i64) -> Self {
        Self {
            ceiling: AtomicI64::new(ceiling),
            live: Arc::new(AtomicI64::new(0)),
        }
    }

    pub fn ceiling(&self) -> i64 {
        self.ceiling.load(Ordering::Relaxed)
    }

    pub fn set_ceiling(&self, ceiling: i64) {
        self.ceiling.store(ceiling, Ordering::Relaxed);
    }

    /// Detached dispatches currently running.
    pub fn live(&self) -> i64 {
        self.live.load(Ordering::Relaxed)
    }

    /// Reserve a detached slot, or `None` when the caller must dispatch inline.
    pub fn try_admit(&self) -> Option<AdmissionPermit> {
        let ceiling = self.ceiling();
        if ceiling <= 0 || self.live() >= ceiling {
            return None;
        }

        self.live.fetch_add(1, Ordering::Relaxed);
        Some(AdmissionPermit {
            live: self.live.clone(),
        })
    }
}

/// Held by a detached dispatch; releases its slot on drop.
#[derive(Debug)]
pub struct AdmissionPermit {
    live: Arc<AtomicI64>,
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::Relaxed);
    }
}
