//! Submission timeline.
//!
//! Every unit of GPU work gets a value from one process-wide monotonic
//! counter, giving submissions a total order relative to resource destroy
//! requests even though the hardware queues execute concurrently and
//! complete out of order relative to each other.
//!
//! Per queue, the timeline remembers the latest value that queue was asked
//! to reach. The driver reports how far each queue has actually executed;
//! the minimum completion across still-busy queues is the reclamation
//! watermark: zombies stamped below it can no longer be touched by any
//! in-flight work.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::driver::{DriverDevice, QueueKind};
use crate::error::RegistryError;

/// The reclamation bound computed from queue completion state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Watermark {
    /// At least one queue is still executing; only zombies stamped
    /// strictly below this value are reclaimable.
    Value(u64),
    /// Every queue is fully drained; everything is reclaimable.
    Unbounded,
}

impl Watermark {
    /// Whether a zombie stamped at `timestamp` may be reclaimed.
    pub fn admits(&self, timestamp: u64) -> bool {
        match self {
            Self::Value(bound) => timestamp < *bound,
            Self::Unbounded => true,
        }
    }
}

/// Process-wide submission counter plus per-queue pending values.
#[derive(Debug, Default)]
pub struct SubmissionTimeline {
    next_value: AtomicU64,
    pending: [AtomicU64; QueueKind::COUNT],
}

impl SubmissionTimeline {
    /// Create a timeline with no submissions recorded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one submission on `queue`, returning its timeline value.
    ///
    /// Must be called exactly once per submission, and only inside the
    /// registry's submission exclusion region: validating the submission's
    /// resource references and publishing the pending value must not
    /// interleave with a concurrent destroy of one of those resources.
    pub fn record(&self, queue: QueueKind) -> u64 {
        let value = self.next_value.fetch_add(1, Ordering::Relaxed) + 1;
        self.pending[queue.index()].store(value, Ordering::Release);
        value
    }

    /// The current global timeline value (the most recently issued
    /// submission value, 0 before any submission). Zombies are stamped
    /// with this.
    pub fn current(&self) -> u64 {
        self.next_value.load(Ordering::Relaxed)
    }

    /// The latest value `queue` was asked to reach, 0 if it never
    /// submitted.
    pub fn latest_pending(&self, queue: QueueKind) -> u64 {
        self.pending[queue.index()].load(Ordering::Acquire)
    }

    /// Compute the reclamation watermark across all queues.
    ///
    /// Queries the driver's completion counter for every queue that has
    /// ever submitted, a synchronous round-trip whose failure propagates
    /// rather than being retried. A queue that never submitted, or whose
    /// work is fully drained, contributes no bound.
    pub fn watermark(&self, driver: &dyn DriverDevice) -> Result<Watermark, RegistryError> {
        let mut bound: Option<u64> = None;
        for queue in QueueKind::ALL {
            let pending = self.latest_pending(queue);
            if pending == 0 {
                continue;
            }
            let completed = driver.completed_value(queue)?;
            if pending > completed {
                bound = Some(match bound {
                    Some(existing) => existing.min(completed),
                    None => completed,
                });
            }
        }
        Ok(match bound {
            Some(value) => Watermark::Value(value),
            None => Watermark::Unbounded,
        })
    }
}
