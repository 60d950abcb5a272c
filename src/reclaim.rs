//! Reclamation ("zombie") queues.
//!
//! One queue exists per resource kind: an ordered backlog of destructions
//! that have been requested but not yet performed. Each entry carries the
//! global timeline value observed when the destroy was requested; the
//! entry's real teardown runs only once the watermark proves every
//! submission that could reference the resource has retired.
//!
//! `collect` stops scanning at the first entry the watermark does not
//! admit. Entries are enqueued in (almost) non-decreasing timestamp order,
//! so everything behind that entry is younger and not collectible either.
//! Two destroyers racing on different resources can invert that order by
//! one collect cycle; the inverted entry is merely retained a little
//! longer, never freed early.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::timeline::Watermark;

struct ZombieEntry<P> {
    timestamp: u64,
    payload: P,
}

/// FIFO of pending destructions for one resource kind.
pub struct ReclaimQueue<P> {
    entries: Mutex<VecDeque<ZombieEntry<P>>>,
}

impl<P> ReclaimQueue<P> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
        }
    }

    /// Append a destruction request stamped with `timestamp` (the global
    /// timeline value at the moment of the destroy call).
    pub fn enqueue(&self, timestamp: u64, payload: P) {
        self.entries.lock().push_back(ZombieEntry { timestamp, payload });
    }

    /// Pending destruction count.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no destructions are pending.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Pop and destroy every leading entry the watermark admits; stop at
    /// the first one it does not. Returns the number destroyed.
    ///
    /// The queue lock is held only around each pop, never across
    /// `destroy`, so concurrent collectors interleave safely.
    pub fn collect(&self, watermark: Watermark, mut destroy: impl FnMut(P)) -> usize {
        let mut reclaimed = 0;
        loop {
            let entry = {
                let mut entries = self.entries.lock();
                match entries.front() {
                    Some(front) if watermark.admits(front.timestamp) => entries.pop_front(),
                    _ => None,
                }
            };
            let Some(entry) = entry else {
                break;
            };
            destroy(entry.payload);
            reclaimed += 1;
        }
        reclaimed
    }

    /// Pop and destroy every entry regardless of timestamp. Teardown only,
    /// after the device is idle.
    pub fn drain_all(&self, mut destroy: impl FnMut(P)) -> usize {
        let mut reclaimed = 0;
        while let Some(entry) = self.entries.lock().pop_front() {
            destroy(entry.payload);
            reclaimed += 1;
        }
        reclaimed
    }
}

impl<P> Default for ReclaimQueue<P> {
    fn default() -> Self {
        Self::new()
    }
}
