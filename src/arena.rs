//! Recycled command pool arena.
//!
//! Command pools are few, large, and stateful, the opposite of the slot
//! pools' many small payloads, but they follow the same discipline:
//! acquire, use, retire against the submission that last touched the
//! pool, and only reset-and-reuse once the watermark proves that
//! submission retired. Units are keyed by queue family and never migrate
//! across families.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::driver::{DriverCommandPool, DriverDevice};
use crate::error::RegistryError;
use crate::reclaim::ReclaimQueue;
use crate::timeline::Watermark;

/// The pipeline kind currently bound while recording through a unit.
///
/// Cleared when the unit is reset. The ids are the external encoder's
/// pipeline identifiers; the arena only keeps the discriminant honest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoundPipeline {
    /// Nothing bound yet.
    #[default]
    None,
    /// A graphics pipeline.
    Graphics(u64),
    /// A compute pipeline.
    Compute(u64),
    /// A ray tracing pipeline.
    RayTracing(u64),
}

/// Per-recording scratch state carried by a command unit.
#[derive(Debug, Default)]
pub struct RecordingState {
    /// The currently bound pipeline, if any.
    pub bound_pipeline: BoundPipeline,
    /// Command buffers handed out from the pool this recording.
    pub allocated_buffers: u32,
}

impl RecordingState {
    fn reset(&mut self) {
        self.bound_pipeline = BoundPipeline::None;
        self.allocated_buffers = 0;
    }
}

/// One recyclable command-encoding unit: a driver command pool tagged with
/// its queue family, plus the scratch state of the current recording.
#[derive(Debug)]
pub struct CommandUnit {
    family: u32,
    pool: DriverCommandPool,
    state: RecordingState,
}

impl CommandUnit {
    /// The queue family this unit records for.
    pub fn family(&self) -> u32 {
        self.family
    }

    /// The underlying driver command pool.
    pub fn pool(&self) -> &DriverCommandPool {
        &self.pool
    }

    /// Mutable access to the recording scratch state.
    pub fn state_mut(&mut self) -> &mut RecordingState {
        &mut self.state
    }
}

/// Recycling allocator for command units.
pub struct CommandPoolArena {
    /// Reset units ready for reuse, per queue family. Narrow lock: a pop
    /// is cheap and fresh allocation is rare.
    free: Mutex<HashMap<u32, Vec<CommandUnit>>>,
    /// Units waiting for their last submission to retire.
    retired: ReclaimQueue<CommandUnit>,
}

impl CommandPoolArena {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self {
            free: Mutex::new(HashMap::new()),
            retired: ReclaimQueue::new(),
        }
    }

    /// Pop a previously returned unit for `family`, or allocate a fresh
    /// one from the driver.
    pub fn acquire(
        &self,
        driver: &dyn DriverDevice,
        family: u32,
    ) -> Result<CommandUnit, RegistryError> {
        if let Some(unit) = self.free.lock().entry(family).or_default().pop() {
            debug_assert_eq!(unit.family, family);
            return Ok(unit);
        }
        let pool = driver.create_command_pool(family)?;
        log::debug!("allocated fresh command unit for queue family {family}");
        Ok(CommandUnit {
            family,
            pool,
            state: RecordingState::default(),
        })
    }

    /// Hand a unit back, keyed on the submission that last used it. The
    /// unit becomes reusable once the watermark passes that submission.
    pub fn retire(&self, unit: CommandUnit, last_submission: u64) {
        self.retired.enqueue(last_submission, unit);
    }

    /// Reset every retired unit the watermark admits and return it to its
    /// family's free list. Returns the number recycled.
    pub fn collect(&self, watermark: Watermark, driver: &dyn DriverDevice) -> usize {
        self.retired.collect(watermark, |mut unit| {
            if let Err(e) = driver.reset_command_pool(&unit.pool) {
                log::error!(
                    "failed to reset command pool for queue family {}: {e}",
                    unit.family
                );
                debug_assert!(false, "command pool reset failed");
            }
            unit.state.reset();
            self.free.lock().entry(unit.family).or_default().push(unit);
        })
    }

    /// Units currently waiting on the watermark.
    pub fn retired_len(&self) -> usize {
        self.retired.len()
    }

    /// Units sitting reset on the free lists.
    pub fn free_len(&self) -> usize {
        self.free.lock().values().map(Vec::len).sum()
    }

    /// Destroy every unit this arena holds. Teardown only, after the
    /// device is idle.
    pub fn drain(&self, driver: &dyn DriverDevice) {
        self.retired.drain_all(|unit| {
            if let Err(e) = driver.destroy_command_pool(unit.pool) {
                log::error!("failed to destroy retired command pool: {e}");
            }
        });
        for (_, units) in self.free.lock().drain() {
            for unit in units {
                if let Err(e) = driver.destroy_command_pool(unit.pool) {
                    log::error!("failed to destroy pooled command pool: {e}");
                }
            }
        }
    }
}

impl Default for CommandPoolArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::NullDriver;

    #[test]
    fn test_acquire_allocates_then_recycles() {
        let driver = NullDriver::new();
        let arena = CommandPoolArena::new();

        let unit = arena.acquire(&driver, 0).unwrap();
        assert_eq!(driver.live_command_pools(), 1);
        arena.retire(unit, 1);

        // Not recyclable until the watermark passes submission 1.
        arena.collect(Watermark::Value(1), &driver);
        assert_eq!(arena.free_len(), 0);
        assert_eq!(arena.retired_len(), 1);

        arena.collect(Watermark::Value(2), &driver);
        assert_eq!(arena.free_len(), 1);

        // Reuse instead of allocating a second pool.
        let again = arena.acquire(&driver, 0).unwrap();
        assert_eq!(driver.live_command_pools(), 1);
        assert_eq!(again.family(), 0);
        arena.retire(again, 2);
        arena.drain(&driver);
        assert_eq!(driver.live_command_pools(), 0);
    }

    #[test]
    fn test_units_stay_within_family() {
        let driver = NullDriver::new();
        let arena = CommandPoolArena::new();

        let a = arena.acquire(&driver, 0).unwrap();
        arena.retire(a, 1);
        arena.collect(Watermark::Unbounded, &driver);

        // Family 1 must not steal family 0's pooled unit.
        let b = arena.acquire(&driver, 1).unwrap();
        assert_eq!(b.family(), 1);
        assert_eq!(driver.live_command_pools(), 2);
        assert_eq!(arena.free_len(), 1);
        arena.retire(b, 2);
        arena.drain(&driver);
    }

    #[test]
    fn test_reset_clears_recording_state() {
        let driver = NullDriver::new();
        let arena = CommandPoolArena::new();

        let mut unit = arena.acquire(&driver, 0).unwrap();
        unit.state_mut().bound_pipeline = BoundPipeline::Compute(42);
        unit.state_mut().allocated_buffers = 3;
        arena.retire(unit, 1);
        arena.collect(Watermark::Unbounded, &driver);

        let unit = arena.acquire(&driver, 0).unwrap();
        assert_eq!(unit.state.bound_pipeline, BoundPipeline::None);
        assert_eq!(unit.state.allocated_buffers, 0);
        arena.retire(unit, 2);
        arena.drain(&driver);
    }
}
