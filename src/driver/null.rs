//! Null driver for testing and development.
//!
//! Performs no GPU work: object creation hands out fake ids, destruction
//! counts, and queue completion is a set of atomics that tests advance
//! through [`DriverDevice::signal_completed`]. This lets every lifecycle
//! property, including "nothing is destroyed before the watermark", be
//! asserted without GPU hardware.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::RegistryError;
use crate::handle::ResourceKind;
use crate::types::{
    AccelerationStructureDescriptor, AccelerationStructureKind, BufferDescriptor,
    SamplerDescriptor, TextureDescriptor, TextureViewDescriptor,
};

use super::{
    DriverAccelerationStructure, DriverBuffer, DriverCommandPool, DriverDevice, DriverLimits,
    DriverMemory, DriverSampler, DriverTexture, DriverTextureView, MemoryHeap, QueueKind,
};

/// Null driver.
#[derive(Debug, Default)]
pub struct NullDriver {
    next_id: AtomicU64,
    completed: [AtomicU64; QueueKind::COUNT],
    created: [AtomicU64; ResourceKind::ALL.len()],
    destroyed: [AtomicU64; ResourceKind::ALL.len()],
    pools_created: AtomicU64,
    pools_destroyed: AtomicU64,
}

impl NullDriver {
    /// Create a new null driver.
    pub fn new() -> Self {
        Self::default()
    }

    fn fresh_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn record_create(&self, kind: ResourceKind) -> u64 {
        self.created[kind.index()].fetch_add(1, Ordering::Relaxed);
        self.fresh_id()
    }

    fn record_destroy(&self, kind: ResourceKind) {
        self.destroyed[kind.index()].fetch_add(1, Ordering::Relaxed);
    }

    /// Objects of `kind` created so far.
    pub fn created_count(&self, kind: ResourceKind) -> u64 {
        self.created[kind.index()].load(Ordering::Relaxed)
    }

    /// Objects of `kind` destroyed so far.
    pub fn destroyed_count(&self, kind: ResourceKind) -> u64 {
        self.destroyed[kind.index()].load(Ordering::Relaxed)
    }

    /// Command pools currently alive (created minus destroyed).
    pub fn live_command_pools(&self) -> u64 {
        self.pools_created.load(Ordering::Relaxed) - self.pools_destroyed.load(Ordering::Relaxed)
    }

    /// Allocate a fake memory heap for placement tests.
    pub fn allocate_heap(&self, size: u64, label: impl Into<String>) -> MemoryHeap {
        MemoryHeap::new(
            Some(label.into()),
            size,
            DriverMemory::Null {
                id: self.fresh_id(),
            },
        )
    }
}

impl DriverDevice for NullDriver {
    fn name(&self) -> &'static str {
        "Null Driver"
    }

    fn limits(&self) -> DriverLimits {
        DriverLimits::default()
    }

    fn queue_family_index(&self, queue: QueueKind) -> u32 {
        queue.index() as u32
    }

    fn create_buffer(&self, desc: &BufferDescriptor) -> Result<DriverBuffer, RegistryError> {
        log::trace!(
            "NullDriver: creating buffer {:?} (size: {})",
            desc.label,
            desc.size
        );
        Ok(DriverBuffer::Null {
            id: self.record_create(ResourceKind::Buffer),
            size: desc.size,
        })
    }

    fn create_buffer_in_heap(
        &self,
        desc: &BufferDescriptor,
        heap: &MemoryHeap,
        offset: u64,
    ) -> Result<DriverBuffer, RegistryError> {
        if offset + desc.size > heap.size() {
            return Err(RegistryError::ResourceCreationFailed(format!(
                "buffer of {} bytes at offset {} does not fit heap of {} bytes",
                desc.size,
                offset,
                heap.size()
            )));
        }
        log::trace!(
            "NullDriver: placing buffer {:?} in heap {:?} at {}",
            desc.label,
            heap.label(),
            offset
        );
        Ok(DriverBuffer::Null {
            id: self.record_create(ResourceKind::Buffer),
            size: desc.size,
        })
    }

    fn destroy_buffer(&self, _buffer: DriverBuffer) -> Result<(), RegistryError> {
        self.record_destroy(ResourceKind::Buffer);
        Ok(())
    }

    fn create_texture(&self, desc: &TextureDescriptor) -> Result<DriverTexture, RegistryError> {
        log::trace!(
            "NullDriver: creating texture {:?} ({}x{}x{})",
            desc.label,
            desc.size.width,
            desc.size.height,
            desc.size.depth
        );
        Ok(DriverTexture::Null {
            id: self.record_create(ResourceKind::Texture),
        })
    }

    fn create_texture_in_heap(
        &self,
        desc: &TextureDescriptor,
        heap: &MemoryHeap,
        offset: u64,
    ) -> Result<DriverTexture, RegistryError> {
        if offset + desc.approximate_size() > heap.size() {
            return Err(RegistryError::ResourceCreationFailed(format!(
                "texture {:?} does not fit heap of {} bytes at offset {}",
                desc.label,
                heap.size(),
                offset
            )));
        }
        Ok(DriverTexture::Null {
            id: self.record_create(ResourceKind::Texture),
        })
    }

    fn destroy_texture(&self, _texture: DriverTexture) -> Result<(), RegistryError> {
        self.record_destroy(ResourceKind::Texture);
        Ok(())
    }

    fn create_texture_view(
        &self,
        _texture: &DriverTexture,
        _texture_desc: &TextureDescriptor,
        desc: &TextureViewDescriptor,
    ) -> Result<DriverTextureView, RegistryError> {
        log::trace!("NullDriver: creating texture view {:?}", desc.label);
        Ok(DriverTextureView::Null {
            id: self.record_create(ResourceKind::TextureView),
        })
    }

    fn destroy_texture_view(&self, _view: DriverTextureView) -> Result<(), RegistryError> {
        self.record_destroy(ResourceKind::TextureView);
        Ok(())
    }

    fn create_sampler(&self, desc: &SamplerDescriptor) -> Result<DriverSampler, RegistryError> {
        log::trace!("NullDriver: creating sampler {:?}", desc.label);
        Ok(DriverSampler::Null {
            id: self.record_create(ResourceKind::Sampler),
        })
    }

    fn destroy_sampler(&self, _sampler: DriverSampler) -> Result<(), RegistryError> {
        self.record_destroy(ResourceKind::Sampler);
        Ok(())
    }

    fn create_acceleration_structure(
        &self,
        kind: AccelerationStructureKind,
        desc: &AccelerationStructureDescriptor,
        backing: &DriverBuffer,
    ) -> Result<DriverAccelerationStructure, RegistryError> {
        if backing.size() < desc.size {
            return Err(RegistryError::ResourceCreationFailed(format!(
                "backing buffer of {} bytes is smaller than the structure's {} bytes",
                backing.size(),
                desc.size
            )));
        }
        let resource_kind = match kind {
            AccelerationStructureKind::TopLevel => ResourceKind::Tlas,
            AccelerationStructureKind::BottomLevel => ResourceKind::Blas,
        };
        log::trace!(
            "NullDriver: creating {} {:?}",
            resource_kind.name(),
            desc.label
        );
        Ok(DriverAccelerationStructure::Null {
            id: self.record_create(resource_kind),
        })
    }

    fn destroy_acceleration_structure(
        &self,
        kind: AccelerationStructureKind,
        _accel: DriverAccelerationStructure,
    ) -> Result<(), RegistryError> {
        self.record_destroy(match kind {
            AccelerationStructureKind::TopLevel => ResourceKind::Tlas,
            AccelerationStructureKind::BottomLevel => ResourceKind::Blas,
        });
        Ok(())
    }

    fn create_command_pool(&self, queue_family: u32) -> Result<DriverCommandPool, RegistryError> {
        log::trace!("NullDriver: creating command pool for family {queue_family}");
        self.pools_created.fetch_add(1, Ordering::Relaxed);
        Ok(DriverCommandPool::Null {
            id: self.fresh_id(),
        })
    }

    fn reset_command_pool(&self, _pool: &DriverCommandPool) -> Result<(), RegistryError> {
        Ok(())
    }

    fn destroy_command_pool(&self, _pool: DriverCommandPool) -> Result<(), RegistryError> {
        self.pools_destroyed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn completed_value(&self, queue: QueueKind) -> Result<u64, RegistryError> {
        Ok(self.completed[queue.index()].load(Ordering::Acquire))
    }

    fn signal_completed(&self, queue: QueueKind, value: u64) -> Result<(), RegistryError> {
        self.completed[queue.index()].fetch_max(value, Ordering::AcqRel);
        Ok(())
    }

    fn wait_idle(&self) -> Result<(), RegistryError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_is_monotonic() {
        let driver = NullDriver::new();
        driver.signal_completed(QueueKind::Graphics, 5).unwrap();
        driver.signal_completed(QueueKind::Graphics, 3).unwrap();
        assert_eq!(driver.completed_value(QueueKind::Graphics).unwrap(), 5);
        assert_eq!(driver.completed_value(QueueKind::Compute).unwrap(), 0);
    }

    #[test]
    fn test_create_destroy_accounting() {
        let driver = NullDriver::new();
        let buffer = driver
            .create_buffer(&BufferDescriptor::new(16, Default::default()))
            .unwrap();
        assert_eq!(driver.created_count(ResourceKind::Buffer), 1);
        assert_eq!(driver.destroyed_count(ResourceKind::Buffer), 0);
        driver.destroy_buffer(buffer).unwrap();
        assert_eq!(driver.destroyed_count(ResourceKind::Buffer), 1);
    }

    #[test]
    fn test_heap_placement_bounds() {
        let driver = NullDriver::new();
        let heap = driver.allocate_heap(64, "small heap");
        let desc = BufferDescriptor::new(48, Default::default());
        assert!(driver.create_buffer_in_heap(&desc, &heap, 0).is_ok());
        assert!(driver.create_buffer_in_heap(&desc, &heap, 32).is_err());
    }
}
