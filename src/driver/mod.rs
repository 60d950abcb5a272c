//! Driver-object primitives.
//!
//! The registry treats "create a driver object", "destroy a driver
//! object", and "how far has this queue executed" as primitives supplied
//! by a driver layer. [`DriverDevice`] is that seam: the null driver backs
//! tests and CI machines without a GPU, the Vulkan driver backs real
//! devices.
//!
//! Driver handles are enums with one variant per driver. Unlike ordinary
//! RAII wrappers they have **no** `Drop` teardown: the registry's deferred
//! reclamation is the only path that destroys driver objects. Dropping a
//! handle without routing it through the registry leaks the object, and
//! the registry reports it as a leak at teardown.

pub mod null;
#[cfg(feature = "vulkan-backend")]
pub mod vulkan;

pub use null::NullDriver;
#[cfg(feature = "vulkan-backend")]
pub use vulkan::VulkanDriver;

#[cfg(feature = "vulkan-backend")]
use ash::vk;
#[cfg(feature = "vulkan-backend")]
use gpu_allocator::vulkan::Allocation;
#[cfg(feature = "vulkan-backend")]
use parking_lot::Mutex;

use crate::error::RegistryError;
use crate::types::{
    AccelerationStructureDescriptor, AccelerationStructureKind, BufferDescriptor,
    SamplerDescriptor, TextureDescriptor, TextureViewDescriptor,
};

/// Hardware queue kinds the registry tracks submissions on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueKind {
    /// Graphics (and implicitly compute/transfer capable) queue.
    Graphics,
    /// Async compute queue.
    Compute,
    /// Dedicated transfer queue.
    Transfer,
}

impl QueueKind {
    /// All queue kinds.
    pub const ALL: [QueueKind; 3] = [QueueKind::Graphics, QueueKind::Compute, QueueKind::Transfer];

    /// Number of queue kinds.
    pub const COUNT: usize = 3;

    /// Dense index for per-queue arrays.
    pub fn index(self) -> usize {
        match self {
            Self::Graphics => 0,
            Self::Compute => 1,
            Self::Transfer => 2,
        }
    }

    /// Human-readable queue name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Graphics => "graphics",
            Self::Compute => "compute",
            Self::Transfer => "transfer",
        }
    }
}

/// Driver handle to a buffer.
pub enum DriverBuffer {
    /// Null driver (no GPU allocation).
    Null {
        /// Fake object id for tracing.
        id: u64,
        /// Requested size in bytes.
        size: u64,
    },
    /// Vulkan buffer. `allocation` is `None` for heap-placed buffers.
    #[cfg(feature = "vulkan-backend")]
    Vulkan {
        /// Raw buffer handle.
        buffer: vk::Buffer,
        /// Owned memory, absent when placed in an external heap.
        allocation: Mutex<Option<Allocation>>,
        /// GPU device address, 0 when not requested.
        address: u64,
        /// Size in bytes.
        size: u64,
    },
}

impl DriverBuffer {
    /// Size in bytes.
    pub fn size(&self) -> u64 {
        match self {
            Self::Null { size, .. } => *size,
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan { size, .. } => *size,
        }
    }

    /// GPU device address, if the buffer requested one.
    pub fn device_address(&self) -> Option<u64> {
        match self {
            Self::Null { .. } => None,
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan { address, .. } => (*address != 0).then_some(*address),
        }
    }
}

impl std::fmt::Debug for DriverBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null { id, size } => f
                .debug_struct("DriverBuffer::Null")
                .field("id", id)
                .field("size", size)
                .finish(),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan { buffer, size, .. } => f
                .debug_struct("DriverBuffer::Vulkan")
                .field("buffer", buffer)
                .field("size", size)
                .finish_non_exhaustive(),
        }
    }
}

/// Driver handle to a texture (image).
pub enum DriverTexture {
    /// Null driver (no GPU allocation).
    Null {
        /// Fake object id for tracing.
        id: u64,
    },
    /// Vulkan image. `allocation` is `None` for heap-placed images.
    #[cfg(feature = "vulkan-backend")]
    Vulkan {
        /// Raw image handle.
        image: vk::Image,
        /// Owned memory, absent when placed in an external heap.
        allocation: Mutex<Option<Allocation>>,
        /// Vulkan format the image was created with.
        format: vk::Format,
        /// Image extent.
        extent: vk::Extent3D,
    },
}

impl std::fmt::Debug for DriverTexture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null { id } => f.debug_struct("DriverTexture::Null").field("id", id).finish(),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan { image, format, .. } => f
                .debug_struct("DriverTexture::Vulkan")
                .field("image", image)
                .field("format", format)
                .finish_non_exhaustive(),
        }
    }
}

/// Driver handle to a texture view.
#[derive(Debug)]
pub enum DriverTextureView {
    /// Null driver.
    Null {
        /// Fake object id for tracing.
        id: u64,
    },
    /// Vulkan image view.
    #[cfg(feature = "vulkan-backend")]
    Vulkan {
        /// Raw image view handle.
        view: vk::ImageView,
    },
}

/// Driver handle to a sampler.
#[derive(Debug)]
pub enum DriverSampler {
    /// Null driver.
    Null {
        /// Fake object id for tracing.
        id: u64,
    },
    /// Vulkan sampler.
    #[cfg(feature = "vulkan-backend")]
    Vulkan {
        /// Raw sampler handle.
        sampler: vk::Sampler,
    },
}

/// Driver handle to an acceleration structure.
#[derive(Debug)]
pub enum DriverAccelerationStructure {
    /// Null driver.
    Null {
        /// Fake object id for tracing.
        id: u64,
    },
    /// Vulkan acceleration structure.
    #[cfg(feature = "vulkan-backend")]
    Vulkan {
        /// Raw acceleration structure handle.
        accel: vk::AccelerationStructureKHR,
        /// Device address used by instance buffers and shaders.
        address: u64,
    },
}

impl DriverAccelerationStructure {
    /// GPU device address of the structure.
    pub fn device_address(&self) -> Option<u64> {
        match self {
            Self::Null { .. } => None,
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan { address, .. } => Some(*address),
        }
    }
}

/// Driver handle to a command pool.
#[derive(Debug)]
pub enum DriverCommandPool {
    /// Null driver.
    Null {
        /// Fake object id for tracing.
        id: u64,
    },
    /// Vulkan command pool.
    #[cfg(feature = "vulkan-backend")]
    Vulkan {
        /// Raw command pool handle.
        pool: vk::CommandPool,
    },
}

/// Driver handle to a raw device memory block backing a [`MemoryHeap`].
#[derive(Debug)]
pub enum DriverMemory {
    /// Null driver.
    Null {
        /// Fake object id for tracing.
        id: u64,
    },
    /// Vulkan device memory.
    #[cfg(feature = "vulkan-backend")]
    Vulkan {
        /// Raw device memory handle.
        memory: vk::DeviceMemory,
    },
}

/// An externally owned memory heap resources can be placed into.
///
/// The registry never owns a heap: slots placed in one hold a shared
/// `Arc` back-reference that is released when the slot is reclaimed, and
/// the heap's creator frees the memory once no references remain.
#[derive(Debug)]
pub struct MemoryHeap {
    label: Option<String>,
    size: u64,
    raw: DriverMemory,
}

impl MemoryHeap {
    /// Wrap an externally allocated memory block.
    pub fn new(label: Option<String>, size: u64, raw: DriverMemory) -> Self {
        Self { label, size, raw }
    }

    /// Heap label, if set.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Heap size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// The raw memory handle.
    pub fn raw(&self) -> &DriverMemory {
        &self.raw
    }
}

// SAFETY: all variants hold raw driver handles (plain 64-bit ids) plus,
// for Vulkan resources, a gpu-allocator Allocation behind a Mutex; both
// are safe to move and share across threads. Same reasoning for each enum.
unsafe impl Send for DriverBuffer {}
unsafe impl Sync for DriverBuffer {}
unsafe impl Send for DriverTexture {}
unsafe impl Sync for DriverTexture {}
unsafe impl Send for DriverTextureView {}
unsafe impl Sync for DriverTextureView {}
unsafe impl Send for DriverSampler {}
unsafe impl Sync for DriverSampler {}
unsafe impl Send for DriverAccelerationStructure {}
unsafe impl Sync for DriverAccelerationStructure {}
unsafe impl Send for DriverCommandPool {}
unsafe impl Sync for DriverCommandPool {}
unsafe impl Send for DriverMemory {}
unsafe impl Sync for DriverMemory {}

/// Per-kind resource ceilings reported by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverLimits {
    /// Maximum live buffers.
    pub max_buffers: u32,
    /// Maximum live textures.
    pub max_textures: u32,
    /// Maximum live texture views.
    pub max_texture_views: u32,
    /// Maximum live samplers.
    pub max_samplers: u32,
    /// Maximum live acceleration structures (per level).
    pub max_acceleration_structures: u32,
}

impl Default for DriverLimits {
    fn default() -> Self {
        Self {
            max_buffers: 65_536,
            max_textures: 16_384,
            max_texture_views: 32_768,
            max_samplers: 4_000,
            max_acceleration_structures: 4_096,
        }
    }
}

/// The driver primitives the registry consumes.
///
/// Mirrors the shape of a backend trait: creation returns enum handles,
/// destruction consumes them, and per-queue completion counters expose how
/// far the device has actually executed.
pub trait DriverDevice: Send + Sync + 'static {
    /// Driver name, for logs.
    fn name(&self) -> &'static str;

    /// Per-kind resource ceilings.
    fn limits(&self) -> DriverLimits;

    /// The hardware queue family a queue kind maps to.
    fn queue_family_index(&self, queue: QueueKind) -> u32;

    /// Create a buffer with its own memory.
    fn create_buffer(&self, desc: &BufferDescriptor) -> Result<DriverBuffer, RegistryError>;

    /// Create a buffer placed into an external heap at `offset`.
    fn create_buffer_in_heap(
        &self,
        desc: &BufferDescriptor,
        heap: &MemoryHeap,
        offset: u64,
    ) -> Result<DriverBuffer, RegistryError>;

    /// Destroy a buffer. Must only be called once the GPU provably no
    /// longer uses it; the registry's watermark guarantees that.
    fn destroy_buffer(&self, buffer: DriverBuffer) -> Result<(), RegistryError>;

    /// Create a texture with its own memory.
    fn create_texture(&self, desc: &TextureDescriptor) -> Result<DriverTexture, RegistryError>;

    /// Create a texture placed into an external heap at `offset`.
    fn create_texture_in_heap(
        &self,
        desc: &TextureDescriptor,
        heap: &MemoryHeap,
        offset: u64,
    ) -> Result<DriverTexture, RegistryError>;

    /// Destroy a texture. Same timing contract as [`destroy_buffer`](Self::destroy_buffer).
    fn destroy_texture(&self, texture: DriverTexture) -> Result<(), RegistryError>;

    /// Create a view over a texture.
    fn create_texture_view(
        &self,
        texture: &DriverTexture,
        texture_desc: &TextureDescriptor,
        desc: &TextureViewDescriptor,
    ) -> Result<DriverTextureView, RegistryError>;

    /// Destroy a texture view.
    fn destroy_texture_view(&self, view: DriverTextureView) -> Result<(), RegistryError>;

    /// Create a sampler.
    fn create_sampler(&self, desc: &SamplerDescriptor) -> Result<DriverSampler, RegistryError>;

    /// Destroy a sampler.
    fn destroy_sampler(&self, sampler: DriverSampler) -> Result<(), RegistryError>;

    /// Create an acceleration structure over `backing`, which must cover
    /// `desc.size` bytes.
    fn create_acceleration_structure(
        &self,
        kind: AccelerationStructureKind,
        desc: &AccelerationStructureDescriptor,
        backing: &DriverBuffer,
    ) -> Result<DriverAccelerationStructure, RegistryError>;

    /// Destroy an acceleration structure (not its backing buffer).
    fn destroy_acceleration_structure(
        &self,
        kind: AccelerationStructureKind,
        accel: DriverAccelerationStructure,
    ) -> Result<(), RegistryError>;

    /// Create a command pool for a queue family.
    fn create_command_pool(&self, queue_family: u32) -> Result<DriverCommandPool, RegistryError>;

    /// Reset a command pool, releasing everything recorded through it.
    fn reset_command_pool(&self, pool: &DriverCommandPool) -> Result<(), RegistryError>;

    /// Destroy a command pool.
    fn destroy_command_pool(&self, pool: DriverCommandPool) -> Result<(), RegistryError>;

    /// The timeline value this queue's work has actually completed.
    /// A synchronous round-trip to the driver; may block on kernel
    /// scheduling, and may fail.
    fn completed_value(&self, queue: QueueKind) -> Result<u64, RegistryError>;

    /// Advance a queue's completion counter from the CPU.
    ///
    /// On Vulkan this is a timeline-semaphore signal; on the null driver
    /// it is the hook tests use to simulate GPU progress.
    fn signal_completed(&self, queue: QueueKind, value: u64) -> Result<(), RegistryError>;

    /// Block until the device is idle.
    fn wait_idle(&self) -> Result<(), RegistryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_kind_indices_are_dense() {
        for (i, queue) in QueueKind::ALL.iter().enumerate() {
            assert_eq!(queue.index(), i);
        }
    }

    #[test]
    fn test_null_buffer_has_no_device_address() {
        let buffer = DriverBuffer::Null { id: 1, size: 64 };
        assert_eq!(buffer.size(), 64);
        assert_eq!(buffer.device_address(), None);
    }
}
