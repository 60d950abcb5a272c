//! # gpu-registry
//!
//! Handle-based GPU resource registry with deferred, timeline-ordered
//! reclamation.
//!
//! This crate is the resource-lifecycle core of a GPU abstraction layer:
//! it hands out stable, typed handles to driver-side objects (buffers,
//! textures, texture views, samplers, and acceleration structures),
//! detects stale handles in O(1), and defers every destructive driver
//! call until the asynchronous GPU work that could still touch the object
//! has provably retired.
//!
//! ## Overview
//!
//! - [`ResourceRegistry`]: the composition root, with typed `create_*` /
//!   `destroy_*` / `is_*_valid` per resource kind, submission recording,
//!   and periodic [`collect_garbage`](ResourceRegistry::collect_garbage)
//! - [`Handle`]: opaque `(index, generation)` values; a destroyed
//!   handle never validates again
//! - [`DriverDevice`]: the seam to the driver layer; the null driver
//!   runs everything without a GPU, the Vulkan driver (behind the
//!   `vulkan-backend` feature) runs on real devices
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use gpu_registry::{
//!     BufferDescriptor, BufferUsage, DriverDevice, NullDriver, QueueKind, ResourceRegistry,
//! };
//!
//! let registry = ResourceRegistry::with_driver(Arc::new(NullDriver::new()));
//! let buffer = registry
//!     .create_buffer(&BufferDescriptor::new(1024, BufferUsage::STORAGE))
//!     .unwrap();
//! let submission = registry
//!     .record_submission(QueueKind::Graphics, &[buffer.into()])
//!     .unwrap();
//!
//! registry.destroy_buffer(buffer).unwrap();
//! assert!(!registry.is_buffer_valid(buffer));
//!
//! // The driver object survives until the submission retires.
//! registry.driver().signal_completed(QueueKind::Graphics, submission).unwrap();
//! registry.collect_garbage().unwrap();
//! ```

pub mod arena;
pub mod binding;
pub mod driver;
pub mod error;
pub mod handle;
pub mod reclaim;
pub mod registry;
pub mod report;
pub mod slot_pool;
pub mod timeline;
pub mod types;

pub use arena::{BoundPipeline, CommandPoolArena, CommandUnit};
pub use binding::{BindingTable, BindingUpdate, NoopBindingTable};
pub use driver::{DriverDevice, DriverLimits, MemoryHeap, NullDriver, QueueKind};
#[cfg(feature = "vulkan-backend")]
pub use driver::vulkan::QueueFamilies;
#[cfg(feature = "vulkan-backend")]
pub use driver::VulkanDriver;
pub use error::RegistryError;
pub use handle::{
    AnyHandle, BlasHandle, BufferHandle, Handle, ResourceKind, SamplerHandle, TextureHandle,
    TextureViewHandle, TlasHandle,
};
pub use registry::{RegistryDescriptor, RegistryLimits, ResourceRegistry};
pub use report::{MemoryReport, ResourceReportEntry};
pub use timeline::{SubmissionTimeline, Watermark};
pub use types::{
    AccelerationStructureDescriptor, AccelerationStructureKind, AddressMode, BufferDescriptor,
    BufferUsage, CompareFunction, Extent3d, FilterMode, SamplerDescriptor, TextureDescriptor,
    TextureDimension, TextureFormat, TextureUsage, TextureViewDescriptor,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the registry subsystem. Logging only; safe to skip.
pub fn init() {
    log::info!("gpu-registry v{VERSION} initialized");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_null_driver_name() {
        let driver = NullDriver::new();
        assert_eq!(driver.name(), "Null Driver");
    }
}
