//! External bindless binding-table glue.
//!
//! The registry does not own the shader-visible binding table, but it is
//! the component that knows when a slot becomes occupied or vacant, so it
//! pushes those transitions through this trait. The table is designed for
//! update-after-bind semantics: a binding write needs no synchronization
//! with the slot publish, because the handle (and therefore its index) is
//! not visible to any consumer until the create call returns.

use crate::driver::{DriverAccelerationStructure, DriverBuffer, DriverSampler, DriverTextureView};
use crate::handle::ResourceKind;

/// One binding-table write, addressed by the resource's slot index.
#[derive(Debug)]
pub enum BindingUpdate<'a> {
    /// Bind a buffer at its slot index.
    Buffer {
        /// Slot index within the buffer pool.
        index: u32,
        /// The buffer to bind.
        buffer: &'a DriverBuffer,
    },
    /// Bind a texture view at its slot index.
    TextureView {
        /// Slot index within the view pool.
        index: u32,
        /// The view to bind.
        view: &'a DriverTextureView,
    },
    /// Bind a sampler at its slot index.
    Sampler {
        /// Slot index within the sampler pool.
        index: u32,
        /// The sampler to bind.
        sampler: &'a DriverSampler,
    },
    /// Bind an acceleration structure at its slot index.
    AccelerationStructure {
        /// Slot index within the TLAS/BLAS pool.
        index: u32,
        /// Whether this is a TLAS or BLAS slot.
        kind: ResourceKind,
        /// The structure to bind.
        accel: &'a DriverAccelerationStructure,
    },
}

/// The external bindless table the registry keeps consistent with slot
/// occupancy.
pub trait BindingTable: Send + Sync + 'static {
    /// Publish a binding for a newly created resource.
    fn write_binding(&self, update: BindingUpdate<'_>);

    /// Drop the binding for a reclaimed slot. Called for every kind;
    /// kinds with no table representation (plain textures) may ignore it.
    fn clear_binding(&self, kind: ResourceKind, index: u32);
}

/// Binding table that discards every update, for headless use and tests.
#[derive(Debug, Default)]
pub struct NoopBindingTable;

impl BindingTable for NoopBindingTable {
    fn write_binding(&self, update: BindingUpdate<'_>) {
        log::trace!("NoopBindingTable: write {update:?}");
    }

    fn clear_binding(&self, kind: ResourceKind, index: u32) {
        log::trace!("NoopBindingTable: clear {} slot {index}", kind.name());
    }
}
