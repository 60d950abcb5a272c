//! The resource registry: composition root for pools, reclamation queues,
//! the submission timeline, and the command pool arenas.
//!
//! # Lifecycle
//!
//! ```text
//! create_X ──► slot pool ──► binding table write (update-after-bind)
//!
//! destroy_X ──► zombie CAS ──► reclamation queue (timeline-stamped)
//!
//! collect_garbage ──► watermark ──► drain queues ──► driver teardown
//!                                                └─► free-list recycle
//! ```
//!
//! # Locking
//!
//! A single device-wide `RwLock` orders submissions against destroys:
//!
//! - **exclusive**: `record_submission` (validate references + bump the
//!   timeline as one point of no return), `collect_garbage` (so payload
//!   reclamation never races a reader), `memory_report`, teardown.
//! - **shared**: destroys (any number race each other; the per-slot CAS
//!   picks the winner) and read accessors.
//!
//! `create_*`, `is_*_valid`, and the pools' unchecked dereference stay off
//! this lock entirely.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::arena::{CommandPoolArena, CommandUnit};
use crate::binding::{BindingTable, BindingUpdate, NoopBindingTable};
use crate::driver::{DriverDevice, DriverLimits, MemoryHeap, QueueKind};
use crate::error::RegistryError;
use crate::handle::{
    AnyHandle, BlasHandle, BlasKind, BufferHandle, BufferKind, Handle, HandleKind, ResourceKind,
    SamplerHandle, SamplerKind, TextureHandle, TextureKind, TextureViewHandle, TextureViewKind,
    TlasHandle, TlasKind,
};
use crate::reclaim::ReclaimQueue;
use crate::report::{MemoryReport, ResourceReportEntry};
use crate::slot_pool::{CapacityError, SlotPool};
use crate::timeline::SubmissionTimeline;
use crate::types::{
    AccelerationStructureDescriptor, AccelerationStructureKind, BufferDescriptor, BufferUsage,
    Extent3d, SamplerDescriptor, TextureDescriptor, TextureFormat, TextureViewDescriptor,
};

/// Per-kind live-resource budgets, usually sourced from driver capability
/// reporting at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryLimits {
    /// Maximum live buffers.
    pub max_buffers: u32,
    /// Maximum live textures.
    pub max_textures: u32,
    /// Maximum live texture views.
    pub max_texture_views: u32,
    /// Maximum live samplers.
    pub max_samplers: u32,
    /// Maximum live acceleration structures, per level.
    pub max_acceleration_structures: u32,
}

impl Default for RegistryLimits {
    fn default() -> Self {
        DriverLimits::default().into()
    }
}

impl From<DriverLimits> for RegistryLimits {
    fn from(limits: DriverLimits) -> Self {
        Self {
            max_buffers: limits.max_buffers,
            max_textures: limits.max_textures,
            max_texture_views: limits.max_texture_views,
            max_samplers: limits.max_samplers,
            max_acceleration_structures: limits.max_acceleration_structures,
        }
    }
}

/// Construction parameters for a [`ResourceRegistry`].
#[derive(Debug, Clone, Default)]
pub struct RegistryDescriptor {
    /// Debug label for the registry.
    pub label: Option<String>,
    /// Budget overrides; `None` uses the driver's reported limits.
    pub limits: Option<RegistryLimits>,
}

impl RegistryDescriptor {
    /// Create a descriptor with driver-reported limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Override the per-kind budgets.
    pub fn with_limits(mut self, limits: RegistryLimits) -> Self {
        self.limits = Some(limits);
        self
    }
}

struct BufferSlot {
    raw: crate::driver::DriverBuffer,
    label: Option<String>,
    size: u64,
    usage: BufferUsage,
    /// Back-reference to an externally owned heap when the buffer did not
    /// allocate its own memory. Shared, never owning.
    heap: Option<Arc<MemoryHeap>>,
}

struct TextureSlot {
    raw: crate::driver::DriverTexture,
    desc: TextureDescriptor,
    size: u64,
    heap: Option<Arc<MemoryHeap>>,
}

struct TextureViewSlot {
    raw: crate::driver::DriverTextureView,
    label: Option<String>,
    texture: TextureHandle,
    format: TextureFormat,
}

struct SamplerSlot {
    raw: crate::driver::DriverSampler,
    label: Option<String>,
}

struct AccelSlot {
    raw: crate::driver::DriverAccelerationStructure,
    label: Option<String>,
    kind: AccelerationStructureKind,
    /// The registry-owned buffer backing this structure; zombied together
    /// with it.
    backing: BufferHandle,
    size: u64,
}

/// The composition root: one slot pool and reclamation queue per resource
/// kind, the submission timeline, and the command pool arenas.
pub struct ResourceRegistry {
    driver: Arc<dyn DriverDevice>,
    bindings: Arc<dyn BindingTable>,
    label: Option<String>,
    timeline: SubmissionTimeline,
    /// See the module docs for what takes this shared vs. exclusive.
    submission_lock: RwLock<()>,

    buffers: SlotPool<BufferKind, BufferSlot>,
    buffer_zombies: ReclaimQueue<BufferHandle>,
    textures: SlotPool<TextureKind, TextureSlot>,
    texture_zombies: ReclaimQueue<TextureHandle>,
    texture_views: SlotPool<TextureViewKind, TextureViewSlot>,
    texture_view_zombies: ReclaimQueue<TextureViewHandle>,
    samplers: SlotPool<SamplerKind, SamplerSlot>,
    sampler_zombies: ReclaimQueue<SamplerHandle>,
    tlas: SlotPool<TlasKind, AccelSlot>,
    tlas_zombies: ReclaimQueue<TlasHandle>,
    blas: SlotPool<BlasKind, AccelSlot>,
    blas_zombies: ReclaimQueue<BlasHandle>,

    arenas: [CommandPoolArena; QueueKind::COUNT],
    torn_down: AtomicBool,
}

impl ResourceRegistry {
    /// Create a registry over `driver`, publishing occupancy changes to
    /// `bindings`.
    pub fn new(
        driver: Arc<dyn DriverDevice>,
        bindings: Arc<dyn BindingTable>,
        desc: &RegistryDescriptor,
    ) -> Self {
        let limits = desc
            .limits
            .clone()
            .unwrap_or_else(|| driver.limits().into());
        log::info!(
            "resource registry{} initialized on {} ({} buffers / {} textures / {} samplers max)",
            desc.label
                .as_deref()
                .map(|l| format!(" '{l}'"))
                .unwrap_or_default(),
            driver.name(),
            limits.max_buffers,
            limits.max_textures,
            limits.max_samplers,
        );
        Self {
            driver,
            bindings,
            label: desc.label.clone(),
            timeline: SubmissionTimeline::new(),
            submission_lock: RwLock::new(()),
            buffers: SlotPool::new(limits.max_buffers),
            buffer_zombies: ReclaimQueue::new(),
            textures: SlotPool::new(limits.max_textures),
            texture_zombies: ReclaimQueue::new(),
            texture_views: SlotPool::new(limits.max_texture_views),
            texture_view_zombies: ReclaimQueue::new(),
            samplers: SlotPool::new(limits.max_samplers),
            sampler_zombies: ReclaimQueue::new(),
            tlas: SlotPool::new(limits.max_acceleration_structures),
            tlas_zombies: ReclaimQueue::new(),
            blas: SlotPool::new(limits.max_acceleration_structures),
            blas_zombies: ReclaimQueue::new(),
            arenas: std::array::from_fn(|_| CommandPoolArena::new()),
            torn_down: AtomicBool::new(false),
        }
    }

    /// Create a registry with driver-reported limits and no binding table.
    pub fn with_driver(driver: Arc<dyn DriverDevice>) -> Self {
        Self::new(
            driver,
            Arc::new(NoopBindingTable),
            &RegistryDescriptor::new(),
        )
    }

    /// The driver this registry manages resources for.
    pub fn driver(&self) -> &Arc<dyn DriverDevice> {
        &self.driver
    }

    /// Registry label, if set.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// The per-kind budgets this registry was built with.
    pub fn limits(&self) -> RegistryLimits {
        RegistryLimits {
            max_buffers: self.buffers.capacity(),
            max_textures: self.textures.capacity(),
            max_texture_views: self.texture_views.capacity(),
            max_samplers: self.samplers.capacity(),
            max_acceleration_structures: self.tlas.capacity(),
        }
    }

    // ------------------------------------------------------------------
    // Buffers
    // ------------------------------------------------------------------

    /// Create a buffer with its own memory.
    pub fn create_buffer(&self, desc: &BufferDescriptor) -> Result<BufferHandle, RegistryError> {
        let raw = self.driver.create_buffer(desc)?;
        self.install_buffer(BufferSlot {
            raw,
            label: desc.label.clone(),
            size: desc.size,
            usage: desc.usage,
            heap: None,
        })
    }

    /// Create a buffer placed into an externally owned heap at `offset`.
    /// The slot keeps a shared reference to the heap until reclamation.
    pub fn create_buffer_in_heap(
        &self,
        desc: &BufferDescriptor,
        heap: &Arc<MemoryHeap>,
        offset: u64,
    ) -> Result<BufferHandle, RegistryError> {
        let raw = self.driver.create_buffer_in_heap(desc, heap, offset)?;
        self.install_buffer(BufferSlot {
            raw,
            label: desc.label.clone(),
            size: desc.size,
            usage: desc.usage,
            heap: Some(Arc::clone(heap)),
        })
    }

    fn install_buffer(&self, slot: BufferSlot) -> Result<BufferHandle, RegistryError> {
        let handle = match self.buffers.try_create(slot) {
            Ok(handle) => handle,
            Err(CapacityError(slot)) => {
                if let Err(e) = self.driver.destroy_buffer(slot.raw) {
                    log::error!("failed to destroy buffer rejected by a full pool: {e}");
                }
                return Err(RegistryError::OutOfCapacity {
                    kind: ResourceKind::Buffer,
                    capacity: self.buffers.capacity(),
                });
            }
        };
        // SAFETY: just created; no other thread holds this handle yet, and
        // its slot cannot be reclaimed before this call returns.
        let slot = unsafe { self.buffers.get_unchecked(handle) };
        self.bindings.write_binding(BindingUpdate::Buffer {
            index: handle.index(),
            buffer: &slot.raw,
        });
        log::trace!("created {handle:?} ({} bytes)", slot.size);
        Ok(handle)
    }

    /// Whether `handle` refers to a live buffer. O(1), never blocks.
    pub fn is_buffer_valid(&self, handle: BufferHandle) -> bool {
        self.buffers.is_valid(handle)
    }

    /// Invalidate `handle` and queue the buffer's driver teardown for the
    /// next safe collection point.
    pub fn destroy_buffer(&self, handle: BufferHandle) -> Result<(), RegistryError> {
        self.destroy_common(&self.buffers, &self.buffer_zombies, handle)
    }

    /// Size in bytes of a live buffer.
    pub fn buffer_size(&self, handle: BufferHandle) -> Result<u64, RegistryError> {
        let _guard = self.submission_lock.read();
        self.buffers
            .get(handle)
            .map(|slot| slot.size)
            .ok_or(RegistryError::InvalidHandle(ResourceKind::Buffer))
    }

    /// Usage flags of a live buffer.
    pub fn buffer_usage(&self, handle: BufferHandle) -> Result<BufferUsage, RegistryError> {
        let _guard = self.submission_lock.read();
        self.buffers
            .get(handle)
            .map(|slot| slot.usage)
            .ok_or(RegistryError::InvalidHandle(ResourceKind::Buffer))
    }

    /// GPU device address of a live buffer, if it requested one.
    pub fn buffer_device_address(
        &self,
        handle: BufferHandle,
    ) -> Result<Option<u64>, RegistryError> {
        let _guard = self.submission_lock.read();
        self.buffers
            .get(handle)
            .map(|slot| slot.raw.device_address())
            .ok_or(RegistryError::InvalidHandle(ResourceKind::Buffer))
    }

    /// The external heap a live buffer was placed in, if any.
    pub fn buffer_heap(
        &self,
        handle: BufferHandle,
    ) -> Result<Option<Arc<MemoryHeap>>, RegistryError> {
        let _guard = self.submission_lock.read();
        self.buffers
            .get(handle)
            .map(|slot| slot.heap.clone())
            .ok_or(RegistryError::InvalidHandle(ResourceKind::Buffer))
    }

    // ------------------------------------------------------------------
    // Textures and views
    // ------------------------------------------------------------------

    /// Create a texture with its own memory.
    pub fn create_texture(&self, desc: &TextureDescriptor) -> Result<TextureHandle, RegistryError> {
        let raw = self.driver.create_texture(desc)?;
        self.install_texture(TextureSlot {
            raw,
            size: desc.approximate_size(),
            desc: desc.clone(),
            heap: None,
        })
    }

    /// Create a texture placed into an externally owned heap at `offset`.
    pub fn create_texture_in_heap(
        &self,
        desc: &TextureDescriptor,
        heap: &Arc<MemoryHeap>,
        offset: u64,
    ) -> Result<TextureHandle, RegistryError> {
        let raw = self.driver.create_texture_in_heap(desc, heap, offset)?;
        self.install_texture(TextureSlot {
            raw,
            size: desc.approximate_size(),
            desc: desc.clone(),
            heap: Some(Arc::clone(heap)),
        })
    }

    fn install_texture(&self, slot: TextureSlot) -> Result<TextureHandle, RegistryError> {
        let handle = match self.textures.try_create(slot) {
            Ok(handle) => handle,
            Err(CapacityError(slot)) => {
                if let Err(e) = self.driver.destroy_texture(slot.raw) {
                    log::error!("failed to destroy texture rejected by a full pool: {e}");
                }
                return Err(RegistryError::OutOfCapacity {
                    kind: ResourceKind::Texture,
                    capacity: self.textures.capacity(),
                });
            }
        };
        log::trace!("created {handle:?}");
        Ok(handle)
    }

    /// Whether `handle` refers to a live texture. O(1), never blocks.
    pub fn is_texture_valid(&self, handle: TextureHandle) -> bool {
        self.textures.is_valid(handle)
    }

    /// Invalidate `handle` and queue the texture's driver teardown.
    ///
    /// Views over the texture are not destroyed implicitly; destroying
    /// them stays the caller's responsibility, exactly like the driver
    /// object lifetime rules this layer wraps.
    pub fn destroy_texture(&self, handle: TextureHandle) -> Result<(), RegistryError> {
        self.destroy_common(&self.textures, &self.texture_zombies, handle)
    }

    /// Format of a live texture.
    pub fn texture_format(&self, handle: TextureHandle) -> Result<TextureFormat, RegistryError> {
        let _guard = self.submission_lock.read();
        self.textures
            .get(handle)
            .map(|slot| slot.desc.format)
            .ok_or(RegistryError::InvalidHandle(ResourceKind::Texture))
    }

    /// Extent of a live texture.
    pub fn texture_extent(&self, handle: TextureHandle) -> Result<Extent3d, RegistryError> {
        let _guard = self.submission_lock.read();
        self.textures
            .get(handle)
            .map(|slot| slot.desc.size)
            .ok_or(RegistryError::InvalidHandle(ResourceKind::Texture))
    }

    /// The external heap a live texture was placed in, if any.
    pub fn texture_heap(
        &self,
        handle: TextureHandle,
    ) -> Result<Option<Arc<MemoryHeap>>, RegistryError> {
        let _guard = self.submission_lock.read();
        self.textures
            .get(handle)
            .map(|slot| slot.heap.clone())
            .ok_or(RegistryError::InvalidHandle(ResourceKind::Texture))
    }

    /// Create a view over a live texture.
    pub fn create_texture_view(
        &self,
        texture: TextureHandle,
        desc: &TextureViewDescriptor,
    ) -> Result<TextureViewHandle, RegistryError> {
        let (raw, format) = {
            let _guard = self.submission_lock.read();
            let parent = self
                .textures
                .get(texture)
                .ok_or(RegistryError::InvalidHandle(ResourceKind::Texture))?;
            let raw = self
                .driver
                .create_texture_view(&parent.raw, &parent.desc, desc)?;
            (raw, desc.format.unwrap_or(parent.desc.format))
        };
        let slot = TextureViewSlot {
            raw,
            label: desc.label.clone(),
            texture,
            format,
        };
        let handle = match self.texture_views.try_create(slot) {
            Ok(handle) => handle,
            Err(CapacityError(slot)) => {
                if let Err(e) = self.driver.destroy_texture_view(slot.raw) {
                    log::error!("failed to destroy view rejected by a full pool: {e}");
                }
                return Err(RegistryError::OutOfCapacity {
                    kind: ResourceKind::TextureView,
                    capacity: self.texture_views.capacity(),
                });
            }
        };
        // SAFETY: just created; not yet visible to any other thread.
        let slot = unsafe { self.texture_views.get_unchecked(handle) };
        self.bindings.write_binding(BindingUpdate::TextureView {
            index: handle.index(),
            view: &slot.raw,
        });
        log::trace!("created {handle:?} over {texture:?}");
        Ok(handle)
    }

    /// Whether `handle` refers to a live texture view.
    pub fn is_texture_view_valid(&self, handle: TextureViewHandle) -> bool {
        self.texture_views.is_valid(handle)
    }

    /// Invalidate `handle` and queue the view's driver teardown.
    pub fn destroy_texture_view(&self, handle: TextureViewHandle) -> Result<(), RegistryError> {
        self.destroy_common(&self.texture_views, &self.texture_view_zombies, handle)
    }

    /// The texture a live view was created over (which may itself have
    /// been destroyed since).
    pub fn texture_view_texture(
        &self,
        handle: TextureViewHandle,
    ) -> Result<TextureHandle, RegistryError> {
        let _guard = self.submission_lock.read();
        self.texture_views
            .get(handle)
            .map(|slot| slot.texture)
            .ok_or(RegistryError::InvalidHandle(ResourceKind::TextureView))
    }

    /// Format of a live texture view (the parent's format unless the view
    /// overrode it).
    pub fn texture_view_format(
        &self,
        handle: TextureViewHandle,
    ) -> Result<TextureFormat, RegistryError> {
        let _guard = self.submission_lock.read();
        self.texture_views
            .get(handle)
            .map(|slot| slot.format)
            .ok_or(RegistryError::InvalidHandle(ResourceKind::TextureView))
    }

    // ------------------------------------------------------------------
    // Samplers
    // ------------------------------------------------------------------

    /// Create a sampler.
    pub fn create_sampler(&self, desc: &SamplerDescriptor) -> Result<SamplerHandle, RegistryError> {
        let raw = self.driver.create_sampler(desc)?;
        let slot = SamplerSlot {
            raw,
            label: desc.label.clone(),
        };
        let handle = match self.samplers.try_create(slot) {
            Ok(handle) => handle,
            Err(CapacityError(slot)) => {
                if let Err(e) = self.driver.destroy_sampler(slot.raw) {
                    log::error!("failed to destroy sampler rejected by a full pool: {e}");
                }
                return Err(RegistryError::OutOfCapacity {
                    kind: ResourceKind::Sampler,
                    capacity: self.samplers.capacity(),
                });
            }
        };
        // SAFETY: just created; not yet visible to any other thread.
        let slot = unsafe { self.samplers.get_unchecked(handle) };
        self.bindings.write_binding(BindingUpdate::Sampler {
            index: handle.index(),
            sampler: &slot.raw,
        });
        log::trace!("created {handle:?}");
        Ok(handle)
    }

    /// Whether `handle` refers to a live sampler.
    pub fn is_sampler_valid(&self, handle: SamplerHandle) -> bool {
        self.samplers.is_valid(handle)
    }

    /// Invalidate `handle` and queue the sampler's driver teardown.
    pub fn destroy_sampler(&self, handle: SamplerHandle) -> Result<(), RegistryError> {
        self.destroy_common(&self.samplers, &self.sampler_zombies, handle)
    }

    // ------------------------------------------------------------------
    // Acceleration structures
    // ------------------------------------------------------------------

    /// Create a top-level acceleration structure with a registry-owned
    /// backing buffer.
    pub fn create_tlas(
        &self,
        desc: &AccelerationStructureDescriptor,
    ) -> Result<TlasHandle, RegistryError> {
        self.create_accel(AccelerationStructureKind::TopLevel, desc, &self.tlas)
    }

    /// Create a bottom-level acceleration structure with a registry-owned
    /// backing buffer.
    pub fn create_blas(
        &self,
        desc: &AccelerationStructureDescriptor,
    ) -> Result<BlasHandle, RegistryError> {
        self.create_accel(AccelerationStructureKind::BottomLevel, desc, &self.blas)
    }

    fn create_accel<K: HandleKind>(
        &self,
        kind: AccelerationStructureKind,
        desc: &AccelerationStructureDescriptor,
        pool: &SlotPool<K, AccelSlot>,
    ) -> Result<Handle<K>, RegistryError> {
        let backing_desc = BufferDescriptor::new(
            desc.size,
            BufferUsage::ACCELERATION_STRUCTURE_STORAGE | BufferUsage::DEVICE_ADDRESS,
        )
        .with_label(match &desc.label {
            Some(label) => format!("{label} backing"),
            None => "acceleration structure backing".to_string(),
        });
        let backing = self.create_buffer(&backing_desc)?;

        let created = {
            let _guard = self.submission_lock.read();
            // SAFETY: `backing` was just created and is not visible to any
            // other thread; collection cannot reclaim it under the shared
            // lock.
            let raw_backing = unsafe { self.buffers.get_unchecked(backing) };
            self.driver
                .create_acceleration_structure(kind, desc, &raw_backing.raw)
        };
        let raw = match created {
            Ok(raw) => raw,
            Err(e) => {
                let _ = self.destroy_buffer(backing);
                return Err(e);
            }
        };

        let slot = AccelSlot {
            raw,
            label: desc.label.clone(),
            kind,
            backing,
            size: desc.size,
        };
        let handle = match pool.try_create(slot) {
            Ok(handle) => handle,
            Err(CapacityError(slot)) => {
                if let Err(e) = self.driver.destroy_acceleration_structure(kind, slot.raw) {
                    log::error!(
                        "failed to destroy {} rejected by a full pool: {e}",
                        K::KIND.name()
                    );
                }
                let _ = self.destroy_buffer(backing);
                return Err(RegistryError::OutOfCapacity {
                    kind: K::KIND,
                    capacity: pool.capacity(),
                });
            }
        };
        // SAFETY: just created; not yet visible to any other thread.
        let slot = unsafe { pool.get_unchecked(handle) };
        self.bindings
            .write_binding(BindingUpdate::AccelerationStructure {
                index: handle.index(),
                kind: K::KIND,
                accel: &slot.raw,
            });
        log::trace!("created {handle:?} backed by {backing:?}");
        Ok(handle)
    }

    /// Whether `handle` refers to a live TLAS.
    pub fn is_tlas_valid(&self, handle: TlasHandle) -> bool {
        self.tlas.is_valid(handle)
    }

    /// Whether `handle` refers to a live BLAS.
    pub fn is_blas_valid(&self, handle: BlasHandle) -> bool {
        self.blas.is_valid(handle)
    }

    /// Invalidate a TLAS and queue it for teardown, together with its
    /// backing buffer under the same timeline stamp.
    pub fn destroy_tlas(&self, handle: TlasHandle) -> Result<(), RegistryError> {
        self.destroy_accel(&self.tlas, &self.tlas_zombies, handle)
    }

    /// Invalidate a BLAS and queue it for teardown, together with its
    /// backing buffer under the same timeline stamp.
    pub fn destroy_blas(&self, handle: BlasHandle) -> Result<(), RegistryError> {
        self.destroy_accel(&self.blas, &self.blas_zombies, handle)
    }

    fn destroy_accel<K: HandleKind>(
        &self,
        pool: &SlotPool<K, AccelSlot>,
        zombies: &ReclaimQueue<Handle<K>>,
        handle: Handle<K>,
    ) -> Result<(), RegistryError> {
        let _guard = self.submission_lock.read();
        if !pool.try_mark_zombie(handle) {
            return Err(RegistryError::InvalidHandle(K::KIND));
        }
        let timestamp = self.timeline.current();
        // SAFETY: this thread won the zombie CAS; the payload stays in
        // place, readable only by us, until reclamation.
        let backing = unsafe { pool.zombie_payload(handle) }.backing;
        if self.buffers.try_mark_zombie(backing) {
            self.buffer_zombies.enqueue(timestamp, backing);
        } else {
            log::warn!("backing buffer {backing:?} of {handle:?} was already destroyed");
        }
        zombies.enqueue(timestamp, handle);
        Ok(())
    }

    /// GPU device address of a live TLAS.
    pub fn tlas_device_address(&self, handle: TlasHandle) -> Result<Option<u64>, RegistryError> {
        let _guard = self.submission_lock.read();
        self.tlas
            .get(handle)
            .map(|slot| slot.raw.device_address())
            .ok_or(RegistryError::InvalidHandle(ResourceKind::Tlas))
    }

    /// The registry-owned buffer backing a live BLAS.
    pub fn blas_backing(&self, handle: BlasHandle) -> Result<BufferHandle, RegistryError> {
        let _guard = self.submission_lock.read();
        self.blas
            .get(handle)
            .map(|slot| slot.backing)
            .ok_or(RegistryError::InvalidHandle(ResourceKind::Blas))
    }

    // ------------------------------------------------------------------
    // Shared destroy path
    // ------------------------------------------------------------------

    fn destroy_common<K: HandleKind, T>(
        &self,
        pool: &SlotPool<K, T>,
        zombies: &ReclaimQueue<Handle<K>>,
        handle: Handle<K>,
    ) -> Result<(), RegistryError> {
        // Shared: destroys race each other freely (the CAS picks one
        // winner) but are excluded from the submission point of no return.
        let _guard = self.submission_lock.read();
        if !pool.try_mark_zombie(handle) {
            return Err(RegistryError::InvalidHandle(K::KIND));
        }
        zombies.enqueue(self.timeline.current(), handle);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Submissions and collection
    // ------------------------------------------------------------------

    /// Record one submission on `queue` that references `references`.
    ///
    /// Validates that every referenced resource is still alive, then bumps
    /// the timeline in one exclusion region, so a destroy can never slip
    /// between the check and the publish. Returns the submission's
    /// timeline value; the external submitter must signal the queue's
    /// completion counter to exactly this value when the work retires.
    pub fn record_submission(
        &self,
        queue: QueueKind,
        references: &[AnyHandle],
    ) -> Result<u64, RegistryError> {
        let _guard = self.submission_lock.write();
        for reference in references {
            if !self.is_reference_valid(*reference) {
                return Err(RegistryError::InvalidHandle(reference.kind()));
            }
        }
        let value = self.timeline.record(queue);
        log::trace!(
            "submission {value} recorded on {} queue ({} references)",
            queue.name(),
            references.len()
        );
        Ok(value)
    }

    fn is_reference_valid(&self, reference: AnyHandle) -> bool {
        match reference {
            AnyHandle::Buffer(handle) => self.buffers.is_valid(handle),
            AnyHandle::Texture(handle) => self.textures.is_valid(handle),
            AnyHandle::TextureView(handle) => self.texture_views.is_valid(handle),
            AnyHandle::Sampler(handle) => self.samplers.is_valid(handle),
            AnyHandle::Tlas(handle) => self.tlas.is_valid(handle),
            AnyHandle::Blas(handle) => self.blas.is_valid(handle),
        }
    }

    /// The current global timeline value.
    pub fn timeline_value(&self) -> u64 {
        self.timeline.current()
    }

    /// Destroy every zombie whose stamp the watermark admits and recycle
    /// retired command units. Expected to run periodically (typically once
    /// per frame); the only place all resource kinds are visited together.
    pub fn collect_garbage(&self) -> Result<(), RegistryError> {
        // The completion query is a driver round-trip; keep it outside the
        // lock. A submission recorded afterwards only raises pending
        // values, so the watermark stays conservative.
        let watermark = self.timeline.watermark(self.driver.as_ref())?;

        let _guard = self.submission_lock.write();
        let mut reclaimed = 0;
        // Owners before owned: structures release their backing buffers.
        reclaimed += self
            .tlas_zombies
            .collect(watermark, |handle| self.reclaim_accel(&self.tlas, handle));
        reclaimed += self
            .blas_zombies
            .collect(watermark, |handle| self.reclaim_accel(&self.blas, handle));
        reclaimed += self.texture_view_zombies.collect(watermark, |handle| {
            self.reclaim_texture_view(handle)
        });
        reclaimed += self
            .texture_zombies
            .collect(watermark, |handle| self.reclaim_texture(handle));
        reclaimed += self
            .buffer_zombies
            .collect(watermark, |handle| self.reclaim_buffer(handle));
        reclaimed += self
            .sampler_zombies
            .collect(watermark, |handle| self.reclaim_sampler(handle));
        for (queue, arena) in QueueKind::ALL.iter().zip(&self.arenas) {
            let recycled = arena.collect(watermark, self.driver.as_ref());
            if recycled > 0 {
                log::trace!("{recycled} command units recycled on {} queue", queue.name());
            }
        }
        if reclaimed > 0 {
            log::debug!("collect_garbage reclaimed {reclaimed} resources at {watermark:?}");
        }
        Ok(())
    }

    fn reclaim_buffer(&self, handle: BufferHandle) {
        self.bindings
            .clear_binding(ResourceKind::Buffer, handle.index());
        // SAFETY: only zombied handles are enqueued, and the caller holds
        // the exclusive lock, so no reference into the slot is live.
        let slot = unsafe { self.buffers.reclaim_zombie(handle) };
        if let Err(e) = self.driver.destroy_buffer(slot.raw) {
            log::error!("driver failed to destroy {handle:?} ({:?}): {e}", slot.label);
            debug_assert!(false, "buffer destruction failed");
        }
        // A heap back-reference, if any, is released with the slot here.
    }

    fn reclaim_texture(&self, handle: TextureHandle) {
        self.bindings
            .clear_binding(ResourceKind::Texture, handle.index());
        // SAFETY: as in reclaim_buffer.
        let slot = unsafe { self.textures.reclaim_zombie(handle) };
        if let Err(e) = self.driver.destroy_texture(slot.raw) {
            log::error!(
                "driver failed to destroy {handle:?} ({:?}): {e}",
                slot.desc.label
            );
            debug_assert!(false, "texture destruction failed");
        }
    }

    fn reclaim_texture_view(&self, handle: TextureViewHandle) {
        self.bindings
            .clear_binding(ResourceKind::TextureView, handle.index());
        // SAFETY: as in reclaim_buffer.
        let slot = unsafe { self.texture_views.reclaim_zombie(handle) };
        if let Err(e) = self.driver.destroy_texture_view(slot.raw) {
            log::error!("driver failed to destroy {handle:?} ({:?}): {e}", slot.label);
            debug_assert!(false, "texture view destruction failed");
        }
    }

    fn reclaim_sampler(&self, handle: SamplerHandle) {
        self.bindings
            .clear_binding(ResourceKind::Sampler, handle.index());
        // SAFETY: as in reclaim_buffer.
        let slot = unsafe { self.samplers.reclaim_zombie(handle) };
        if let Err(e) = self.driver.destroy_sampler(slot.raw) {
            log::error!("driver failed to destroy {handle:?} ({:?}): {e}", slot.label);
            debug_assert!(false, "sampler destruction failed");
        }
    }

    fn reclaim_accel<K: HandleKind>(&self, pool: &SlotPool<K, AccelSlot>, handle: Handle<K>) {
        self.bindings.clear_binding(K::KIND, handle.index());
        // SAFETY: as in reclaim_buffer.
        let slot = unsafe { pool.reclaim_zombie(handle) };
        if let Err(e) = self
            .driver
            .destroy_acceleration_structure(slot.kind, slot.raw)
        {
            log::error!("driver failed to destroy {handle:?} ({:?}): {e}", slot.label);
            debug_assert!(false, "acceleration structure destruction failed");
        }
    }

    // ------------------------------------------------------------------
    // Command pool arenas
    // ------------------------------------------------------------------

    /// Acquire a command unit for `queue`, reusing a recycled one when
    /// available.
    pub fn acquire_command_pool(&self, queue: QueueKind) -> Result<CommandUnit, RegistryError> {
        let family = self.driver.queue_family_index(queue);
        self.arenas[queue.index()].acquire(self.driver.as_ref(), family)
    }

    /// Return a command unit, keyed on the submission that last used it.
    /// It becomes reusable once that submission retires.
    pub fn retire_command_pool(&self, queue: QueueKind, unit: CommandUnit, last_submission: u64) {
        debug_assert_eq!(unit.family(), self.driver.queue_family_index(queue));
        self.arenas[queue.index()].retire(unit, last_submission);
    }

    // ------------------------------------------------------------------
    // Diagnostics and teardown
    // ------------------------------------------------------------------

    /// Snapshot every live resource with its label and backing size,
    /// zombies skipped. Runs under the submission exclusion, so call it at
    /// the same cadence as [`collect_garbage`](Self::collect_garbage), not
    /// from hot paths.
    pub fn memory_report(&self) -> MemoryReport {
        let _guard = self.submission_lock.write();
        let mut entries = Vec::new();
        self.buffers.for_each_live(|handle, slot| {
            entries.push(ResourceReportEntry {
                kind: ResourceKind::Buffer,
                index: handle.index(),
                generation: handle.generation(),
                label: slot.label.clone(),
                size: slot.size,
            });
        });
        self.textures.for_each_live(|handle, slot| {
            entries.push(ResourceReportEntry {
                kind: ResourceKind::Texture,
                index: handle.index(),
                generation: handle.generation(),
                label: slot.desc.label.clone(),
                size: slot.size,
            });
        });
        self.texture_views.for_each_live(|handle, slot| {
            entries.push(ResourceReportEntry {
                kind: ResourceKind::TextureView,
                index: handle.index(),
                generation: handle.generation(),
                label: slot.label.clone(),
                size: 0,
            });
        });
        self.samplers.for_each_live(|handle, slot| {
            entries.push(ResourceReportEntry {
                kind: ResourceKind::Sampler,
                index: handle.index(),
                generation: handle.generation(),
                label: slot.label.clone(),
                size: 0,
            });
        });
        self.tlas.for_each_live(|handle, slot| {
            entries.push(ResourceReportEntry {
                kind: ResourceKind::Tlas,
                index: handle.index(),
                generation: handle.generation(),
                label: slot.label.clone(),
                size: slot.size,
            });
        });
        self.blas.for_each_live(|handle, slot| {
            entries.push(ResourceReportEntry {
                kind: ResourceKind::Blas,
                index: handle.index(),
                generation: handle.generation(),
                label: slot.label.clone(),
                size: slot.size,
            });
        });
        MemoryReport { entries }
    }

    fn drain_everything(&self) {
        self.tlas_zombies
            .drain_all(|handle| self.reclaim_accel(&self.tlas, handle));
        self.blas_zombies
            .drain_all(|handle| self.reclaim_accel(&self.blas, handle));
        self.texture_view_zombies
            .drain_all(|handle| self.reclaim_texture_view(handle));
        self.texture_zombies
            .drain_all(|handle| self.reclaim_texture(handle));
        self.buffer_zombies
            .drain_all(|handle| self.reclaim_buffer(handle));
        self.sampler_zombies
            .drain_all(|handle| self.reclaim_sampler(handle));
        for arena in &self.arenas {
            arena.drain(self.driver.as_ref());
        }
    }

    fn collect_leaks(&self) -> Vec<String> {
        fn leak_name<K: HandleKind>(handle: Handle<K>, label: Option<&str>) -> String {
            match label {
                Some(label) => format!("{} '{label}' ({handle:?})", K::KIND.name()),
                None => format!("{} ({handle:?})", K::KIND.name()),
            }
        }

        let mut leaks = Vec::new();
        self.buffers
            .for_each_live(|handle, slot| leaks.push(leak_name(handle, slot.label.as_deref())));
        self.textures.for_each_live(|handle, slot| {
            leaks.push(leak_name(handle, slot.desc.label.as_deref()))
        });
        self.texture_views
            .for_each_live(|handle, slot| leaks.push(leak_name(handle, slot.label.as_deref())));
        self.samplers
            .for_each_live(|handle, slot| leaks.push(leak_name(handle, slot.label.as_deref())));
        self.tlas
            .for_each_live(|handle, slot| leaks.push(leak_name(handle, slot.label.as_deref())));
        self.blas
            .for_each_live(|handle, slot| leaks.push(leak_name(handle, slot.label.as_deref())));
        leaks
    }

    /// Tear the registry down explicitly: wait for the device, drain every
    /// pending destruction, and fail if anything is still live.
    ///
    /// Dropping the registry performs the same teardown with the leak
    /// check downgraded to an error log plus a debug assertion.
    pub fn shutdown(&self) -> Result<(), RegistryError> {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let _guard = self.submission_lock.write();
        self.driver.wait_idle()?;
        self.drain_everything();
        let leaks = self.collect_leaks();
        if leaks.is_empty() {
            Ok(())
        } else {
            for leak in &leaks {
                log::error!("leaked at registry teardown: {leak}");
            }
            Err(RegistryError::LeakedResources(leaks))
        }
    }
}

impl Drop for ResourceRegistry {
    fn drop(&mut self) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.driver.wait_idle() {
            log::error!("device wait failed during registry teardown: {e}");
        }
        self.drain_everything();
        let leaks = self.collect_leaks();
        for leak in &leaks {
            log::error!("leaked at registry teardown: {leak}");
        }
        debug_assert!(
            leaks.is_empty(),
            "{} resources leaked at registry teardown",
            leaks.len()
        );
    }
}

static_assertions::assert_impl_all!(ResourceRegistry: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::NullDriver;

    fn registry_with_limits(limits: RegistryLimits) -> ResourceRegistry {
        ResourceRegistry::new(
            Arc::new(NullDriver::new()),
            Arc::new(NoopBindingTable),
            &RegistryDescriptor::new().with_limits(limits),
        )
    }

    fn small_limits() -> RegistryLimits {
        RegistryLimits {
            max_buffers: 8,
            max_textures: 8,
            max_texture_views: 8,
            max_samplers: 8,
            max_acceleration_structures: 8,
        }
    }

    #[test]
    fn test_create_validate_destroy_buffer() {
        let registry = registry_with_limits(small_limits());
        let handle = registry
            .create_buffer(&BufferDescriptor::new(64, BufferUsage::STORAGE))
            .unwrap();
        assert!(registry.is_buffer_valid(handle));
        assert_eq!(registry.buffer_size(handle).unwrap(), 64);

        registry.destroy_buffer(handle).unwrap();
        assert!(!registry.is_buffer_valid(handle));
        assert_eq!(
            registry.destroy_buffer(handle),
            Err(RegistryError::InvalidHandle(ResourceKind::Buffer))
        );
        registry.collect_garbage().unwrap();
    }

    #[test]
    fn test_submission_referencing_stale_handle_fails() {
        let registry = registry_with_limits(small_limits());
        let buffer = registry
            .create_buffer(&BufferDescriptor::new(16, BufferUsage::UNIFORM))
            .unwrap();
        registry.destroy_buffer(buffer).unwrap();

        let err = registry
            .record_submission(QueueKind::Graphics, &[buffer.into()])
            .unwrap_err();
        assert_eq!(err, RegistryError::InvalidHandle(ResourceKind::Buffer));
    }

    #[test]
    fn test_tlas_owns_backing_buffer() {
        let registry = registry_with_limits(small_limits());
        let tlas = registry
            .create_tlas(&AccelerationStructureDescriptor::new(256).with_label("scene"))
            .unwrap();
        assert!(registry.is_tlas_valid(tlas));
        // One backing buffer came along.
        assert_eq!(registry.memory_report().count_of(ResourceKind::Buffer), 1);

        registry.destroy_tlas(tlas).unwrap();
        registry.collect_garbage().unwrap();
        assert_eq!(registry.memory_report().count_of(ResourceKind::Buffer), 0);
    }

    #[test]
    fn test_memory_report_skips_zombies() {
        let registry = registry_with_limits(small_limits());
        let live = registry
            .create_buffer(&BufferDescriptor::new(32, BufferUsage::VERTEX).with_label("live"))
            .unwrap();
        let dead = registry
            .create_buffer(&BufferDescriptor::new(32, BufferUsage::VERTEX).with_label("dead"))
            .unwrap();
        // Keep the zombie pinned in its queue behind in-flight work.
        registry
            .record_submission(QueueKind::Graphics, &[live.into(), dead.into()])
            .unwrap();
        registry.destroy_buffer(dead).unwrap();

        let report = registry.memory_report();
        assert_eq!(report.count_of(ResourceKind::Buffer), 1);
        assert_eq!(report.entries[0].label.as_deref(), Some("live"));

        registry.destroy_buffer(live).unwrap();
        registry
            .driver()
            .signal_completed(QueueKind::Graphics, 1)
            .unwrap();
        registry.collect_garbage().unwrap();
    }

    #[test]
    fn test_shutdown_reports_leaks_by_name() {
        let registry = registry_with_limits(small_limits());
        let _leaked = registry
            .create_buffer(&BufferDescriptor::new(16, BufferUsage::INDEX).with_label("oops"))
            .unwrap();
        let err = registry.shutdown().unwrap_err();
        match err {
            RegistryError::LeakedResources(names) => {
                assert_eq!(names.len(), 1);
                assert!(names[0].contains("oops"));
            }
            other => panic!("expected leak report, got {other}"),
        }
    }

    #[test]
    fn test_clean_shutdown() {
        let registry = registry_with_limits(small_limits());
        let buffer = registry
            .create_buffer(&BufferDescriptor::new(16, BufferUsage::INDEX))
            .unwrap();
        registry.destroy_buffer(buffer).unwrap();
        // Shutdown drains pending zombies without a collect_garbage call.
        registry.shutdown().unwrap();
    }
}
