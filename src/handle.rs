//! Typed resource handles.
//!
//! A handle is an opaque `(index, generation)` pair identifying a slot in
//! one of the registry's pools. Handles are plain values: copied freely,
//! never mutated, compared by field equality. The type parameter ties a
//! handle to its resource kind so a buffer handle cannot be passed where a
//! texture handle is expected.
//!
//! Generation zero is reserved for "slot never allocated", and the high bit
//! of the generation field is reserved as the zombie tag a slot carries
//! between its destroy call and the actual driver teardown. Handles handed
//! out by the pools therefore always have a non-zero generation with the
//! zombie bit clear.

use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

/// High bit of a slot's stored generation: set while the slot is a zombie
/// (invalidated, awaiting reclamation).
pub const ZOMBIE_BIT: u64 = 1 << 63;

/// Largest generation a live handle can carry. A slot whose generation
/// saturates here is permanently retired rather than recycled.
pub const GENERATION_MAX: u64 = ZOMBIE_BIT - 1;

/// The resource kinds managed by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// GPU buffer.
    Buffer,
    /// GPU image.
    Texture,
    /// View over a texture's subresources.
    TextureView,
    /// Sampler state object.
    Sampler,
    /// Top-level acceleration structure.
    Tlas,
    /// Bottom-level acceleration structure.
    Blas,
}

impl ResourceKind {
    /// All kinds, in pool order.
    pub const ALL: [ResourceKind; 6] = [
        ResourceKind::Buffer,
        ResourceKind::Texture,
        ResourceKind::TextureView,
        ResourceKind::Sampler,
        ResourceKind::Tlas,
        ResourceKind::Blas,
    ];

    /// Human-readable kind name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Buffer => "buffer",
            Self::Texture => "texture",
            Self::TextureView => "texture view",
            Self::Sampler => "sampler",
            Self::Tlas => "TLAS",
            Self::Blas => "BLAS",
        }
    }

    /// Dense index, usable for per-kind counter arrays.
    pub fn index(&self) -> usize {
        match self {
            Self::Buffer => 0,
            Self::Texture => 1,
            Self::TextureView => 2,
            Self::Sampler => 3,
            Self::Tlas => 4,
            Self::Blas => 5,
        }
    }
}

/// Marker trait tying a handle type to its resource kind.
pub trait HandleKind: Copy + Clone + PartialEq + Eq + Hash + fmt::Debug + 'static {
    /// The kind of resource this marker stands for.
    const KIND: ResourceKind;
}

/// Buffer handle marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferKind;
/// Texture handle marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureKind;
/// Texture view handle marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureViewKind;
/// Sampler handle marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerKind;
/// Top-level acceleration structure handle marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TlasKind;
/// Bottom-level acceleration structure handle marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlasKind;

impl HandleKind for BufferKind {
    const KIND: ResourceKind = ResourceKind::Buffer;
}
impl HandleKind for TextureKind {
    const KIND: ResourceKind = ResourceKind::Texture;
}
impl HandleKind for TextureViewKind {
    const KIND: ResourceKind = ResourceKind::TextureView;
}
impl HandleKind for SamplerKind {
    const KIND: ResourceKind = ResourceKind::Sampler;
}
impl HandleKind for TlasKind {
    const KIND: ResourceKind = ResourceKind::Tlas;
}
impl HandleKind for BlasKind {
    const KIND: ResourceKind = ResourceKind::Blas;
}

/// Opaque handle to a registry resource.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle<K: HandleKind> {
    index: u32,
    generation: u64,
    _kind: PhantomData<K>,
}

impl<K: HandleKind> Handle<K> {
    /// A handle that never validates, for default-initialized storage.
    pub const INVALID: Self = Self {
        index: u32::MAX,
        generation: 0,
        _kind: PhantomData,
    };

    /// Mint a handle. Only pools create handles; the invariants (non-zero
    /// generation, zombie bit clear) are theirs to uphold.
    pub(crate) fn new(index: u32, generation: u64) -> Self {
        debug_assert!(generation != 0, "handle generation must be non-zero");
        debug_assert!(
            generation & ZOMBIE_BIT == 0,
            "issued handles never carry the zombie tag"
        );
        Self {
            index,
            generation,
            _kind: PhantomData,
        }
    }

    /// Slot index within the kind's pool.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Generation the slot had when this handle was issued.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The resource kind this handle addresses.
    pub fn kind(&self) -> ResourceKind {
        K::KIND
    }
}

impl<K: HandleKind> Default for Handle<K> {
    fn default() -> Self {
        Self::INVALID
    }
}

impl<K: HandleKind> fmt::Debug for Handle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}", K::KIND.name(), self.index, self.generation)
    }
}

/// Handle to a GPU buffer.
pub type BufferHandle = Handle<BufferKind>;
/// Handle to a GPU texture.
pub type TextureHandle = Handle<TextureKind>;
/// Handle to a texture view.
pub type TextureViewHandle = Handle<TextureViewKind>;
/// Handle to a sampler.
pub type SamplerHandle = Handle<SamplerKind>;
/// Handle to a top-level acceleration structure.
pub type TlasHandle = Handle<TlasKind>;
/// Handle to a bottom-level acceleration structure.
pub type BlasHandle = Handle<BlasKind>;

/// A handle of any resource kind, for heterogeneous reference lists
/// (e.g. the resources touched by one submission).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnyHandle {
    /// A buffer reference.
    Buffer(BufferHandle),
    /// A texture reference.
    Texture(TextureHandle),
    /// A texture view reference.
    TextureView(TextureViewHandle),
    /// A sampler reference.
    Sampler(SamplerHandle),
    /// A TLAS reference.
    Tlas(TlasHandle),
    /// A BLAS reference.
    Blas(BlasHandle),
}

impl AnyHandle {
    /// The kind of the wrapped handle.
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Buffer(_) => ResourceKind::Buffer,
            Self::Texture(_) => ResourceKind::Texture,
            Self::TextureView(_) => ResourceKind::TextureView,
            Self::Sampler(_) => ResourceKind::Sampler,
            Self::Tlas(_) => ResourceKind::Tlas,
            Self::Blas(_) => ResourceKind::Blas,
        }
    }
}

impl From<BufferHandle> for AnyHandle {
    fn from(handle: BufferHandle) -> Self {
        Self::Buffer(handle)
    }
}
impl From<TextureHandle> for AnyHandle {
    fn from(handle: TextureHandle) -> Self {
        Self::Texture(handle)
    }
}
impl From<TextureViewHandle> for AnyHandle {
    fn from(handle: TextureViewHandle) -> Self {
        Self::TextureView(handle)
    }
}
impl From<SamplerHandle> for AnyHandle {
    fn from(handle: SamplerHandle) -> Self {
        Self::Sampler(handle)
    }
}
impl From<TlasHandle> for AnyHandle {
    fn from(handle: TlasHandle) -> Self {
        Self::Tlas(handle)
    }
}
impl From<BlasHandle> for AnyHandle {
    fn from(handle: BlasHandle) -> Self {
        Self::Blas(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_equality() {
        let a = BufferHandle::new(3, 7);
        let b = BufferHandle::new(3, 7);
        let c = BufferHandle::new(3, 8);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_invalid_handle() {
        let h = TextureHandle::INVALID;
        assert_eq!(h.generation(), 0);
        assert_eq!(h, TextureHandle::default());
    }

    #[test]
    fn test_handle_debug() {
        let h = SamplerHandle::new(12, 4);
        assert_eq!(format!("{:?}", h), "sampler:12@4");
    }

    #[test]
    fn test_zombie_bit_disjoint_from_generation_max() {
        assert_eq!(GENERATION_MAX & ZOMBIE_BIT, 0);
        assert_eq!(GENERATION_MAX | ZOMBIE_BIT, u64::MAX);
    }

    #[test]
    fn test_any_handle_kind() {
        let h: AnyHandle = BufferHandle::new(0, 1).into();
        assert_eq!(h.kind(), ResourceKind::Buffer);
        let h: AnyHandle = TlasHandle::new(0, 1).into();
        assert_eq!(h.kind(), ResourceKind::Tlas);
    }
}
