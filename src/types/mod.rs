//! Plain-data types shared across the registry: descriptors, usage flags,
//! and the small geometry helpers they need.

mod accel;
mod buffer;
mod sampler;
mod texture;

pub use accel::{AccelerationStructureDescriptor, AccelerationStructureKind};
pub use buffer::{BufferDescriptor, BufferUsage};
pub use sampler::{AddressMode, CompareFunction, FilterMode, SamplerDescriptor};
pub use texture::{
    TextureAspect, TextureDescriptor, TextureDimension, TextureFormat, TextureUsage,
    TextureViewDescriptor,
};

/// 3D extent of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extent3d {
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Depth in texels, or array layer count for array textures.
    pub depth: u32,
}

impl Extent3d {
    /// Create a 2D extent with depth 1.
    pub fn new_2d(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            depth: 1,
        }
    }
}

impl Default for Extent3d {
    fn default() -> Self {
        Self {
            width: 1,
            height: 1,
            depth: 1,
        }
    }
}
