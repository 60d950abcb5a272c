//! Texture types and descriptors.

use bitflags::bitflags;

use super::Extent3d;

/// Texture format enumeration.
///
/// A deliberately small set; formats translate 1:1 to the driver layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum TextureFormat {
    /// 8-bit red channel, unsigned normalized.
    R8Unorm,
    /// 16-bit red channel, float.
    R16Float,
    /// 32-bit red channel, float.
    R32Float,
    /// 32-bit red channel, unsigned integer.
    R32Uint,
    /// 8-bit RG channels, unsigned normalized.
    Rg8Unorm,
    /// 16-bit RG channels, float.
    Rg16Float,
    /// 8-bit RGBA channels, unsigned normalized.
    #[default]
    Rgba8Unorm,
    /// 8-bit RGBA channels, sRGB.
    Rgba8UnormSrgb,
    /// 8-bit BGRA channels, unsigned normalized.
    Bgra8Unorm,
    /// 16-bit RGBA channels, float.
    Rgba16Float,
    /// 32-bit RGBA channels, float.
    Rgba32Float,
    /// 16-bit depth.
    Depth16Unorm,
    /// 24-bit depth with 8-bit stencil.
    Depth24PlusStencil8,
    /// 32-bit depth, float.
    Depth32Float,
}

impl TextureFormat {
    /// Returns true if this is a depth or stencil format.
    pub fn is_depth_stencil(&self) -> bool {
        matches!(
            self,
            Self::Depth16Unorm | Self::Depth24PlusStencil8 | Self::Depth32Float
        )
    }

    /// Returns true if this format has a stencil component.
    pub fn has_stencil(&self) -> bool {
        matches!(self, Self::Depth24PlusStencil8)
    }

    /// The image aspect views of this format cover by default.
    pub fn aspect(&self) -> TextureAspect {
        if self.has_stencil() {
            TextureAspect::DepthStencil
        } else if self.is_depth_stencil() {
            TextureAspect::Depth
        } else {
            TextureAspect::Color
        }
    }

    /// Size in bytes per texel.
    pub fn block_size(&self) -> u32 {
        match self {
            Self::R8Unorm => 1,
            Self::R16Float | Self::Rg8Unorm | Self::Depth16Unorm => 2,
            Self::R32Float
            | Self::R32Uint
            | Self::Rg16Float
            | Self::Rgba8Unorm
            | Self::Rgba8UnormSrgb
            | Self::Bgra8Unorm
            | Self::Depth24PlusStencil8
            | Self::Depth32Float => 4,
            Self::Rgba16Float => 8,
            Self::Rgba32Float => 16,
        }
    }
}

/// Image aspect covered by a texture or view, derived from the format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureAspect {
    /// Color data.
    Color,
    /// Depth only.
    Depth,
    /// Combined depth and stencil.
    DepthStencil,
}

/// Texture dimensionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureDimension {
    /// One-dimensional texture.
    D1,
    /// Two-dimensional texture.
    #[default]
    D2,
    /// Two-dimensional array texture; `Extent3d::depth` is the layer count.
    D2Array,
    /// Three-dimensional texture.
    D3,
    /// Cube texture (six layers).
    Cube,
}

bitflags! {
    /// Usage flags for textures.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        /// Texture can be copied from.
        const COPY_SRC = 1 << 0;
        /// Texture can be copied to.
        const COPY_DST = 1 << 1;
        /// Texture can be sampled in a shader.
        const TEXTURE_BINDING = 1 << 2;
        /// Texture can be used as a storage texture.
        const STORAGE_BINDING = 1 << 3;
        /// Texture can be used as a render attachment.
        const RENDER_ATTACHMENT = 1 << 4;
    }
}

impl Default for TextureUsage {
    fn default() -> Self {
        Self::empty()
    }
}

/// Descriptor for creating a texture.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureDescriptor {
    /// Debug label for the texture.
    pub label: Option<String>,
    /// Size of the texture.
    pub size: Extent3d,
    /// Mip level count.
    pub mip_level_count: u32,
    /// Sample count for multisampling.
    pub sample_count: u32,
    /// Dimensionality.
    pub dimension: TextureDimension,
    /// Texel format.
    pub format: TextureFormat,
    /// Usage flags.
    pub usage: TextureUsage,
}

impl TextureDescriptor {
    /// Create a 2D texture descriptor.
    pub fn new_2d(width: u32, height: u32, format: TextureFormat, usage: TextureUsage) -> Self {
        Self {
            label: None,
            size: Extent3d::new_2d(width, height),
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format,
            usage,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the mip level count.
    pub fn with_mip_levels(mut self, count: u32) -> Self {
        self.mip_level_count = count;
        self
    }

    /// Approximate backing size in bytes, for diagnostics.
    pub fn approximate_size(&self) -> u64 {
        let mut total = 0u64;
        let mut width = self.size.width.max(1) as u64;
        let mut height = self.size.height.max(1) as u64;
        let depth = self.size.depth.max(1) as u64;
        for _ in 0..self.mip_level_count.max(1) {
            total += width * height * depth * u64::from(self.format.block_size());
            width = (width / 2).max(1);
            height = (height / 2).max(1);
        }
        total * u64::from(self.sample_count.max(1))
    }
}

/// Descriptor for creating a view over a texture.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct TextureViewDescriptor {
    /// Debug label for the view.
    pub label: Option<String>,
    /// Override format; `None` inherits the texture's format.
    pub format: Option<TextureFormat>,
    /// First mip level covered by the view.
    pub base_mip_level: u32,
    /// Mip level count; `None` covers the rest of the chain.
    pub mip_level_count: Option<u32>,
    /// First array layer covered by the view.
    pub base_array_layer: u32,
    /// Array layer count; `None` covers the remaining layers.
    pub array_layer_count: Option<u32>,
}

impl TextureViewDescriptor {
    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}
