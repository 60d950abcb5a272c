//! Type conversions between registry types and Vulkan types.

use ash::vk;

use crate::types::{
    AccelerationStructureKind, AddressMode, BufferUsage, CompareFunction, Extent3d, FilterMode,
    TextureDimension, TextureFormat, TextureUsage,
};

/// Convert BufferUsage flags to Vulkan buffer usage flags.
pub fn convert_buffer_usage(usage: BufferUsage) -> vk::BufferUsageFlags {
    let mut result = vk::BufferUsageFlags::empty();

    if usage.contains(BufferUsage::VERTEX) {
        result |= vk::BufferUsageFlags::VERTEX_BUFFER;
    }
    if usage.contains(BufferUsage::INDEX) {
        result |= vk::BufferUsageFlags::INDEX_BUFFER;
    }
    if usage.contains(BufferUsage::UNIFORM) {
        result |= vk::BufferUsageFlags::UNIFORM_BUFFER;
    }
    if usage.contains(BufferUsage::STORAGE) {
        result |= vk::BufferUsageFlags::STORAGE_BUFFER;
    }
    if usage.contains(BufferUsage::INDIRECT) {
        result |= vk::BufferUsageFlags::INDIRECT_BUFFER;
    }
    if usage.contains(BufferUsage::COPY_SRC) {
        result |= vk::BufferUsageFlags::TRANSFER_SRC;
    }
    if usage.contains(BufferUsage::COPY_DST) {
        result |= vk::BufferUsageFlags::TRANSFER_DST;
    }
    if usage.contains(BufferUsage::DEVICE_ADDRESS) {
        result |= vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS;
    }
    if usage.contains(BufferUsage::ACCELERATION_STRUCTURE_STORAGE) {
        result |= vk::BufferUsageFlags::ACCELERATION_STRUCTURE_STORAGE_KHR;
    }

    // MAP_READ and MAP_WRITE affect the memory location, not the usage.

    result
}

/// Convert TextureFormat to Vulkan format.
pub fn convert_texture_format(format: TextureFormat) -> vk::Format {
    match format {
        TextureFormat::R8Unorm => vk::Format::R8_UNORM,
        TextureFormat::R16Float => vk::Format::R16_SFLOAT,
        TextureFormat::R32Float => vk::Format::R32_SFLOAT,
        TextureFormat::R32Uint => vk::Format::R32_UINT,
        TextureFormat::Rg8Unorm => vk::Format::R8G8_UNORM,
        TextureFormat::Rg16Float => vk::Format::R16G16_SFLOAT,
        TextureFormat::Rgba8Unorm => vk::Format::R8G8B8A8_UNORM,
        TextureFormat::Rgba8UnormSrgb => vk::Format::R8G8B8A8_SRGB,
        TextureFormat::Bgra8Unorm => vk::Format::B8G8R8A8_UNORM,
        TextureFormat::Rgba16Float => vk::Format::R16G16B16A16_SFLOAT,
        TextureFormat::Rgba32Float => vk::Format::R32G32B32A32_SFLOAT,
        TextureFormat::Depth16Unorm => vk::Format::D16_UNORM,
        TextureFormat::Depth24PlusStencil8 => vk::Format::D24_UNORM_S8_UINT,
        TextureFormat::Depth32Float => vk::Format::D32_SFLOAT,
    }
}

/// Convert TextureUsage flags to Vulkan image usage flags.
///
/// The format decides whether RENDER_ATTACHMENT maps to a color or a
/// depth/stencil attachment.
pub fn convert_texture_usage(usage: TextureUsage, format: TextureFormat) -> vk::ImageUsageFlags {
    let mut result = vk::ImageUsageFlags::empty();

    if usage.contains(TextureUsage::COPY_SRC) {
        result |= vk::ImageUsageFlags::TRANSFER_SRC;
    }
    if usage.contains(TextureUsage::COPY_DST) {
        result |= vk::ImageUsageFlags::TRANSFER_DST;
    }
    if usage.contains(TextureUsage::TEXTURE_BINDING) {
        result |= vk::ImageUsageFlags::SAMPLED;
    }
    if usage.contains(TextureUsage::STORAGE_BINDING) {
        result |= vk::ImageUsageFlags::STORAGE;
    }
    if usage.contains(TextureUsage::RENDER_ATTACHMENT) {
        if format.is_depth_stencil() {
            result |= vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT;
        } else {
            result |= vk::ImageUsageFlags::COLOR_ATTACHMENT;
        }
    }

    result
}

/// Image aspect flags a format's views cover.
pub fn convert_aspect_mask(format: TextureFormat) -> vk::ImageAspectFlags {
    if format.is_depth_stencil() {
        if format.has_stencil() {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        } else {
            vk::ImageAspectFlags::DEPTH
        }
    } else {
        vk::ImageAspectFlags::COLOR
    }
}

/// Image type, array layer count, extent, and create flags for a
/// dimension.
pub fn convert_dimension(
    dimension: TextureDimension,
    size: Extent3d,
) -> (vk::ImageType, u32, vk::Extent3D, vk::ImageCreateFlags) {
    match dimension {
        TextureDimension::D1 => (
            vk::ImageType::TYPE_1D,
            1,
            vk::Extent3D {
                width: size.width,
                height: 1,
                depth: 1,
            },
            vk::ImageCreateFlags::empty(),
        ),
        TextureDimension::D2 => (
            vk::ImageType::TYPE_2D,
            1,
            vk::Extent3D {
                width: size.width,
                height: size.height,
                depth: 1,
            },
            vk::ImageCreateFlags::empty(),
        ),
        TextureDimension::D2Array => (
            vk::ImageType::TYPE_2D,
            size.depth.max(1),
            vk::Extent3D {
                width: size.width,
                height: size.height,
                depth: 1,
            },
            vk::ImageCreateFlags::empty(),
        ),
        TextureDimension::D3 => (
            vk::ImageType::TYPE_3D,
            1,
            vk::Extent3D {
                width: size.width,
                height: size.height,
                depth: size.depth.max(1),
            },
            vk::ImageCreateFlags::empty(),
        ),
        TextureDimension::Cube => (
            vk::ImageType::TYPE_2D,
            6,
            vk::Extent3D {
                width: size.width,
                height: size.height,
                depth: 1,
            },
            vk::ImageCreateFlags::CUBE_COMPATIBLE,
        ),
    }
}

/// View type and default layer count for a dimension.
pub fn convert_view_type(dimension: TextureDimension, layers: u32) -> (vk::ImageViewType, u32) {
    match dimension {
        TextureDimension::D1 => (vk::ImageViewType::TYPE_1D, 1),
        TextureDimension::D2 => (vk::ImageViewType::TYPE_2D, 1),
        TextureDimension::D2Array => (vk::ImageViewType::TYPE_2D_ARRAY, layers),
        TextureDimension::D3 => (vk::ImageViewType::TYPE_3D, 1),
        TextureDimension::Cube => (vk::ImageViewType::CUBE, 6),
    }
}

/// Convert FilterMode to Vulkan filter.
pub fn convert_filter_mode(mode: FilterMode) -> vk::Filter {
    match mode {
        FilterMode::Nearest => vk::Filter::NEAREST,
        FilterMode::Linear => vk::Filter::LINEAR,
    }
}

/// Convert FilterMode to Vulkan mipmap filter mode.
pub fn convert_mipmap_filter_mode(mode: FilterMode) -> vk::SamplerMipmapMode {
    match mode {
        FilterMode::Nearest => vk::SamplerMipmapMode::NEAREST,
        FilterMode::Linear => vk::SamplerMipmapMode::LINEAR,
    }
}

/// Convert AddressMode to Vulkan sampler address mode.
pub fn convert_address_mode(mode: AddressMode) -> vk::SamplerAddressMode {
    match mode {
        AddressMode::ClampToEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        AddressMode::Repeat => vk::SamplerAddressMode::REPEAT,
        AddressMode::MirrorRepeat => vk::SamplerAddressMode::MIRRORED_REPEAT,
        AddressMode::ClampToBorder => vk::SamplerAddressMode::CLAMP_TO_BORDER,
    }
}

/// Convert CompareFunction to Vulkan compare op.
pub fn convert_compare_function(func: CompareFunction) -> vk::CompareOp {
    match func {
        CompareFunction::Never => vk::CompareOp::NEVER,
        CompareFunction::Less => vk::CompareOp::LESS,
        CompareFunction::Equal => vk::CompareOp::EQUAL,
        CompareFunction::LessEqual => vk::CompareOp::LESS_OR_EQUAL,
        CompareFunction::Greater => vk::CompareOp::GREATER,
        CompareFunction::NotEqual => vk::CompareOp::NOT_EQUAL,
        CompareFunction::GreaterEqual => vk::CompareOp::GREATER_OR_EQUAL,
        CompareFunction::Always => vk::CompareOp::ALWAYS,
    }
}

/// Convert an acceleration structure kind to the Vulkan type.
pub fn convert_accel_kind(kind: AccelerationStructureKind) -> vk::AccelerationStructureTypeKHR {
    match kind {
        AccelerationStructureKind::TopLevel => vk::AccelerationStructureTypeKHR::TOP_LEVEL,
        AccelerationStructureKind::BottomLevel => vk::AccelerationStructureTypeKHR::BOTTOM_LEVEL,
    }
}
