//! Vulkan driver using ash.
//!
//! Implements the registry's driver primitives over an externally created
//! Vulkan device: device and queue enumeration belong to the surrounding
//! device layer, which hands its `ash` handles in here. Memory comes from
//! gpu-allocator; queue completion is tracked with one timeline semaphore
//! per queue kind, which the external submitter signals to the value
//! returned by `record_submission` when it submits.

pub mod conversion;

use ash::vk;
use gpu_allocator::vulkan::{
    AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc,
};
use parking_lot::Mutex;

use crate::error::RegistryError;
use crate::types::{
    AccelerationStructureDescriptor, AccelerationStructureKind, BufferDescriptor, BufferUsage,
    SamplerDescriptor, TextureDescriptor, TextureDimension, TextureViewDescriptor,
};

use self::conversion::{
    convert_accel_kind, convert_address_mode, convert_aspect_mask, convert_buffer_usage,
    convert_compare_function, convert_dimension, convert_filter_mode, convert_mipmap_filter_mode,
    convert_texture_format, convert_texture_usage, convert_view_type,
};

use super::{
    DriverAccelerationStructure, DriverBuffer, DriverCommandPool, DriverDevice, DriverLimits,
    DriverMemory, DriverSampler, DriverTexture, DriverTextureView, MemoryHeap, QueueKind,
};

/// Queue family indices for the queue kinds the registry tracks. Kinds
/// may share a family on devices without dedicated queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilies {
    /// Graphics queue family.
    pub graphics: u32,
    /// Compute queue family.
    pub compute: u32,
    /// Transfer queue family.
    pub transfer: u32,
}

impl QueueFamilies {
    /// All three kinds on one family.
    pub fn unified(family: u32) -> Self {
        Self {
            graphics: family,
            compute: family,
            transfer: family,
        }
    }

    fn index_of(&self, queue: QueueKind) -> u32 {
        match queue {
            QueueKind::Graphics => self.graphics,
            QueueKind::Compute => self.compute,
            QueueKind::Transfer => self.transfer,
        }
    }
}

/// Vulkan driver over an externally owned device.
pub struct VulkanDriver {
    /// Logical device. Owned by the caller; never destroyed here.
    device: ash::Device,
    /// Memory allocator.
    allocator: Mutex<Allocator>,
    /// Acceleration structure extension entry points.
    accel_loader: ash::khr::acceleration_structure::Device,
    /// One timeline semaphore per queue kind; its counter is the queue's
    /// completion value.
    completion_semaphores: [vk::Semaphore; QueueKind::COUNT],
    families: QueueFamilies,
    limits: DriverLimits,
}

impl std::fmt::Debug for VulkanDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanDriver")
            .field("families", &self.families)
            .finish_non_exhaustive()
    }
}

impl VulkanDriver {
    /// Wrap an externally created device.
    ///
    /// The device must have been created with timeline semaphore support
    /// (core in Vulkan 1.2). Acceleration structure entry points are
    /// loaded unconditionally; calling the AS paths requires
    /// `VK_KHR_acceleration_structure` to have been enabled.
    pub fn new(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        families: QueueFamilies,
    ) -> Result<Self, RegistryError> {
        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: device.clone(),
            physical_device,
            debug_settings: Default::default(),
            buffer_device_address: true,
            allocation_sizes: gpu_allocator::AllocationSizes::default(),
        })
        .map_err(|e| {
            RegistryError::ResourceCreationFailed(format!("failed to create memory allocator: {e}"))
        })?;

        let accel_loader = ash::khr::acceleration_structure::Device::new(instance, &device);

        let mut completion_semaphores = [vk::Semaphore::null(); QueueKind::COUNT];
        for (queue, semaphore) in QueueKind::ALL.iter().zip(&mut completion_semaphores) {
            let mut type_info = vk::SemaphoreTypeCreateInfo::default()
                .semaphore_type(vk::SemaphoreType::TIMELINE)
                .initial_value(0);
            let info = vk::SemaphoreCreateInfo::default().push_next(&mut type_info);
            *semaphore = unsafe { device.create_semaphore(&info, None) }.map_err(|e| {
                RegistryError::ResourceCreationFailed(format!(
                    "failed to create {} completion semaphore: {e:?}",
                    queue.name()
                ))
            })?;
        }

        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let defaults = DriverLimits::default();
        let limits = DriverLimits {
            max_samplers: properties
                .limits
                .max_sampler_allocation_count
                .min(defaults.max_samplers),
            ..defaults
        };

        log::info!("Vulkan driver initialized (families {families:?})");

        Ok(Self {
            device,
            allocator: Mutex::new(allocator),
            accel_loader,
            completion_semaphores,
            families,
            limits,
        })
    }

    /// The timeline semaphore the external submitter must signal to a
    /// submission's timeline value for `queue`.
    pub fn completion_semaphore(&self, queue: QueueKind) -> vk::Semaphore {
        self.completion_semaphores[queue.index()]
    }

    /// Allocate a raw memory heap for placed resources. The caller owns
    /// it and frees it through [`free_heap`](Self::free_heap) once no
    /// registry slot references it.
    pub fn allocate_heap(
        &self,
        size: u64,
        memory_type_index: u32,
        label: impl Into<String>,
    ) -> Result<MemoryHeap, RegistryError> {
        let info = vk::MemoryAllocateInfo::default()
            .allocation_size(size)
            .memory_type_index(memory_type_index);
        let memory = unsafe { self.device.allocate_memory(&info, None) }.map_err(|e| {
            RegistryError::ResourceCreationFailed(format!("failed to allocate heap memory: {e:?}"))
        })?;
        Ok(MemoryHeap::new(
            Some(label.into()),
            size,
            DriverMemory::Vulkan { memory },
        ))
    }

    /// Free a heap previously allocated with
    /// [`allocate_heap`](Self::allocate_heap). The caller must ensure no
    /// placed resource still references it.
    pub fn free_heap(&self, heap: MemoryHeap) {
        if let DriverMemory::Vulkan { memory } = heap.raw() {
            unsafe { self.device.free_memory(*memory, None) };
        }
    }

    fn memory_location(usage: BufferUsage) -> gpu_allocator::MemoryLocation {
        if usage.contains(BufferUsage::MAP_READ) {
            gpu_allocator::MemoryLocation::GpuToCpu
        } else if usage.contains(BufferUsage::MAP_WRITE) || usage.contains(BufferUsage::COPY_DST) {
            // COPY_DST buffers are typically written from the CPU through
            // a mapped pointer.
            gpu_allocator::MemoryLocation::CpuToGpu
        } else {
            gpu_allocator::MemoryLocation::GpuOnly
        }
    }

    fn create_raw_buffer(&self, desc: &BufferDescriptor) -> Result<vk::Buffer, RegistryError> {
        let buffer_info = vk::BufferCreateInfo::default()
            .size(desc.size)
            .usage(convert_buffer_usage(desc.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        unsafe { self.device.create_buffer(&buffer_info, None) }.map_err(|e| {
            RegistryError::ResourceCreationFailed(format!("failed to create buffer: {e:?}"))
        })
    }

    fn buffer_address(&self, buffer: vk::Buffer, usage: BufferUsage) -> u64 {
        if usage.contains(BufferUsage::DEVICE_ADDRESS) {
            let info = vk::BufferDeviceAddressInfo::default().buffer(buffer);
            unsafe { self.device.get_buffer_device_address(&info) }
        } else {
            0
        }
    }
}

impl DriverDevice for VulkanDriver {
    fn name(&self) -> &'static str {
        "Vulkan Driver (ash)"
    }

    fn limits(&self) -> DriverLimits {
        self.limits.clone()
    }

    fn queue_family_index(&self, queue: QueueKind) -> u32 {
        self.families.index_of(queue)
    }

    fn create_buffer(&self, desc: &BufferDescriptor) -> Result<DriverBuffer, RegistryError> {
        let buffer = self.create_raw_buffer(desc)?;
        let requirements = unsafe { self.device.get_buffer_memory_requirements(buffer) };

        let allocation = {
            let mut allocator = self.allocator.lock();
            match allocator.allocate(&AllocationCreateDesc {
                name: desc.label.as_deref().unwrap_or("buffer"),
                requirements,
                location: Self::memory_location(desc.usage),
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            }) {
                Ok(allocation) => allocation,
                Err(e) => {
                    unsafe { self.device.destroy_buffer(buffer, None) };
                    return Err(RegistryError::ResourceCreationFailed(format!(
                        "failed to allocate buffer memory: {e}"
                    )));
                }
            }
        };

        if let Err(e) = unsafe {
            self.device
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
        } {
            if let Err(free_err) = self.allocator.lock().free(allocation) {
                log::error!("failed to free allocation after bind failure: {free_err}");
            }
            unsafe { self.device.destroy_buffer(buffer, None) };
            return Err(RegistryError::ResourceCreationFailed(format!(
                "failed to bind buffer memory: {e:?}"
            )));
        }

        let address = self.buffer_address(buffer, desc.usage);
        Ok(DriverBuffer::Vulkan {
            buffer,
            allocation: Mutex::new(Some(allocation)),
            address,
            size: desc.size,
        })
    }

    fn create_buffer_in_heap(
        &self,
        desc: &BufferDescriptor,
        heap: &MemoryHeap,
        offset: u64,
    ) -> Result<DriverBuffer, RegistryError> {
        let DriverMemory::Vulkan { memory } = heap.raw() else {
            return Err(RegistryError::ResourceCreationFailed(
                "heap was not allocated by this driver".to_string(),
            ));
        };
        let buffer = self.create_raw_buffer(desc)?;
        let requirements = unsafe { self.device.get_buffer_memory_requirements(buffer) };
        if offset % requirements.alignment != 0 || offset + requirements.size > heap.size() {
            unsafe { self.device.destroy_buffer(buffer, None) };
            return Err(RegistryError::ResourceCreationFailed(format!(
                "buffer needs {} bytes aligned to {} and does not fit heap of {} at offset {}",
                requirements.size,
                requirements.alignment,
                heap.size(),
                offset
            )));
        }
        if let Err(e) = unsafe { self.device.bind_buffer_memory(buffer, *memory, offset) } {
            unsafe { self.device.destroy_buffer(buffer, None) };
            return Err(RegistryError::ResourceCreationFailed(format!(
                "failed to bind placed buffer memory: {e:?}"
            )));
        }
        let address = self.buffer_address(buffer, desc.usage);
        Ok(DriverBuffer::Vulkan {
            buffer,
            allocation: Mutex::new(None),
            address,
            size: desc.size,
        })
    }

    fn destroy_buffer(&self, buffer: DriverBuffer) -> Result<(), RegistryError> {
        let DriverBuffer::Vulkan {
            buffer, allocation, ..
        } = buffer
        else {
            return Err(RegistryError::DriverError(
                "buffer was not created by this driver".to_string(),
            ));
        };
        if let Some(allocation) = allocation.lock().take() {
            if let Err(e) = self.allocator.lock().free(allocation) {
                log::error!("failed to free buffer allocation: {e}");
            }
        }
        unsafe { self.device.destroy_buffer(buffer, None) };
        Ok(())
    }

    fn create_texture(&self, desc: &TextureDescriptor) -> Result<DriverTexture, RegistryError> {
        let format = convert_texture_format(desc.format);
        let (image_type, array_layers, extent, flags) =
            convert_dimension(desc.dimension, desc.size);

        let image_info = vk::ImageCreateInfo::default()
            .flags(flags)
            .image_type(image_type)
            .format(format)
            .extent(extent)
            .mip_levels(desc.mip_level_count)
            .array_layers(array_layers)
            .samples(match desc.sample_count {
                1 => vk::SampleCountFlags::TYPE_1,
                2 => vk::SampleCountFlags::TYPE_2,
                4 => vk::SampleCountFlags::TYPE_4,
                8 => vk::SampleCountFlags::TYPE_8,
                _ => vk::SampleCountFlags::TYPE_1,
            })
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(convert_texture_usage(desc.usage, desc.format))
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { self.device.create_image(&image_info, None) }.map_err(|e| {
            RegistryError::ResourceCreationFailed(format!("failed to create image: {e:?}"))
        })?;

        let requirements = unsafe { self.device.get_image_memory_requirements(image) };
        let allocation = {
            let mut allocator = self.allocator.lock();
            match allocator.allocate(&AllocationCreateDesc {
                name: desc.label.as_deref().unwrap_or("texture"),
                requirements,
                location: gpu_allocator::MemoryLocation::GpuOnly,
                linear: false,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            }) {
                Ok(allocation) => allocation,
                Err(e) => {
                    unsafe { self.device.destroy_image(image, None) };
                    return Err(RegistryError::ResourceCreationFailed(format!(
                        "failed to allocate texture memory: {e}"
                    )));
                }
            }
        };

        if let Err(e) = unsafe {
            self.device
                .bind_image_memory(image, allocation.memory(), allocation.offset())
        } {
            if let Err(free_err) = self.allocator.lock().free(allocation) {
                log::error!("failed to free allocation after bind failure: {free_err}");
            }
            unsafe { self.device.destroy_image(image, None) };
            return Err(RegistryError::ResourceCreationFailed(format!(
                "failed to bind image memory: {e:?}"
            )));
        }

        Ok(DriverTexture::Vulkan {
            image,
            allocation: Mutex::new(Some(allocation)),
            format,
            extent,
        })
    }

    fn create_texture_in_heap(
        &self,
        desc: &TextureDescriptor,
        heap: &MemoryHeap,
        offset: u64,
    ) -> Result<DriverTexture, RegistryError> {
        let DriverMemory::Vulkan { memory } = heap.raw() else {
            return Err(RegistryError::ResourceCreationFailed(
                "heap was not allocated by this driver".to_string(),
            ));
        };
        let format = convert_texture_format(desc.format);
        let (image_type, array_layers, extent, flags) =
            convert_dimension(desc.dimension, desc.size);
        let image_info = vk::ImageCreateInfo::default()
            .flags(flags)
            .image_type(image_type)
            .format(format)
            .extent(extent)
            .mip_levels(desc.mip_level_count)
            .array_layers(array_layers)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(convert_texture_usage(desc.usage, desc.format))
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { self.device.create_image(&image_info, None) }.map_err(|e| {
            RegistryError::ResourceCreationFailed(format!("failed to create image: {e:?}"))
        })?;
        let requirements = unsafe { self.device.get_image_memory_requirements(image) };
        if offset % requirements.alignment != 0 || offset + requirements.size > heap.size() {
            unsafe { self.device.destroy_image(image, None) };
            return Err(RegistryError::ResourceCreationFailed(format!(
                "image needs {} bytes aligned to {} and does not fit heap of {} at offset {}",
                requirements.size,
                requirements.alignment,
                heap.size(),
                offset
            )));
        }
        if let Err(e) = unsafe { self.device.bind_image_memory(image, *memory, offset) } {
            unsafe { self.device.destroy_image(image, None) };
            return Err(RegistryError::ResourceCreationFailed(format!(
                "failed to bind placed image memory: {e:?}"
            )));
        }

        Ok(DriverTexture::Vulkan {
            image,
            allocation: Mutex::new(None),
            format,
            extent,
        })
    }

    fn destroy_texture(&self, texture: DriverTexture) -> Result<(), RegistryError> {
        let DriverTexture::Vulkan {
            image, allocation, ..
        } = texture
        else {
            return Err(RegistryError::DriverError(
                "texture was not created by this driver".to_string(),
            ));
        };
        if let Some(allocation) = allocation.lock().take() {
            if let Err(e) = self.allocator.lock().free(allocation) {
                log::error!("failed to free texture allocation: {e}");
            }
        }
        unsafe { self.device.destroy_image(image, None) };
        Ok(())
    }

    fn create_texture_view(
        &self,
        texture: &DriverTexture,
        texture_desc: &TextureDescriptor,
        desc: &TextureViewDescriptor,
    ) -> Result<DriverTextureView, RegistryError> {
        let DriverTexture::Vulkan { image, .. } = texture else {
            return Err(RegistryError::DriverError(
                "texture was not created by this driver".to_string(),
            ));
        };
        let format = desc.format.unwrap_or(texture_desc.format);
        let total_layers = match texture_desc.dimension {
            TextureDimension::D2Array => texture_desc.size.depth.max(1),
            TextureDimension::Cube => 6,
            _ => 1,
        };
        let (view_type, default_layers) =
            convert_view_type(texture_desc.dimension, total_layers);
        let level_count = desc.mip_level_count.unwrap_or(
            texture_desc
                .mip_level_count
                .saturating_sub(desc.base_mip_level)
                .max(1),
        );
        let layer_count = desc
            .array_layer_count
            .unwrap_or(default_layers.saturating_sub(desc.base_array_layer).max(1));

        let view_info = vk::ImageViewCreateInfo::default()
            .image(*image)
            .view_type(view_type)
            .format(convert_texture_format(format))
            .components(vk::ComponentMapping::default())
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: convert_aspect_mask(format),
                base_mip_level: desc.base_mip_level,
                level_count,
                base_array_layer: desc.base_array_layer,
                layer_count,
            });

        let view = unsafe { self.device.create_image_view(&view_info, None) }.map_err(|e| {
            RegistryError::ResourceCreationFailed(format!("failed to create image view: {e:?}"))
        })?;
        Ok(DriverTextureView::Vulkan { view })
    }

    fn destroy_texture_view(&self, view: DriverTextureView) -> Result<(), RegistryError> {
        let DriverTextureView::Vulkan { view } = view else {
            return Err(RegistryError::DriverError(
                "texture view was not created by this driver".to_string(),
            ));
        };
        unsafe { self.device.destroy_image_view(view, None) };
        Ok(())
    }

    fn create_sampler(&self, desc: &SamplerDescriptor) -> Result<DriverSampler, RegistryError> {
        let sampler_info = vk::SamplerCreateInfo::default()
            .mag_filter(convert_filter_mode(desc.mag_filter))
            .min_filter(convert_filter_mode(desc.min_filter))
            .mipmap_mode(convert_mipmap_filter_mode(desc.mipmap_filter))
            .address_mode_u(convert_address_mode(desc.address_mode_u))
            .address_mode_v(convert_address_mode(desc.address_mode_v))
            .address_mode_w(convert_address_mode(desc.address_mode_w))
            .mip_lod_bias(0.0)
            .anisotropy_enable(desc.anisotropy_clamp > 1)
            .max_anisotropy(f32::from(desc.anisotropy_clamp))
            .compare_enable(desc.compare.is_some())
            .compare_op(
                desc.compare
                    .map(convert_compare_function)
                    .unwrap_or(vk::CompareOp::ALWAYS),
            )
            .min_lod(desc.lod_min_clamp)
            .max_lod(desc.lod_max_clamp)
            .border_color(vk::BorderColor::FLOAT_TRANSPARENT_BLACK)
            .unnormalized_coordinates(false);

        let sampler = unsafe { self.device.create_sampler(&sampler_info, None) }.map_err(|e| {
            RegistryError::ResourceCreationFailed(format!("failed to create sampler: {e:?}"))
        })?;
        Ok(DriverSampler::Vulkan { sampler })
    }

    fn destroy_sampler(&self, sampler: DriverSampler) -> Result<(), RegistryError> {
        let DriverSampler::Vulkan { sampler } = sampler else {
            return Err(RegistryError::DriverError(
                "sampler was not created by this driver".to_string(),
            ));
        };
        unsafe { self.device.destroy_sampler(sampler, None) };
        Ok(())
    }

    fn create_acceleration_structure(
        &self,
        kind: AccelerationStructureKind,
        desc: &AccelerationStructureDescriptor,
        backing: &DriverBuffer,
    ) -> Result<DriverAccelerationStructure, RegistryError> {
        let DriverBuffer::Vulkan { buffer, .. } = backing else {
            return Err(RegistryError::DriverError(
                "backing buffer was not created by this driver".to_string(),
            ));
        };
        let info = vk::AccelerationStructureCreateInfoKHR::default()
            .buffer(*buffer)
            .offset(0)
            .size(desc.size)
            .ty(convert_accel_kind(kind));
        let accel = unsafe { self.accel_loader.create_acceleration_structure(&info, None) }
            .map_err(|e| {
                RegistryError::ResourceCreationFailed(format!(
                    "failed to create acceleration structure: {e:?}"
                ))
            })?;
        let address_info =
            vk::AccelerationStructureDeviceAddressInfoKHR::default().acceleration_structure(accel);
        let address = unsafe {
            self.accel_loader
                .get_acceleration_structure_device_address(&address_info)
        };
        Ok(DriverAccelerationStructure::Vulkan { accel, address })
    }

    fn destroy_acceleration_structure(
        &self,
        _kind: AccelerationStructureKind,
        accel: DriverAccelerationStructure,
    ) -> Result<(), RegistryError> {
        let DriverAccelerationStructure::Vulkan { accel, .. } = accel else {
            return Err(RegistryError::DriverError(
                "acceleration structure was not created by this driver".to_string(),
            ));
        };
        unsafe {
            self.accel_loader
                .destroy_acceleration_structure(accel, None)
        };
        Ok(())
    }

    fn create_command_pool(&self, queue_family: u32) -> Result<DriverCommandPool, RegistryError> {
        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family)
            .flags(vk::CommandPoolCreateFlags::TRANSIENT);
        let pool = unsafe { self.device.create_command_pool(&pool_info, None) }.map_err(|e| {
            RegistryError::ResourceCreationFailed(format!("failed to create command pool: {e:?}"))
        })?;
        Ok(DriverCommandPool::Vulkan { pool })
    }

    fn reset_command_pool(&self, pool: &DriverCommandPool) -> Result<(), RegistryError> {
        let DriverCommandPool::Vulkan { pool } = pool else {
            return Err(RegistryError::DriverError(
                "command pool was not created by this driver".to_string(),
            ));
        };
        unsafe {
            self.device
                .reset_command_pool(*pool, vk::CommandPoolResetFlags::empty())
        }
        .map_err(map_device_error)
    }

    fn destroy_command_pool(&self, pool: DriverCommandPool) -> Result<(), RegistryError> {
        let DriverCommandPool::Vulkan { pool } = pool else {
            return Err(RegistryError::DriverError(
                "command pool was not created by this driver".to_string(),
            ));
        };
        unsafe { self.device.destroy_command_pool(pool, None) };
        Ok(())
    }

    fn completed_value(&self, queue: QueueKind) -> Result<u64, RegistryError> {
        let semaphore = self.completion_semaphores[queue.index()];
        unsafe { self.device.get_semaphore_counter_value(semaphore) }.map_err(map_device_error)
    }

    fn signal_completed(&self, queue: QueueKind, value: u64) -> Result<(), RegistryError> {
        let info = vk::SemaphoreSignalInfo::default()
            .semaphore(self.completion_semaphores[queue.index()])
            .value(value);
        unsafe { self.device.signal_semaphore(&info) }.map_err(map_device_error)
    }

    fn wait_idle(&self) -> Result<(), RegistryError> {
        unsafe { self.device.device_wait_idle() }.map_err(map_device_error)
    }
}

impl Drop for VulkanDriver {
    fn drop(&mut self) {
        if let Err(e) = unsafe { self.device.device_wait_idle() } {
            log::error!("device wait failed during Vulkan driver teardown: {e:?}");
        }
        for semaphore in self.completion_semaphores {
            unsafe { self.device.destroy_semaphore(semaphore, None) };
        }
        // The allocator drops after this and reports any unfreed blocks;
        // the device itself stays alive for its external owner.
    }
}

fn map_device_error(result: vk::Result) -> RegistryError {
    match result {
        vk::Result::ERROR_DEVICE_LOST => RegistryError::DeviceLost,
        other => RegistryError::DriverError(format!("{other:?}")),
    }
}
