/// VulkanGraphicsDevice - `GraphicsDevice` over ash
///
/// Core handles are the raw values of the Vulkan handles they stand for, so
/// conversion is a `from_raw`/`as_raw` pair with no lookup table. Side tables
/// exist only where the device needs more than the handle: bound memory of
/// images (readback), allocations of host buffers, and memory types of raw
/// allocations (coherence).

use std::mem::ManuallyDrop;

use ash::vk;
use ash::vk::Handle;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use rustc_hash::FxHashMap;
use strata_engine::strata::device::{
    AcquireStatus, BufferDescriptorKind, BufferHandle, BufferImageCopy, BufferUsage,
    CommandBufferHandle, DescriptorSetHandle, DeviceFormats, DeviceLimits, FenceHandle,
    FenceStatus, FramebufferDesc, FramebufferHandle, GraphicsDevice, ImageDesc, ImageHandle,
    ImageTransition, ImageViewDesc, ImageViewHandle, IndexType, MappedImage, MemoryHandle,
    MemoryProperties, MemoryRequirements, PipelineHandle, PresentStatus, Rect2D,
    RenderPassBegin, RenderPassDesc, RenderPassHandle, SamplerHandle, SemaphoreHandle,
    SwapchainInfo, Viewport,
};
use strata_engine::strata::render::{PipelineDefinition, PipelineLayoutKind, PipelineTarget, SamplerDef};
use strata_engine::strata::{StrataError, StrataResult};
use strata_engine::{engine_debug, engine_err, engine_error, engine_info, engine_warn};

use crate::vulkan_buffer::HostBuffer;
use crate::vulkan_command_list::{
    buffer_image_copy_to_vk, clear_value_to_vk, record_copy_image, record_transitions,
};
use crate::vulkan_context::VulkanContext;
use crate::vulkan_descriptor_set::DescriptorAllocator;
use crate::vulkan_format::{
    fence_status_from_vk, format_to_vk, image_layout_to_vk, image_usage_to_vk, index_type_to_vk,
    load_op_to_vk, memory_properties_from_vk, sample_count_to_vk, sampler_create_info,
    store_op_to_vk, tiling_to_vk, aspect_to_vk,
};
use crate::vulkan_pipeline::create_graphics_pipeline;
use crate::vulkan_shader::{ShaderLibrary, ShaderModules};
use crate::vulkan_swapchain::{SurfaceContext, Swapchain};

/// Device-side knowledge about a core-created image
struct ImageRecord {
    height: u32,
    /// Memory and offset once bound
    binding: Option<(vk::DeviceMemory, u64)>,
}

/// Raw allocation made through `allocate_memory`
struct MemoryRecord {
    size: u64,
    coherent: bool,
}

/// Vulkan implementation of the strata `GraphicsDevice`
pub struct VulkanGraphicsDevice {
    device: ash::Device,
    physical_device: vk::PhysicalDevice,
    queue: vk::Queue,
    surface: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,
    swapchain_loader: ash::khr::swapchain::Device,

    formats: DeviceFormats,
    limits: DeviceLimits,
    memory_types: Vec<MemoryProperties>,
    max_anisotropy: f32,
    window_extent: (u32, u32),
    vsync: bool,

    /// Dropped before the device is destroyed by its owner
    allocator: ManuallyDrop<Allocator>,
    command_pool: vk::CommandPool,
    descriptors: DescriptorAllocator,
    shaders: ShaderModules,
    swapchain: Option<Swapchain>,

    images: FxHashMap<vk::Image, ImageRecord>,
    memories: FxHashMap<vk::DeviceMemory, MemoryRecord>,
    buffers: FxHashMap<vk::Buffer, HostBuffer>,
}

impl VulkanGraphicsDevice {
    /// Create the device-level objects the core needs on top of `ctx`
    ///
    /// # Arguments
    ///
    /// * `ctx` - Bootstrap objects; instance, device and surface stay owned by the caller
    /// * `shaders` - SPIR-V for every shader variant pipelines may request
    pub fn new(ctx: VulkanContext, shaders: &ShaderLibrary) -> StrataResult<Self> {
        let VulkanContext {
            instance,
            physical_device,
            device,
            queue,
            queue_family,
            surface,
            surface_loader,
            formats,
            dedicated_allocation,
            window_extent,
            vsync,
        } = ctx;

        let (properties, memory_properties) = unsafe {
            (
                instance.get_physical_device_properties(physical_device),
                instance.get_physical_device_memory_properties(physical_device),
            )
        };
        let memory_types = memory_properties.memory_types
            [..memory_properties.memory_type_count as usize]
            .iter()
            .map(|memory_type| memory_properties_from_vk(memory_type.property_flags))
            .collect();
        let limits = DeviceLimits {
            uniform_offset_alignment: properties
                .limits
                .min_uniform_buffer_offset_alignment
                .max(properties.limits.min_storage_buffer_offset_alignment),
            dedicated_allocation,
        };

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: device.clone(),
            physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })
        .map_err(|e| {
            engine_error!("strata::vulkan", "Failed to create GPU allocator: {:?}", e);
            StrataError::InitializationFailed(format!("Failed to create allocator: {:?}", e))
        })?;

        let pool_info = vk::CommandPoolCreateInfo::default()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family);
        let command_pool = unsafe {
            device.create_command_pool(&pool_info, None).map_err(|e| {
                engine_error!("strata::vulkan", "Failed to create command pool: {:?}", e);
                StrataError::InitializationFailed(format!("Failed to create command pool: {:?}", e))
            })?
        };

        let mut descriptors = match DescriptorAllocator::new(&device) {
            Ok(descriptors) => descriptors,
            Err(err) => {
                unsafe { device.destroy_command_pool(command_pool, None) };
                return Err(err);
            }
        };
        let shaders = match ShaderModules::new(&device, shaders) {
            Ok(shaders) => shaders,
            Err(err) => {
                descriptors.destroy(&device);
                unsafe { device.destroy_command_pool(command_pool, None) };
                return Err(err);
            }
        };

        let swapchain_loader = ash::khr::swapchain::Device::new(&instance, &device);

        engine_info!(
            "strata::vulkan",
            "Device ready: {} memory types, offset alignment {}, dedicated allocation {}",
            memory_properties.memory_type_count,
            limits.uniform_offset_alignment,
            limits.dedicated_allocation
        );

        Ok(Self {
            device,
            physical_device,
            queue,
            surface,
            surface_loader,
            swapchain_loader,
            formats,
            limits,
            memory_types,
            max_anisotropy: properties.limits.max_sampler_anisotropy,
            window_extent,
            vsync,
            allocator: ManuallyDrop::new(allocator),
            command_pool,
            descriptors,
            shaders,
            swapchain: None,
            images: FxHashMap::default(),
            memories: FxHashMap::default(),
            buffers: FxHashMap::default(),
        })
    }

    /// Window size used by the next `create_swapchain` when the surface leaves it open
    pub fn set_window_extent(&mut self, width: u32, height: u32) {
        self.window_extent = (width, height);
    }

    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    /// Number of live descriptor sets
    pub fn descriptor_set_count(&self) -> usize {
        self.descriptors.live_sets()
    }
}

// ===== Handle conversions =====

fn raw<H: Handle>(handle: H) -> u64 {
    handle.as_raw()
}

fn image(handle: ImageHandle) -> vk::Image {
    vk::Image::from_raw(handle.as_raw())
}

fn view(handle: ImageViewHandle) -> vk::ImageView {
    vk::ImageView::from_raw(handle.as_raw())
}

fn buffer(handle: BufferHandle) -> vk::Buffer {
    vk::Buffer::from_raw(handle.as_raw())
}

fn command_buffer(handle: CommandBufferHandle) -> vk::CommandBuffer {
    vk::CommandBuffer::from_raw(handle.as_raw())
}

fn semaphore(handle: SemaphoreHandle) -> vk::Semaphore {
    vk::Semaphore::from_raw(handle.as_raw())
}

fn fence(handle: FenceHandle) -> vk::Fence {
    vk::Fence::from_raw(handle.as_raw())
}

/// Map a failed Vulkan call onto the error taxonomy
fn vk_error(what: &str, e: vk::Result) -> StrataError {
    match e {
        vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | vk::Result::ERROR_OUT_OF_HOST_MEMORY => {
            engine_error!("strata::vulkan", "{}: {:?}", what, e);
            StrataError::OutOfMemory
        }
        vk::Result::ERROR_DEVICE_LOST => {
            engine_error!("strata::vulkan", "{}: device lost", what);
            StrataError::DeviceLost
        }
        _ => engine_err!("strata::vulkan", "{}: {:?}", what, e),
    }
}

/// Attachment indices of the single subpass: color, then depth, then resolve
pub(crate) fn attachment_references(
    desc: &RenderPassDesc,
) -> (vk::AttachmentReference, Option<vk::AttachmentReference>, Option<vk::AttachmentReference>) {
    let color = vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    };
    let mut next = 1;
    let depth = desc.depth.map(|_| {
        let reference = vk::AttachmentReference {
            attachment: next,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        };
        next += 1;
        reference
    });
    let resolve = desc.resolve.map(|_| vk::AttachmentReference {
        attachment: next,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    });
    (color, depth, resolve)
}

/// External dependencies around the subpass: earlier attachment writes before
/// ours, our writes before later sampling or transfer reads
fn subpass_dependencies() -> [vk::SubpassDependency; 2] {
    [
        vk::SubpassDependency {
            src_subpass: vk::SUBPASS_EXTERNAL,
            dst_subpass: 0,
            src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
            dst_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            src_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_READ
                | vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            dependency_flags: vk::DependencyFlags::BY_REGION,
        },
        vk::SubpassDependency {
            src_subpass: 0,
            dst_subpass: vk::SUBPASS_EXTERNAL,
            src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            dst_stage_mask: vk::PipelineStageFlags::FRAGMENT_SHADER
                | vk::PipelineStageFlags::TRANSFER,
            src_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            dst_access_mask: vk::AccessFlags::SHADER_READ | vk::AccessFlags::TRANSFER_READ,
            dependency_flags: vk::DependencyFlags::BY_REGION,
        },
    ]
}

impl GraphicsDevice for VulkanGraphicsDevice {
    // ===== CAPABILITIES =====

    fn formats(&self) -> DeviceFormats {
        self.formats
    }

    fn limits(&self) -> DeviceLimits {
        self.limits
    }

    fn memory_types(&self) -> Vec<MemoryProperties> {
        self.memory_types.clone()
    }

    // ===== MEMORY & IMAGES =====

    fn allocate_memory(
        &mut self,
        size: u64,
        memory_type: u32,
        dedicated: Option<ImageHandle>,
    ) -> StrataResult<MemoryHandle> {
        let mut dedicated_info = vk::MemoryDedicatedAllocateInfo::default();
        let mut info = vk::MemoryAllocateInfo::default()
            .allocation_size(size)
            .memory_type_index(memory_type);
        if let Some(target) = dedicated {
            dedicated_info = dedicated_info.image(image(target));
            info = info.push_next(&mut dedicated_info);
        }
        let memory = unsafe {
            self.device
                .allocate_memory(&info, None)
                .map_err(|e| vk_error("Failed to allocate device memory", e))?
        };
        let coherent = self
            .memory_types
            .get(memory_type as usize)
            .is_some_and(|props| props.contains(MemoryProperties::HOST_COHERENT));
        self.memories.insert(memory, MemoryRecord { size, coherent });
        engine_debug!(
            "strata::vulkan",
            "Allocated {} bytes from memory type {}{}",
            size,
            memory_type,
            if dedicated.is_some() { " (dedicated)" } else { "" }
        );
        Ok(MemoryHandle(raw(memory)))
    }

    fn free_memory(&mut self, memory: MemoryHandle) {
        let memory = vk::DeviceMemory::from_raw(memory.as_raw());
        self.memories.remove(&memory);
        unsafe { self.device.free_memory(memory, None) };
    }

    fn create_image(&mut self, desc: &ImageDesc) -> StrataResult<ImageHandle> {
        let info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format_to_vk(desc.format))
            .extent(vk::Extent3D { width: desc.width, height: desc.height, depth: 1 })
            .mip_levels(desc.mip_levels.max(1))
            .array_layers(1)
            .samples(sample_count_to_vk(desc.samples))
            .tiling(tiling_to_vk(desc.tiling))
            .usage(image_usage_to_vk(desc.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        let created = unsafe {
            self.device
                .create_image(&info, None)
                .map_err(|e| vk_error("Failed to create image", e))?
        };
        self.images.insert(created, ImageRecord { height: desc.height, binding: None });
        Ok(ImageHandle(raw(created)))
    }

    fn image_memory_requirements(&self, handle: ImageHandle) -> StrataResult<MemoryRequirements> {
        let target = image(handle);
        if !self.images.contains_key(&target) {
            return Err(StrataError::InvalidResource(format!("Unknown image {:#x}", handle.as_raw())));
        }
        let requirements = unsafe { self.device.get_image_memory_requirements(target) };
        Ok(MemoryRequirements {
            size: requirements.size,
            alignment: requirements.alignment,
            type_bits: requirements.memory_type_bits,
        })
    }

    fn bind_image_memory(&mut self, handle: ImageHandle, memory: MemoryHandle, offset: u64) -> StrataResult<()> {
        let target = image(handle);
        let memory = vk::DeviceMemory::from_raw(memory.as_raw());
        unsafe {
            self.device
                .bind_image_memory(target, memory, offset)
                .map_err(|e| vk_error("Failed to bind image memory", e))?;
        }
        if let Some(record) = self.images.get_mut(&target) {
            record.binding = Some((memory, offset));
        }
        Ok(())
    }

    fn create_image_view(&mut self, handle: ImageHandle, desc: &ImageViewDesc) -> StrataResult<ImageViewHandle> {
        let info = vk::ImageViewCreateInfo::default()
            .image(image(handle))
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format_to_vk(desc.format))
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect_to_vk(desc.aspect),
                base_mip_level: 0,
                level_count: desc.mip_levels.max(1),
                base_array_layer: 0,
                layer_count: 1,
            });
        let created = unsafe {
            self.device
                .create_image_view(&info, None)
                .map_err(|e| vk_error("Failed to create image view", e))?
        };
        Ok(ImageViewHandle(raw(created)))
    }

    fn destroy_image_view(&mut self, handle: ImageViewHandle) {
        unsafe { self.device.destroy_image_view(view(handle), None) };
    }

    fn destroy_image(&mut self, handle: ImageHandle) {
        let target = image(handle);
        self.images.remove(&target);
        unsafe { self.device.destroy_image(target, None) };
    }

    fn read_linear_image(&mut self, handle: ImageHandle, memory: MemoryHandle) -> StrataResult<MappedImage> {
        let target = image(handle);
        let memory = vk::DeviceMemory::from_raw(memory.as_raw());
        let (height, offset) = match self.images.get(&target) {
            Some(ImageRecord { height, binding: Some((bound, offset)) }) if *bound == memory => {
                (*height, *offset)
            }
            _ => {
                return Err(StrataError::InvalidResource(format!(
                    "Image {:#x} is not bound to the given memory",
                    handle.as_raw()
                )))
            }
        };
        let record = self
            .memories
            .get(&memory)
            .ok_or_else(|| StrataError::InvalidResource("Unknown readback memory".to_string()))?;

        let subresource = vk::ImageSubresource {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            mip_level: 0,
            array_layer: 0,
        };
        let layout = unsafe { self.device.get_image_subresource_layout(target, subresource) };
        let start = offset + layout.offset;
        let len = (layout.row_pitch * height as u64).min(layout.size);
        if start + len > record.size {
            return Err(engine_err!(
                "strata::vulkan",
                "Readback of {} bytes at {} exceeds allocation of {} bytes",
                len,
                start,
                record.size
            ));
        }

        unsafe {
            let ptr = self
                .device
                .map_memory(memory, 0, vk::WHOLE_SIZE, vk::MemoryMapFlags::empty())
                .map_err(|e| vk_error("Failed to map readback memory", e))?;
            if !record.coherent {
                let range = vk::MappedMemoryRange::default()
                    .memory(memory)
                    .offset(0)
                    .size(vk::WHOLE_SIZE);
                if let Err(e) = self.device.invalidate_mapped_memory_ranges(&[range]) {
                    self.device.unmap_memory(memory);
                    return Err(vk_error("Failed to invalidate readback memory", e));
                }
            }
            let data = std::slice::from_raw_parts(ptr.cast::<u8>().add(start as usize), len as usize).to_vec();
            self.device.unmap_memory(memory);
            Ok(MappedImage { data, row_pitch: layout.row_pitch })
        }
    }

    // ===== BUFFERS =====

    fn create_host_buffer(&mut self, size: u64, usage: BufferUsage) -> StrataResult<BufferHandle> {
        let host = HostBuffer::new(&self.device, &mut self.allocator, size, usage)?;
        let handle = BufferHandle(raw(host.buffer));
        self.buffers.insert(host.buffer, host);
        Ok(handle)
    }

    fn write_buffer(&mut self, handle: BufferHandle, offset: u64, data: &[u8]) -> StrataResult<()> {
        self.buffers
            .get_mut(&buffer(handle))
            .ok_or_else(|| StrataError::InvalidResource(format!("Unknown buffer {:#x}", handle.as_raw())))?
            .write(offset, data)
    }

    fn destroy_buffer(&mut self, handle: BufferHandle) {
        if let Some(host) = self.buffers.remove(&buffer(handle)) {
            host.destroy(&self.device, &mut self.allocator);
        }
    }

    // ===== PASSES & PIPELINES =====

    fn create_render_pass(&mut self, desc: &RenderPassDesc) -> StrataResult<RenderPassHandle> {
        let attachments: Vec<vk::AttachmentDescription> = desc
            .attachments()
            .iter()
            .map(|attachment| {
                vk::AttachmentDescription::default()
                    .format(format_to_vk(attachment.format))
                    .samples(sample_count_to_vk(attachment.samples))
                    .load_op(load_op_to_vk(attachment.load_op))
                    .store_op(store_op_to_vk(attachment.store_op))
                    .stencil_load_op(load_op_to_vk(attachment.stencil_load_op))
                    .stencil_store_op(store_op_to_vk(attachment.stencil_store_op))
                    .initial_layout(image_layout_to_vk(attachment.initial_layout))
                    .final_layout(image_layout_to_vk(attachment.final_layout))
            })
            .collect();

        let (color, depth, resolve) = attachment_references(desc);
        let color_refs = [color];
        let resolve_refs: Vec<vk::AttachmentReference> = resolve.into_iter().collect();
        let mut subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs);
        if let Some(depth) = depth.as_ref() {
            subpass = subpass.depth_stencil_attachment(depth);
        }
        if !resolve_refs.is_empty() {
            subpass = subpass.resolve_attachments(&resolve_refs);
        }

        let subpasses = [subpass];
        let dependencies = subpass_dependencies();
        let info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);
        let render_pass = unsafe {
            self.device
                .create_render_pass(&info, None)
                .map_err(|e| vk_error("Failed to create render pass", e))?
        };
        Ok(RenderPassHandle(raw(render_pass)))
    }

    fn destroy_render_pass(&mut self, render_pass: RenderPassHandle) {
        unsafe {
            self.device
                .destroy_render_pass(vk::RenderPass::from_raw(render_pass.as_raw()), None)
        };
    }

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> StrataResult<FramebufferHandle> {
        let views: Vec<vk::ImageView> = desc.attachments.iter().map(|v| view(*v)).collect();
        let info = vk::FramebufferCreateInfo::default()
            .render_pass(vk::RenderPass::from_raw(desc.render_pass.as_raw()))
            .attachments(&views)
            .width(desc.width)
            .height(desc.height)
            .layers(1);
        let framebuffer = unsafe {
            self.device
                .create_framebuffer(&info, None)
                .map_err(|e| vk_error("Failed to create framebuffer", e))?
        };
        Ok(FramebufferHandle(raw(framebuffer)))
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        unsafe {
            self.device
                .destroy_framebuffer(vk::Framebuffer::from_raw(framebuffer.as_raw()), None)
        };
    }

    fn create_pipeline(
        &mut self,
        definition: &PipelineDefinition,
        target: &PipelineTarget,
    ) -> StrataResult<PipelineHandle> {
        let pipeline = create_graphics_pipeline(
            &self.device,
            &self.shaders,
            self.descriptors.pipeline_layout(definition.shader.layout()),
            vk::RenderPass::from_raw(target.render_pass.as_raw()),
            definition,
            target,
        )?;
        Ok(PipelineHandle(raw(pipeline)))
    }

    fn destroy_pipeline(&mut self, pipeline: PipelineHandle) {
        unsafe {
            self.device
                .destroy_pipeline(vk::Pipeline::from_raw(pipeline.as_raw()), None)
        };
    }

    // ===== SAMPLERS & DESCRIPTORS =====

    fn create_sampler(&mut self, def: &SamplerDef) -> StrataResult<SamplerHandle> {
        let info = sampler_create_info(def, self.max_anisotropy);
        let sampler = unsafe {
            self.device
                .create_sampler(&info, None)
                .map_err(|e| vk_error("Failed to create sampler", e))?
        };
        Ok(SamplerHandle(raw(sampler)))
    }

    fn destroy_sampler(&mut self, sampler: SamplerHandle) {
        unsafe {
            self.device
                .destroy_sampler(vk::Sampler::from_raw(sampler.as_raw()), None)
        };
    }

    fn create_image_descriptor(
        &mut self,
        image_view: ImageViewHandle,
        sampler: SamplerHandle,
    ) -> StrataResult<DescriptorSetHandle> {
        let set = self.descriptors.create_image_set(
            &self.device,
            view(image_view),
            vk::Sampler::from_raw(sampler.as_raw()),
        )?;
        Ok(DescriptorSetHandle(raw(set)))
    }

    fn create_buffer_descriptor(
        &mut self,
        handle: BufferHandle,
        range: u64,
        kind: BufferDescriptorKind,
    ) -> StrataResult<DescriptorSetHandle> {
        let set = self
            .descriptors
            .create_buffer_set(&self.device, buffer(handle), range, kind)?;
        Ok(DescriptorSetHandle(raw(set)))
    }

    fn destroy_descriptor_set(&mut self, set: DescriptorSetHandle) {
        self.descriptors
            .free(&self.device, vk::DescriptorSet::from_raw(set.as_raw()));
    }

    // ===== SYNCHRONIZATION =====

    fn create_fence(&mut self, signaled: bool) -> StrataResult<FenceHandle> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let info = vk::FenceCreateInfo::default().flags(flags);
        let created = unsafe {
            self.device
                .create_fence(&info, None)
                .map_err(|e| vk_error("Failed to create fence", e))?
        };
        Ok(FenceHandle(raw(created)))
    }

    fn wait_fence(&mut self, handle: FenceHandle, timeout_ns: u64) -> StrataResult<FenceStatus> {
        let result = unsafe { self.device.wait_for_fences(&[fence(handle)], true, timeout_ns) };
        match fence_status_from_vk(result) {
            Some(status) => Ok(status),
            None => match result {
                Err(e) => Err(vk_error("Failed to wait for fence", e)),
                Ok(()) => Ok(FenceStatus::Signaled),
            },
        }
    }

    fn reset_fence(&mut self, handle: FenceHandle) -> StrataResult<()> {
        unsafe {
            self.device
                .reset_fences(&[fence(handle)])
                .map_err(|e| vk_error("Failed to reset fence", e))
        }
    }

    fn destroy_fence(&mut self, handle: FenceHandle) {
        unsafe { self.device.destroy_fence(fence(handle), None) };
    }

    fn create_semaphore(&mut self) -> StrataResult<SemaphoreHandle> {
        let info = vk::SemaphoreCreateInfo::default();
        let created = unsafe {
            self.device
                .create_semaphore(&info, None)
                .map_err(|e| vk_error("Failed to create semaphore", e))?
        };
        Ok(SemaphoreHandle(raw(created)))
    }

    fn destroy_semaphore(&mut self, handle: SemaphoreHandle) {
        unsafe { self.device.destroy_semaphore(semaphore(handle), None) };
    }

    // ===== COMMAND BUFFERS =====

    fn allocate_command_buffer(&mut self) -> StrataResult<CommandBufferHandle> {
        let info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let buffers = unsafe {
            self.device
                .allocate_command_buffers(&info)
                .map_err(|e| vk_error("Failed to allocate command buffer", e))?
        };
        buffers
            .first()
            .map(|cb| CommandBufferHandle(raw(*cb)))
            .ok_or_else(|| engine_err!("strata::vulkan", "Command buffer allocation returned nothing"))
    }

    fn free_command_buffer(&mut self, cb: CommandBufferHandle) {
        unsafe {
            self.device
                .free_command_buffers(self.command_pool, &[command_buffer(cb)])
        };
    }

    fn begin_command_buffer(&mut self, cb: CommandBufferHandle) -> StrataResult<()> {
        let cb = command_buffer(cb);
        let info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            self.device
                .reset_command_buffer(cb, vk::CommandBufferResetFlags::empty())
                .map_err(|e| vk_error("Failed to reset command buffer", e))?;
            self.device
                .begin_command_buffer(cb, &info)
                .map_err(|e| vk_error("Failed to begin command buffer", e))
        }
    }

    fn end_command_buffer(&mut self, cb: CommandBufferHandle) -> StrataResult<()> {
        unsafe {
            self.device
                .end_command_buffer(command_buffer(cb))
                .map_err(|e| vk_error("Failed to end command buffer", e))
        }
    }

    fn reset_command_buffer(&mut self, cb: CommandBufferHandle) -> StrataResult<()> {
        unsafe {
            self.device
                .reset_command_buffer(command_buffer(cb), vk::CommandBufferResetFlags::empty())
                .map_err(|e| vk_error("Failed to reset command buffer", e))
        }
    }

    fn cmd_begin_render_pass(&mut self, cb: CommandBufferHandle, begin: &RenderPassBegin) {
        let clear_values: Vec<vk::ClearValue> = begin.clear_values.iter().map(clear_value_to_vk).collect();
        let info = vk::RenderPassBeginInfo::default()
            .render_pass(vk::RenderPass::from_raw(begin.render_pass.as_raw()))
            .framebuffer(vk::Framebuffer::from_raw(begin.framebuffer.as_raw()))
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: vk::Extent2D { width: begin.width, height: begin.height },
            })
            .clear_values(&clear_values);
        unsafe {
            self.device
                .cmd_begin_render_pass(command_buffer(cb), &info, vk::SubpassContents::INLINE)
        };
    }

    fn cmd_end_render_pass(&mut self, cb: CommandBufferHandle) {
        unsafe { self.device.cmd_end_render_pass(command_buffer(cb)) };
    }

    fn cmd_bind_pipeline(&mut self, cb: CommandBufferHandle, pipeline: PipelineHandle) {
        unsafe {
            self.device.cmd_bind_pipeline(
                command_buffer(cb),
                vk::PipelineBindPoint::GRAPHICS,
                vk::Pipeline::from_raw(pipeline.as_raw()),
            )
        };
    }

    fn cmd_bind_descriptor_sets(
        &mut self,
        cb: CommandBufferHandle,
        layout: PipelineLayoutKind,
        first_set: u32,
        sets: &[DescriptorSetHandle],
        dynamic_offsets: &[u32],
    ) {
        let sets: Vec<vk::DescriptorSet> = sets
            .iter()
            .map(|set| vk::DescriptorSet::from_raw(set.as_raw()))
            .collect();
        unsafe {
            self.device.cmd_bind_descriptor_sets(
                command_buffer(cb),
                vk::PipelineBindPoint::GRAPHICS,
                self.descriptors.pipeline_layout(layout),
                first_set,
                &sets,
                dynamic_offsets,
            )
        };
    }

    fn cmd_bind_vertex_buffers(
        &mut self,
        cb: CommandBufferHandle,
        first_binding: u32,
        buffers: &[BufferHandle],
        offsets: &[u64],
    ) {
        let buffers: Vec<vk::Buffer> = buffers.iter().map(|b| buffer(*b)).collect();
        unsafe {
            self.device
                .cmd_bind_vertex_buffers(command_buffer(cb), first_binding, &buffers, offsets)
        };
    }

    fn cmd_bind_index_buffer(
        &mut self,
        cb: CommandBufferHandle,
        handle: BufferHandle,
        offset: u64,
        index_type: IndexType,
    ) {
        unsafe {
            self.device.cmd_bind_index_buffer(
                command_buffer(cb),
                buffer(handle),
                offset,
                index_type_to_vk(index_type),
            )
        };
    }

    fn cmd_set_viewport(&mut self, cb: CommandBufferHandle, viewport: &Viewport) {
        let viewport = vk::Viewport {
            x: viewport.x,
            y: viewport.y,
            width: viewport.width,
            height: viewport.height,
            min_depth: viewport.min_depth,
            max_depth: viewport.max_depth,
        };
        unsafe { self.device.cmd_set_viewport(command_buffer(cb), 0, &[viewport]) };
    }

    fn cmd_set_scissor(&mut self, cb: CommandBufferHandle, scissor: &Rect2D) {
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: scissor.x, y: scissor.y },
            extent: vk::Extent2D { width: scissor.width, height: scissor.height },
        };
        unsafe { self.device.cmd_set_scissor(command_buffer(cb), 0, &[scissor]) };
    }

    fn cmd_draw(&mut self, cb: CommandBufferHandle, vertex_count: u32, first_vertex: u32) {
        unsafe { self.device.cmd_draw(command_buffer(cb), vertex_count, 1, first_vertex, 0) };
    }

    fn cmd_draw_indexed(
        &mut self,
        cb: CommandBufferHandle,
        index_count: u32,
        first_index: u32,
        vertex_offset: i32,
    ) {
        unsafe {
            self.device
                .cmd_draw_indexed(command_buffer(cb), index_count, 1, first_index, vertex_offset, 0)
        };
    }

    fn cmd_transition_images(&mut self, cb: CommandBufferHandle, transitions: &[ImageTransition]) {
        record_transitions(&self.device, command_buffer(cb), transitions);
    }

    fn cmd_copy_buffer_to_image(
        &mut self,
        cb: CommandBufferHandle,
        source: BufferHandle,
        target: ImageHandle,
        regions: &[BufferImageCopy],
    ) {
        let regions: Vec<vk::BufferImageCopy> = regions.iter().map(buffer_image_copy_to_vk).collect();
        unsafe {
            self.device.cmd_copy_buffer_to_image(
                command_buffer(cb),
                buffer(source),
                image(target),
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &regions,
            )
        };
    }

    fn cmd_copy_image(
        &mut self,
        cb: CommandBufferHandle,
        src: ImageHandle,
        src_extent: (u32, u32),
        dst: ImageHandle,
        dst_extent: (u32, u32),
    ) {
        record_copy_image(&self.device, command_buffer(cb), image(src), src_extent, image(dst), dst_extent);
    }

    // ===== SUBMISSION =====

    fn submit(
        &mut self,
        cb: CommandBufferHandle,
        wait: Option<SemaphoreHandle>,
        signal: Option<SemaphoreHandle>,
        fence_handle: Option<FenceHandle>,
    ) -> StrataResult<()> {
        let command_buffers = [command_buffer(cb)];
        let wait_semaphores: Vec<vk::Semaphore> = wait.into_iter().map(semaphore).collect();
        let wait_stages: Vec<vk::PipelineStageFlags> = wait_semaphores
            .iter()
            .map(|_| vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .collect();
        let signal_semaphores: Vec<vk::Semaphore> = signal.into_iter().map(semaphore).collect();
        let info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);
        let fence_handle = fence_handle.map(fence).unwrap_or_else(vk::Fence::null);
        unsafe {
            self.device
                .queue_submit(self.queue, &[info], fence_handle)
                .map_err(|e| vk_error("Failed to submit command buffer", e))
        }
    }

    fn wait_idle(&mut self) -> StrataResult<()> {
        unsafe {
            self.device
                .device_wait_idle()
                .map_err(|e| vk_error("Failed to wait for device idle", e))
        }
    }

    // ===== SWAPCHAIN =====

    fn create_swapchain(&mut self) -> StrataResult<SwapchainInfo> {
        self.destroy_swapchain();
        let swapchain = Swapchain::new(&SurfaceContext {
            device: &self.device,
            physical_device: self.physical_device,
            surface: self.surface,
            surface_loader: &self.surface_loader,
            swapchain_loader: &self.swapchain_loader,
            window_extent: self.window_extent,
            vsync: self.vsync,
        })?;
        let info = SwapchainInfo {
            images: swapchain.images.iter().map(|i| ImageHandle(raw(*i))).collect(),
            views: swapchain.views.iter().map(|v| ImageViewHandle(raw(*v))).collect(),
            format: swapchain.format,
            width: swapchain.extent.width,
            height: swapchain.extent.height,
        };
        self.swapchain = Some(swapchain);
        Ok(info)
    }

    fn destroy_swapchain(&mut self) {
        if let Some(swapchain) = self.swapchain.take() {
            swapchain.destroy(&self.device, &self.swapchain_loader);
        }
    }

    fn acquire_next_image(&mut self, signal: SemaphoreHandle, timeout_ns: u64) -> StrataResult<AcquireStatus> {
        match self.swapchain.as_ref() {
            Some(swapchain) => swapchain.acquire(&self.swapchain_loader, semaphore(signal), timeout_ns),
            None => {
                engine_warn!("strata::vulkan", "Acquire without a swapchain");
                Ok(AcquireStatus::OutOfDate)
            }
        }
    }

    fn present(&mut self, image_index: u32, wait: SemaphoreHandle) -> StrataResult<PresentStatus> {
        match self.swapchain.as_ref() {
            Some(swapchain) => {
                swapchain.present(&self.swapchain_loader, self.queue, image_index, semaphore(wait))
            }
            None => Ok(PresentStatus::OutOfDate),
        }
    }
}

impl Drop for VulkanGraphicsDevice {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();
        }
        self.destroy_swapchain();
        for (_, host) in self.buffers.drain() {
            host.destroy(&self.device, &mut self.allocator);
        }
        self.shaders.destroy(&self.device);
        self.descriptors.destroy(&self.device);
        unsafe {
            self.device.destroy_command_pool(self.command_pool, None);
            // free allocator pages while the device is still alive
            ManuallyDrop::drop(&mut self.allocator);
        }
        if !self.images.is_empty() || !self.memories.is_empty() {
            engine_warn!(
                "strata::vulkan",
                "Device dropped with {} images and {} allocations still live",
                self.images.len(),
                self.memories.len()
            );
        }
    }
}
