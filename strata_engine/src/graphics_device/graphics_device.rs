/// GraphicsDevice trait - the seam between the frame core and a native API
///
/// The frame core never touches native objects directly: it drives a device
/// through copyable handles and explicit status values. A backend implements
/// this trait over an already-initialized device/queue/surface; the core owns
/// all policy (memory placement, caching, frame pacing).

use crate::error::StrataResult;
use crate::graphics_device::{
    AcquireStatus, BufferDescriptorKind, BufferHandle, BufferImageCopy, BufferUsage,
    CommandBufferHandle, DescriptorSetHandle, FenceHandle, FenceStatus, FramebufferDesc,
    FramebufferHandle, ImageDesc, ImageFormat, ImageHandle, ImageTransition,
    ImageViewDesc, ImageViewHandle, IndexType, MemoryHandle, MemoryProperties,
    MemoryRequirements, PipelineHandle, PresentStatus, Rect2D, RenderPassBegin, RenderPassDesc,
    RenderPassHandle, SamplerHandle, SemaphoreHandle, SwapchainInfo, Viewport,
};
use crate::pipeline::{PipelineDefinition, PipelineLayoutKind, PipelineTarget};
use crate::texture::SamplerDef;

/// Formats chosen by the device bootstrap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceFormats {
    /// Main color / resolve attachment format
    pub color: ImageFormat,
    pub depth: ImageFormat,
    /// Screenshot capture target format
    pub capture: ImageFormat,
    /// Bloom extract and blur cascade format
    pub bloom: ImageFormat,
}

/// Device limits the core needs for placement decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLimits {
    /// Minimum alignment of dynamic uniform/storage offsets
    pub uniform_offset_alignment: u64,
    /// Whether dedicated allocations are available
    pub dedicated_allocation: bool,
}

/// Host-mapped contents of a linear readback image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedImage {
    pub data: Vec<u8>,
    /// Bytes between the starts of consecutive rows
    pub row_pitch: u64,
}

/// Explicit graphics device driven by the frame core
pub trait GraphicsDevice {
    // ===== CAPABILITIES =====

    fn formats(&self) -> DeviceFormats;

    fn limits(&self) -> DeviceLimits;

    /// Property flags of each memory type, indexed by memory type index
    fn memory_types(&self) -> Vec<MemoryProperties>;

    // ===== MEMORY & IMAGES =====

    /// Allocate a block of device memory
    ///
    /// # Arguments
    ///
    /// * `size` - Size in bytes
    /// * `memory_type` - Memory type index
    /// * `dedicated` - Image the block is dedicated to, if any
    fn allocate_memory(
        &mut self,
        size: u64,
        memory_type: u32,
        dedicated: Option<ImageHandle>,
    ) -> StrataResult<MemoryHandle>;

    fn free_memory(&mut self, memory: MemoryHandle);

    fn create_image(&mut self, desc: &ImageDesc) -> StrataResult<ImageHandle>;

    fn image_memory_requirements(&self, image: ImageHandle) -> StrataResult<MemoryRequirements>;

    fn bind_image_memory(&mut self, image: ImageHandle, memory: MemoryHandle, offset: u64) -> StrataResult<()>;

    fn create_image_view(&mut self, image: ImageHandle, desc: &ImageViewDesc) -> StrataResult<ImageViewHandle>;

    fn destroy_image_view(&mut self, view: ImageViewHandle);

    fn destroy_image(&mut self, image: ImageHandle);

    /// Map a linear, host-visible image bound to `memory` and copy its texels out
    fn read_linear_image(&mut self, image: ImageHandle, memory: MemoryHandle) -> StrataResult<MappedImage>;

    // ===== BUFFERS =====

    /// Create a persistently mapped host-visible buffer
    fn create_host_buffer(&mut self, size: u64, usage: BufferUsage) -> StrataResult<BufferHandle>;

    /// Copy `data` into the mapped buffer at `offset`
    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) -> StrataResult<()>;

    fn destroy_buffer(&mut self, buffer: BufferHandle);

    // ===== PASSES & PIPELINES =====

    fn create_render_pass(&mut self, desc: &RenderPassDesc) -> StrataResult<RenderPassHandle>;

    fn destroy_render_pass(&mut self, render_pass: RenderPassHandle);

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> StrataResult<FramebufferHandle>;

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferHandle);

    /// Compile a pipeline for `definition` against one specific render pass
    fn create_pipeline(
        &mut self,
        definition: &PipelineDefinition,
        target: &PipelineTarget,
    ) -> StrataResult<PipelineHandle>;

    fn destroy_pipeline(&mut self, pipeline: PipelineHandle);

    // ===== SAMPLERS & DESCRIPTORS =====

    fn create_sampler(&mut self, def: &SamplerDef) -> StrataResult<SamplerHandle>;

    fn destroy_sampler(&mut self, sampler: SamplerHandle);

    /// Allocate a combined image/sampler descriptor set
    fn create_image_descriptor(
        &mut self,
        view: ImageViewHandle,
        sampler: SamplerHandle,
    ) -> StrataResult<DescriptorSetHandle>;

    /// Allocate a dynamic uniform or storage buffer descriptor set
    fn create_buffer_descriptor(
        &mut self,
        buffer: BufferHandle,
        range: u64,
        kind: BufferDescriptorKind,
    ) -> StrataResult<DescriptorSetHandle>;

    fn destroy_descriptor_set(&mut self, set: DescriptorSetHandle);

    // ===== SYNCHRONIZATION =====

    fn create_fence(&mut self, signaled: bool) -> StrataResult<FenceHandle>;

    /// Wait for `fence` at most `timeout_ns`
    fn wait_fence(&mut self, fence: FenceHandle, timeout_ns: u64) -> StrataResult<FenceStatus>;

    fn reset_fence(&mut self, fence: FenceHandle) -> StrataResult<()>;

    fn destroy_fence(&mut self, fence: FenceHandle);

    fn create_semaphore(&mut self) -> StrataResult<SemaphoreHandle>;

    fn destroy_semaphore(&mut self, semaphore: SemaphoreHandle);

    // ===== COMMAND BUFFERS =====

    fn allocate_command_buffer(&mut self) -> StrataResult<CommandBufferHandle>;

    fn free_command_buffer(&mut self, cb: CommandBufferHandle);

    /// Reset and begin one-time-submit recording
    fn begin_command_buffer(&mut self, cb: CommandBufferHandle) -> StrataResult<()>;

    fn end_command_buffer(&mut self, cb: CommandBufferHandle) -> StrataResult<()>;

    /// Discard recorded commands
    fn reset_command_buffer(&mut self, cb: CommandBufferHandle) -> StrataResult<()>;

    fn cmd_begin_render_pass(&mut self, cb: CommandBufferHandle, begin: &RenderPassBegin);

    fn cmd_end_render_pass(&mut self, cb: CommandBufferHandle);

    fn cmd_bind_pipeline(&mut self, cb: CommandBufferHandle, pipeline: PipelineHandle);

    /// Bind `sets` to consecutive set indices starting at `first_set`
    ///
    /// `layout` must be the layout of the pipeline that reads the sets;
    /// `dynamic_offsets` holds one entry per dynamic set in the range.
    fn cmd_bind_descriptor_sets(
        &mut self,
        cb: CommandBufferHandle,
        layout: PipelineLayoutKind,
        first_set: u32,
        sets: &[DescriptorSetHandle],
        dynamic_offsets: &[u32],
    );

    fn cmd_bind_vertex_buffers(
        &mut self,
        cb: CommandBufferHandle,
        first_binding: u32,
        buffers: &[BufferHandle],
        offsets: &[u64],
    );

    fn cmd_bind_index_buffer(
        &mut self,
        cb: CommandBufferHandle,
        buffer: BufferHandle,
        offset: u64,
        index_type: IndexType,
    );

    fn cmd_set_viewport(&mut self, cb: CommandBufferHandle, viewport: &Viewport);

    fn cmd_set_scissor(&mut self, cb: CommandBufferHandle, scissor: &Rect2D);

    fn cmd_draw(&mut self, cb: CommandBufferHandle, vertex_count: u32, first_vertex: u32);

    fn cmd_draw_indexed(
        &mut self,
        cb: CommandBufferHandle,
        index_count: u32,
        first_index: u32,
        vertex_offset: i32,
    );

    fn cmd_transition_images(&mut self, cb: CommandBufferHandle, transitions: &[ImageTransition]);

    fn cmd_copy_buffer_to_image(
        &mut self,
        cb: CommandBufferHandle,
        buffer: BufferHandle,
        image: ImageHandle,
        regions: &[BufferImageCopy],
    );

    /// Copy (equal extents) or blit (scaled) color image contents
    ///
    /// `src` must be in `TransferSrc` layout and `dst` in `TransferDst`.
    fn cmd_copy_image(
        &mut self,
        cb: CommandBufferHandle,
        src: ImageHandle,
        src_extent: (u32, u32),
        dst: ImageHandle,
        dst_extent: (u32, u32),
    );

    // ===== SUBMISSION =====

    /// Submit one command buffer
    ///
    /// # Arguments
    ///
    /// * `wait` - Semaphore waited on at color-attachment output
    /// * `signal` - Semaphore signaled on completion
    /// * `fence` - Fence signaled on completion
    fn submit(
        &mut self,
        cb: CommandBufferHandle,
        wait: Option<SemaphoreHandle>,
        signal: Option<SemaphoreHandle>,
        fence: Option<FenceHandle>,
    ) -> StrataResult<()>;

    fn wait_idle(&mut self) -> StrataResult<()>;

    // ===== SWAPCHAIN =====

    /// Create (or re-create after `destroy_swapchain`) the swapchain
    fn create_swapchain(&mut self) -> StrataResult<SwapchainInfo>;

    fn destroy_swapchain(&mut self);

    fn acquire_next_image(&mut self, signal: SemaphoreHandle, timeout_ns: u64) -> StrataResult<AcquireStatus>;

    fn present(&mut self, image_index: u32, wait: SemaphoreHandle) -> StrataResult<PresentStatus>;
}
