/// Mock graphics device for unit tests (no GPU required)
///
/// Hands out sequential handles, records every call as a string event, keeps
/// buffer contents and fence states, and replays scripted swapchain and fence
/// outcomes so frame-pacing paths can be exercised deterministically.

use std::collections::VecDeque;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{StrataError, StrataResult};
use crate::graphics_device::{
    AcquireStatus, BufferDescriptorKind, BufferHandle, BufferImageCopy, BufferUsage,
    CommandBufferHandle, DescriptorSetHandle, DeviceFormats, DeviceLimits, FenceHandle,
    FenceStatus, FramebufferDesc, FramebufferHandle, GraphicsDevice, ImageDesc, ImageFormat,
    ImageHandle, ImageTransition, ImageViewDesc, ImageViewHandle, IndexType, MappedImage,
    MemoryHandle, MemoryProperties, MemoryRequirements, PipelineHandle, PresentStatus, Rect2D,
    RenderPassBegin, RenderPassDesc, RenderPassHandle, SamplerHandle, SemaphoreHandle,
    SwapchainInfo, Viewport,
};
use crate::pipeline::{PipelineDefinition, PipelineLayoutKind, PipelineTarget};
use crate::render_pass::RenderPassKind;
use crate::texture::SamplerDef;

// ============================================================================
// Mock objects
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFenceState {
    Unsignaled,
    /// Submitted, completes on the next wait
    Pending,
    Signaled,
}

#[derive(Debug, Clone)]
pub struct MockImage {
    pub desc: ImageDesc,
    /// Bound memory block and offset
    pub binding: Option<(MemoryHandle, u64)>,
}

#[derive(Debug, Clone)]
pub struct MockMemory {
    pub size: u64,
    pub memory_type: u32,
    pub dedicated: Option<ImageHandle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockSubmit {
    pub cb: CommandBufferHandle,
    pub wait: Option<SemaphoreHandle>,
    pub signal: Option<SemaphoreHandle>,
    pub fence: Option<FenceHandle>,
}

// ============================================================================
// Mock device
// ============================================================================

pub struct MockGraphicsDevice {
    next_handle: u64,
    /// Every call, in order
    pub events: Vec<String>,
    pub memory_types: Vec<MemoryProperties>,
    pub formats: DeviceFormats,
    pub limits: DeviceLimits,
    /// Alignment reported for every image
    pub image_alignment: u64,
    pub images: FxHashMap<ImageHandle, MockImage>,
    pub memory: FxHashMap<MemoryHandle, MockMemory>,
    pub buffers: FxHashMap<BufferHandle, Vec<u8>>,
    pub render_passes: FxHashMap<RenderPassHandle, RenderPassDesc>,
    pub pipelines: FxHashMap<PipelineHandle, (PipelineDefinition, RenderPassKind)>,
    pub fences: FxHashMap<FenceHandle, MockFenceState>,
    pub submits: Vec<MockSubmit>,
    /// Every live (created, not destroyed) handle
    pub live: FxHashSet<u64>,
    pub swapchain_width: u32,
    pub swapchain_height: u32,
    pub swapchain_image_count: u32,
    pub swapchains_created: u32,
    swapchain: Option<SwapchainInfo>,
    next_image_index: u32,
    /// Outcomes returned by upcoming acquires before falling back to round robin
    pub acquire_script: VecDeque<AcquireStatus>,
    pub present_script: VecDeque<PresentStatus>,
    /// Outcomes returned by upcoming fence waits
    pub fence_wait_script: VecDeque<FenceStatus>,
    /// Contents returned by `read_linear_image`
    pub readback: Option<MappedImage>,
    /// Errors returned by upcoming submits
    pub submit_failures: VecDeque<StrataError>,
}

impl MockGraphicsDevice {
    pub fn new() -> Self {
        Self {
            next_handle: 1,
            events: Vec::new(),
            memory_types: vec![
                MemoryProperties::DEVICE_LOCAL,
                MemoryProperties::HOST_VISIBLE | MemoryProperties::HOST_COHERENT,
                MemoryProperties::HOST_VISIBLE
                    | MemoryProperties::HOST_COHERENT
                    | MemoryProperties::HOST_CACHED,
                MemoryProperties::DEVICE_LOCAL | MemoryProperties::LAZILY_ALLOCATED,
            ],
            formats: DeviceFormats {
                color: ImageFormat::R8G8B8A8_UNORM,
                depth: ImageFormat::D24_UNORM_S8_UINT,
                capture: ImageFormat::R8G8B8A8_UNORM,
                bloom: ImageFormat::R16G16B16A16_UNORM,
            },
            limits: DeviceLimits {
                uniform_offset_alignment: 256,
                dedicated_allocation: true,
            },
            image_alignment: 256,
            images: FxHashMap::default(),
            memory: FxHashMap::default(),
            buffers: FxHashMap::default(),
            render_passes: FxHashMap::default(),
            pipelines: FxHashMap::default(),
            fences: FxHashMap::default(),
            submits: Vec::new(),
            live: FxHashSet::default(),
            swapchain_width: 640,
            swapchain_height: 480,
            swapchain_image_count: 3,
            swapchains_created: 0,
            swapchain: None,
            next_image_index: 0,
            acquire_script: VecDeque::new(),
            present_script: VecDeque::new(),
            fence_wait_script: VecDeque::new(),
            readback: None,
            submit_failures: VecDeque::new(),
        }
    }

    /// Drop the lazily-allocated memory type
    pub fn without_lazy_memory(mut self) -> Self {
        self.memory_types.retain(|p| !p.contains(MemoryProperties::LAZILY_ALLOCATED));
        self
    }

    fn next(&mut self) -> u64 {
        let id = self.next_handle;
        self.next_handle += 1;
        self.live.insert(id);
        id
    }

    fn release(&mut self, raw: u64) {
        self.live.remove(&raw);
    }

    fn log(&mut self, event: String) {
        self.events.push(event);
    }

    /// Number of events starting with `prefix`
    pub fn count(&self, prefix: &str) -> usize {
        self.events.iter().filter(|e| e.starts_with(prefix)).count()
    }

    /// Events starting with `prefix`, in order
    pub fn matching(&self, prefix: &str) -> Vec<String> {
        self.events.iter().filter(|e| e.starts_with(prefix)).cloned().collect()
    }

    /// Index of the first event equal to `event` at or after `from`
    pub fn position_from(&self, from: usize, event: &str) -> Option<usize> {
        self.events.iter().skip(from).position(|e| e == event).map(|p| p + from)
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    pub fn fence_state(&self, fence: FenceHandle) -> Option<MockFenceState> {
        self.fences.get(&fence).copied()
    }

    /// Byte size of an image including all mips and samples
    fn image_size(desc: &ImageDesc) -> u64 {
        let bpp = desc.format.bytes_per_pixel() as u64;
        let mut size = 0u64;
        for level in 0..desc.mip_levels.max(1) {
            let w = (desc.width >> level).max(1) as u64;
            let h = (desc.height >> level).max(1) as u64;
            size += w * h * bpp;
        }
        size * desc.samples.count() as u64
    }
}

impl Default for MockGraphicsDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn formats(&self) -> DeviceFormats {
        self.formats
    }

    fn limits(&self) -> DeviceLimits {
        self.limits
    }

    fn memory_types(&self) -> Vec<MemoryProperties> {
        self.memory_types.clone()
    }

    fn allocate_memory(
        &mut self,
        size: u64,
        memory_type: u32,
        dedicated: Option<ImageHandle>,
    ) -> StrataResult<MemoryHandle> {
        let handle = MemoryHandle(self.next());
        self.memory.insert(handle, MockMemory { size, memory_type, dedicated });
        self.log(format!("allocate_memory {} type={} dedicated={}", size, memory_type, dedicated.is_some()));
        Ok(handle)
    }

    fn free_memory(&mut self, memory: MemoryHandle) {
        self.memory.remove(&memory);
        self.release(memory.0);
        self.log(format!("free_memory {}", memory.0));
    }

    fn create_image(&mut self, desc: &ImageDesc) -> StrataResult<ImageHandle> {
        let handle = ImageHandle(self.next());
        self.images.insert(handle, MockImage { desc: *desc, binding: None });
        self.log(format!("create_image {}x{} {:?}", desc.width, desc.height, desc.format));
        Ok(handle)
    }

    fn image_memory_requirements(&self, image: ImageHandle) -> StrataResult<MemoryRequirements> {
        let mock = self
            .images
            .get(&image)
            .ok_or_else(|| StrataError::InvalidResource(format!("unknown image {}", image.0)))?;
        let type_bits = (1u32 << self.memory_types.len()) - 1;
        Ok(MemoryRequirements {
            size: Self::image_size(&mock.desc),
            alignment: self.image_alignment,
            type_bits,
        })
    }

    fn bind_image_memory(&mut self, image: ImageHandle, memory: MemoryHandle, offset: u64) -> StrataResult<()> {
        let mock = self
            .images
            .get_mut(&image)
            .ok_or_else(|| StrataError::InvalidResource(format!("unknown image {}", image.0)))?;
        mock.binding = Some((memory, offset));
        self.log(format!("bind_image_memory {} {} {}", image.0, memory.0, offset));
        Ok(())
    }

    fn create_image_view(&mut self, image: ImageHandle, _desc: &ImageViewDesc) -> StrataResult<ImageViewHandle> {
        let handle = ImageViewHandle(self.next());
        self.log(format!("create_image_view {}", image.0));
        Ok(handle)
    }

    fn destroy_image_view(&mut self, view: ImageViewHandle) {
        self.release(view.0);
        self.log(format!("destroy_image_view {}", view.0));
    }

    fn destroy_image(&mut self, image: ImageHandle) {
        self.images.remove(&image);
        self.release(image.0);
        self.log(format!("destroy_image {}", image.0));
    }

    fn read_linear_image(&mut self, image: ImageHandle, _memory: MemoryHandle) -> StrataResult<MappedImage> {
        self.log(format!("read_linear_image {}", image.0));
        if let Some(mapped) = &self.readback {
            return Ok(mapped.clone());
        }
        let desc = self
            .images
            .get(&image)
            .map(|m| m.desc)
            .ok_or_else(|| StrataError::InvalidResource(format!("unknown image {}", image.0)))?;
        let row_pitch = (desc.width * desc.format.bytes_per_pixel()) as u64;
        Ok(MappedImage {
            data: vec![0; (row_pitch * desc.height as u64) as usize],
            row_pitch,
        })
    }

    fn create_host_buffer(&mut self, size: u64, usage: BufferUsage) -> StrataResult<BufferHandle> {
        let handle = BufferHandle(self.next());
        self.buffers.insert(handle, vec![0; size as usize]);
        self.log(format!("create_host_buffer {} {:?}", size, usage));
        Ok(handle)
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) -> StrataResult<()> {
        let contents = self
            .buffers
            .get_mut(&buffer)
            .ok_or_else(|| StrataError::InvalidResource(format!("unknown buffer {}", buffer.0)))?;
        let start = offset as usize;
        let end = start + data.len();
        if end > contents.len() {
            return Err(StrataError::InvalidResource(format!(
                "write of {} bytes at {} overflows buffer of {}",
                data.len(), offset, contents.len()
            )));
        }
        contents[start..end].copy_from_slice(data);
        Ok(())
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer);
        self.release(buffer.0);
        self.log(format!("destroy_buffer {}", buffer.0));
    }

    fn create_render_pass(&mut self, desc: &RenderPassDesc) -> StrataResult<RenderPassHandle> {
        let handle = RenderPassHandle(self.next());
        self.render_passes.insert(handle, desc.clone());
        self.log(format!("create_render_pass {}", handle.0));
        Ok(handle)
    }

    fn destroy_render_pass(&mut self, render_pass: RenderPassHandle) {
        self.render_passes.remove(&render_pass);
        self.release(render_pass.0);
        self.log(format!("destroy_render_pass {}", render_pass.0));
    }

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> StrataResult<FramebufferHandle> {
        let handle = FramebufferHandle(self.next());
        self.log(format!(
            "create_framebuffer {}x{} attachments={}",
            desc.width, desc.height, desc.attachments.len()
        ));
        Ok(handle)
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        self.release(framebuffer.0);
        self.log(format!("destroy_framebuffer {}", framebuffer.0));
    }

    fn create_pipeline(
        &mut self,
        definition: &PipelineDefinition,
        target: &PipelineTarget,
    ) -> StrataResult<PipelineHandle> {
        let handle = PipelineHandle(self.next());
        self.pipelines.insert(handle, (*definition, target.kind));
        self.log(format!("create_pipeline {:?} {:?}", definition.shader, target.kind));
        Ok(handle)
    }

    fn destroy_pipeline(&mut self, pipeline: PipelineHandle) {
        self.pipelines.remove(&pipeline);
        self.release(pipeline.0);
        self.log(format!("destroy_pipeline {}", pipeline.0));
    }

    fn create_sampler(&mut self, def: &SamplerDef) -> StrataResult<SamplerHandle> {
        let handle = SamplerHandle(self.next());
        self.log(format!("create_sampler {:?}", def));
        Ok(handle)
    }

    fn destroy_sampler(&mut self, sampler: SamplerHandle) {
        self.release(sampler.0);
        self.log(format!("destroy_sampler {}", sampler.0));
    }

    fn create_image_descriptor(
        &mut self,
        view: ImageViewHandle,
        _sampler: SamplerHandle,
    ) -> StrataResult<DescriptorSetHandle> {
        let handle = DescriptorSetHandle(self.next());
        self.log(format!("create_image_descriptor {}", view.0));
        Ok(handle)
    }

    fn create_buffer_descriptor(
        &mut self,
        buffer: BufferHandle,
        range: u64,
        kind: BufferDescriptorKind,
    ) -> StrataResult<DescriptorSetHandle> {
        let handle = DescriptorSetHandle(self.next());
        self.log(format!("create_buffer_descriptor {} {} {:?}", buffer.0, range, kind));
        Ok(handle)
    }

    fn destroy_descriptor_set(&mut self, set: DescriptorSetHandle) {
        self.release(set.0);
        self.log(format!("destroy_descriptor_set {}", set.0));
    }

    fn create_fence(&mut self, signaled: bool) -> StrataResult<FenceHandle> {
        let handle = FenceHandle(self.next());
        let state = if signaled { MockFenceState::Signaled } else { MockFenceState::Unsignaled };
        self.fences.insert(handle, state);
        Ok(handle)
    }

    fn wait_fence(&mut self, fence: FenceHandle, _timeout_ns: u64) -> StrataResult<FenceStatus> {
        self.log(format!("wait_fence {}", fence.0));
        if let Some(status) = self.fence_wait_script.pop_front() {
            return Ok(status);
        }
        match self.fences.get(&fence).copied() {
            Some(MockFenceState::Pending) | Some(MockFenceState::Signaled) => {
                self.fences.insert(fence, MockFenceState::Signaled);
                Ok(FenceStatus::Signaled)
            }
            Some(MockFenceState::Unsignaled) => Ok(FenceStatus::Timeout),
            None => Err(StrataError::InvalidResource(format!("unknown fence {}", fence.0))),
        }
    }

    fn reset_fence(&mut self, fence: FenceHandle) -> StrataResult<()> {
        self.fences.insert(fence, MockFenceState::Unsignaled);
        self.log(format!("reset_fence {}", fence.0));
        Ok(())
    }

    fn destroy_fence(&mut self, fence: FenceHandle) {
        self.fences.remove(&fence);
        self.release(fence.0);
    }

    fn create_semaphore(&mut self) -> StrataResult<SemaphoreHandle> {
        Ok(SemaphoreHandle(self.next()))
    }

    fn destroy_semaphore(&mut self, semaphore: SemaphoreHandle) {
        self.release(semaphore.0);
    }

    fn allocate_command_buffer(&mut self) -> StrataResult<CommandBufferHandle> {
        Ok(CommandBufferHandle(self.next()))
    }

    fn free_command_buffer(&mut self, cb: CommandBufferHandle) {
        self.release(cb.0);
    }

    fn begin_command_buffer(&mut self, cb: CommandBufferHandle) -> StrataResult<()> {
        self.log(format!("begin_command_buffer {}", cb.0));
        Ok(())
    }

    fn end_command_buffer(&mut self, cb: CommandBufferHandle) -> StrataResult<()> {
        self.log(format!("end_command_buffer {}", cb.0));
        Ok(())
    }

    fn reset_command_buffer(&mut self, cb: CommandBufferHandle) -> StrataResult<()> {
        self.log(format!("reset_command_buffer {}", cb.0));
        Ok(())
    }

    fn cmd_begin_render_pass(&mut self, _cb: CommandBufferHandle, begin: &RenderPassBegin) {
        self.log(format!(
            "cmd_begin_render_pass {} {}x{}",
            begin.render_pass.0, begin.width, begin.height
        ));
    }

    fn cmd_end_render_pass(&mut self, _cb: CommandBufferHandle) {
        self.log("cmd_end_render_pass".to_string());
    }

    fn cmd_bind_pipeline(&mut self, _cb: CommandBufferHandle, pipeline: PipelineHandle) {
        self.log(format!("cmd_bind_pipeline {}", pipeline.0));
    }

    fn cmd_bind_descriptor_sets(
        &mut self,
        _cb: CommandBufferHandle,
        layout: PipelineLayoutKind,
        first_set: u32,
        sets: &[DescriptorSetHandle],
        dynamic_offsets: &[u32],
    ) {
        let count = sets.len() as u32;
        assert!(
            first_set + count <= layout.set_count(),
            "sets {}..{} outside the {:?} layout",
            first_set,
            first_set + count,
            layout
        );
        assert_eq!(
            dynamic_offsets.len(),
            layout.dynamic_offset_count(first_set, count),
            "dynamic offset count for {:?} sets {}..{}",
            layout,
            first_set,
            first_set + count
        );
        self.log(format!(
            "cmd_bind_descriptor_sets first={} count={} offsets={:?} layout={:?}",
            first_set,
            sets.len(),
            dynamic_offsets,
            layout
        ));
    }

    fn cmd_bind_vertex_buffers(
        &mut self,
        _cb: CommandBufferHandle,
        first_binding: u32,
        buffers: &[BufferHandle],
        offsets: &[u64],
    ) {
        self.log(format!(
            "cmd_bind_vertex_buffers first={} count={} offsets={:?}",
            first_binding,
            buffers.len(),
            offsets
        ));
    }

    fn cmd_bind_index_buffer(
        &mut self,
        _cb: CommandBufferHandle,
        _buffer: BufferHandle,
        offset: u64,
        index_type: IndexType,
    ) {
        self.log(format!("cmd_bind_index_buffer {} {:?}", offset, index_type));
    }

    fn cmd_set_viewport(&mut self, _cb: CommandBufferHandle, viewport: &Viewport) {
        self.log(format!(
            "cmd_set_viewport {}x{} depth={}..{}",
            viewport.width, viewport.height, viewport.min_depth, viewport.max_depth
        ));
    }

    fn cmd_set_scissor(&mut self, _cb: CommandBufferHandle, scissor: &Rect2D) {
        self.log(format!("cmd_set_scissor {}x{}", scissor.width, scissor.height));
    }

    fn cmd_draw(&mut self, _cb: CommandBufferHandle, vertex_count: u32, first_vertex: u32) {
        self.log(format!("cmd_draw {} {}", vertex_count, first_vertex));
    }

    fn cmd_draw_indexed(
        &mut self,
        _cb: CommandBufferHandle,
        index_count: u32,
        first_index: u32,
        vertex_offset: i32,
    ) {
        self.log(format!("cmd_draw_indexed {} {} {}", index_count, first_index, vertex_offset));
    }

    fn cmd_transition_images(&mut self, _cb: CommandBufferHandle, transitions: &[ImageTransition]) {
        for t in transitions {
            self.log(format!(
                "cmd_transition {} {:?}->{:?}",
                t.image.0, t.old_layout, t.new_layout
            ));
        }
    }

    fn cmd_copy_buffer_to_image(
        &mut self,
        _cb: CommandBufferHandle,
        buffer: BufferHandle,
        image: ImageHandle,
        regions: &[BufferImageCopy],
    ) {
        self.log(format!(
            "cmd_copy_buffer_to_image {} {} regions={}",
            buffer.0, image.0, regions.len()
        ));
    }

    fn cmd_copy_image(
        &mut self,
        _cb: CommandBufferHandle,
        src: ImageHandle,
        src_extent: (u32, u32),
        dst: ImageHandle,
        dst_extent: (u32, u32),
    ) {
        let op = if src_extent == dst_extent { "copy" } else { "blit" };
        self.log(format!("cmd_copy_image {} {} {}", op, src.0, dst.0));
    }

    fn submit(
        &mut self,
        cb: CommandBufferHandle,
        wait: Option<SemaphoreHandle>,
        signal: Option<SemaphoreHandle>,
        fence: Option<FenceHandle>,
    ) -> StrataResult<()> {
        if let Some(err) = self.submit_failures.pop_front() {
            self.log(format!("submit {} failed", cb.0));
            return Err(err);
        }
        if let Some(fence) = fence {
            self.fences.insert(fence, MockFenceState::Pending);
        }
        self.submits.push(MockSubmit { cb, wait, signal, fence });
        self.log(format!("submit {}", cb.0));
        Ok(())
    }

    fn wait_idle(&mut self) -> StrataResult<()> {
        for state in self.fences.values_mut() {
            if *state == MockFenceState::Pending {
                *state = MockFenceState::Signaled;
            }
        }
        self.log("wait_idle".to_string());
        Ok(())
    }

    fn create_swapchain(&mut self) -> StrataResult<SwapchainInfo> {
        let mut images = Vec::new();
        let mut views = Vec::new();
        for _ in 0..self.swapchain_image_count {
            images.push(ImageHandle(self.next()));
            views.push(ImageViewHandle(self.next()));
        }
        let info = SwapchainInfo {
            images,
            views,
            format: ImageFormat::B8G8R8A8_UNORM,
            width: self.swapchain_width,
            height: self.swapchain_height,
        };
        self.swapchain = Some(info.clone());
        self.swapchains_created += 1;
        self.next_image_index = 0;
        self.log("create_swapchain".to_string());
        Ok(info)
    }

    fn destroy_swapchain(&mut self) {
        if let Some(info) = self.swapchain.take() {
            for image in info.images {
                self.release(image.0);
            }
            for view in info.views {
                self.release(view.0);
            }
        }
        self.log("destroy_swapchain".to_string());
    }

    fn acquire_next_image(&mut self, _signal: SemaphoreHandle, _timeout_ns: u64) -> StrataResult<AcquireStatus> {
        self.log("acquire_next_image".to_string());
        if let Some(status) = self.acquire_script.pop_front() {
            return Ok(status);
        }
        let index = self.next_image_index;
        self.next_image_index = (index + 1) % self.swapchain_image_count.max(1);
        Ok(AcquireStatus::Acquired(index))
    }

    fn present(&mut self, image_index: u32, _wait: SemaphoreHandle) -> StrataResult<PresentStatus> {
        self.log(format!("present {}", image_index));
        Ok(self.present_script.pop_front().unwrap_or(PresentStatus::Presented))
    }
}
