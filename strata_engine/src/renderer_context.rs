/// RendererContext - the frame API over one graphics device
///
/// Owns every frame-core component and drives them through the frame
/// bracket:
///
/// ```text
/// begin_frame
///     bind_pipeline / bind_geometry / bind_index / update_descriptor / draw_geometry ...
///     apply_bloom (optional, before overlay drawing)
/// end_frame
/// ```
///
/// A geometry ring overflow during recording silently drops the frame at
/// `end_frame`: the ring grows while the device is idle and the next
/// `begin_frame` records into the same slot with the same acquired image.

use crate::config::RendererConfig;
use crate::descriptor::{DescriptorBinding, DescriptorTracker};
use crate::error::{StrataError, StrataResult};
use crate::frame::{FrameController, FrameState, PresentOutcome};
use crate::geometry::{GeometryBatch, GeometryRing, TessFlags};
use crate::graphics_device::{
    BufferHandle, CommandBufferHandle, DescriptorSetHandle, GraphicsDevice, ImageFormat,
    ImageLayout, IndexType, PipelineHandle, Rect2D, SamplerHandle, SwapchainInfo, Viewport,
};
use crate::memory::ImageArena;
use crate::pipeline::{PipelineCache, PipelineDefinition, PipelineId, PipelineTarget};
use crate::render_pass::{
    AttachmentRole, PassExtents, PassParams, PostProcess, PostProcessPipelines, RenderPassGraph,
    RenderPassKind,
};
use crate::texture::{
    convert_readback, read_image, AddressMode, Filter, ReadbackSource, SamplerCache, SamplerDef,
    TextureImage, TextureKey, TextureStore, UploadRegion,
};
use crate::{engine_debug, engine_error, engine_info};

/// Swapchain rebuilds attempted by one `begin_frame` before giving up
const MAX_ACQUIRE_ATTEMPTS: u32 = 3;

/// Depth range of the viewport used by a draw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepthRange {
    Normal,
    /// Everything at the near plane (sky)
    ForceZero,
    /// Everything at the far plane
    ForceOne,
    /// First-person weapon, squeezed in front of the world
    Weapon,
}

impl DepthRange {
    /// `(min_depth, max_depth)` of the viewport
    pub fn bounds(&self) -> (f32, f32) {
        match self {
            DepthRange::Normal => (0.0, 1.0),
            DepthRange::ForceZero => (0.0, 0.0),
            DepthRange::ForceOne => (1.0, 1.0),
            DepthRange::Weapon => (0.0, 0.3),
        }
    }
}

/// Frame and resource counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RendererStats {
    pub frames_submitted: u64,
    /// Frames discarded by a geometry ring overflow
    pub frames_dropped: u64,
    pub swapchain_restarts: u64,
    /// Peak bytes appended to one ring slot in a frame
    pub vertex_buffer_max: u64,
    /// Bytes appended to the ring by the last submitted frame
    pub push_size: u64,
    /// Interned pipeline definitions
    pub pipelines: usize,
    pub attachment_chunks: usize,
    pub texture_chunks: usize,
}

pub struct RendererContext<D: GraphicsDevice> {
    device: D,
    config: RendererConfig,
    swapchain: SwapchainInfo,
    attachment_arena: ImageArena,
    attachment_sampler: SamplerHandle,
    samplers: SamplerCache,
    textures: TextureStore,
    /// 1x1 white texture bound to every texture slot at frame begin
    white_texture: TextureKey,
    pipelines: PipelineCache,
    post_pipelines: PostProcessPipelines,
    graph: RenderPassGraph,
    ring: GeometryRing,
    frames: FrameController,
    /// One per frame slot
    trackers: Vec<DescriptorTracker>,
    stats: RendererStats,

    // ===== RECORDING STATE (reset at frame begin) =====
    active_pass: Option<RenderPassKind>,
    /// Pipeline most recently bound through `bind_pipeline`
    last_pipeline: Option<PipelineId>,
    /// Native pipeline last bound in the command stream
    last_bound: Option<PipelineHandle>,
    index_binding: Option<(BufferHandle, u64)>,
    index_count: u32,
    vertex_count: u32,
    /// Depth range of the current viewport; `None` forces the next draw to set it
    depth_range: Option<DepthRange>,
    /// Requested scissor; `None` covers the whole pass
    scissor: Option<Rect2D>,
    bound_scissor: Option<Rect2D>,
    bloom_done: bool,
    capture_requested: bool,
    screen_map_requested: bool,
}

impl<D: GraphicsDevice> RendererContext<D> {
    /// Build every frame-core component over `device`
    ///
    /// Creates the swapchain, the attachment graph, the geometry ring, the
    /// frame slots and the default white texture, and interns the
    /// post-processing pipelines below the persistent watermark.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for a rejected configuration; any device failure is
    /// returned as is.
    pub fn new(mut device: D, config: RendererConfig) -> StrataResult<Self> {
        config.validate().map_err(|e| {
            engine_error!("strata::renderer", "{}", e);
            e
        })?;

        let limits = device.limits();
        let mut samplers = SamplerCache::new(config.max_samplers);
        let attachment_sampler = samplers.find_or_create(&mut device, &SamplerDef::attachment(Filter::Linear))?;

        let mut pipelines = PipelineCache::new(config.max_pipelines);
        let post_pipelines = PostProcessPipelines::register(&mut pipelines)?;
        pipelines.mark_persistent();

        let mut attachment_arena = ImageArena::new(
            "strata::arena",
            config.attachment_chunk_size,
            config.dedicated_allocation && limits.dedicated_allocation,
        );
        let swapchain = device.create_swapchain()?;
        let graph = Self::build_graph(&mut device, &mut attachment_arena, &config, &swapchain, attachment_sampler)?;

        let slot_count = config.frames_in_flight as usize;
        let ring = GeometryRing::new(&mut device, slot_count, config.geometry_buffer_size, config.geometry_alignment)?;
        let frames = FrameController::new(
            &mut device,
            config.frames_in_flight,
            swapchain.image_count(),
            config.fence_timeout_ns,
            config.acquire_timeout_ns,
        )?;

        let mut textures = TextureStore::new(config.image_chunk_size, config.staging_buffer_min);
        let white_texture = create_white_texture(&mut device, &mut textures, &mut samplers)?;

        engine_info!(
            "strata::renderer",
            "Renderer ready: {}x{}, {} frame slots, post-processing {}",
            swapchain.width,
            swapchain.height,
            slot_count,
            if config.post_processing { "on" } else { "off" }
        );

        Ok(Self {
            device,
            config,
            swapchain,
            attachment_arena,
            attachment_sampler,
            samplers,
            textures,
            white_texture,
            pipelines,
            post_pipelines,
            graph,
            ring,
            frames,
            trackers: vec![DescriptorTracker::new(); slot_count],
            stats: RendererStats::default(),
            active_pass: None,
            last_pipeline: None,
            last_bound: None,
            index_binding: None,
            index_count: 0,
            vertex_count: 0,
            depth_range: None,
            scissor: None,
            bound_scissor: None,
            bloom_done: false,
            capture_requested: false,
            screen_map_requested: false,
        })
    }

    fn build_graph(
        device: &mut D,
        arena: &mut ImageArena,
        config: &RendererConfig,
        swapchain: &SwapchainInfo,
        sampler: SamplerHandle,
    ) -> StrataResult<RenderPassGraph> {
        let params = PassParams::from_config(config, device.formats(), swapchain.format);
        let extents = PassExtents::new(swapchain.width, swapchain.height, &params, config.render_scale);
        RenderPassGraph::build(device, arena, params, extents, swapchain, sampler)
    }

    // ===== ACCESSORS =====

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn frame_state(&self) -> FrameState {
        self.frames.state()
    }

    /// Frame slot being (or about to be) recorded
    pub fn slot_index(&self) -> usize {
        self.frames.slot_index()
    }

    pub fn active_pass(&self) -> Option<RenderPassKind> {
        self.active_pass
    }

    pub fn graph(&self) -> &RenderPassGraph {
        &self.graph
    }

    pub fn pipeline_cache(&self) -> &PipelineCache {
        &self.pipelines
    }

    pub fn geometry_capacity(&self) -> u64 {
        self.ring.capacity()
    }

    pub fn white_texture(&self) -> TextureKey {
        self.white_texture
    }

    pub fn texture(&self, key: TextureKey) -> Option<&TextureImage> {
        self.textures.get(key)
    }

    /// Descriptor set sampling `key`, for `update_descriptor`
    pub fn texture_descriptor(&self, key: TextureKey) -> Option<DescriptorSetHandle> {
        self.textures.get(key).map(|t| t.descriptor)
    }

    /// Counters plus the live pipeline and chunk counts
    pub fn stats(&self) -> RendererStats {
        RendererStats {
            pipelines: self.pipelines.len(),
            attachment_chunks: self.attachment_arena.chunks().len(),
            texture_chunks: self.textures.arena().chunks().len(),
            ..self.stats
        }
    }

    // ===== FRAME BRACKET =====

    /// Start recording the next frame
    ///
    /// Waits for the slot's previous submission, acquires a presentable
    /// image (rebuilding the swapchain on an out-of-date surface), resets
    /// the slot's ring cursor and descriptor state and begins the main pass,
    /// or the screen map pass when one was requested. Calling it again before
    /// `end_frame` does nothing.
    ///
    /// # Errors
    ///
    /// `Timeout` if the slot fence or the acquire does not complete in time;
    /// `SurfaceOutOfDate` if the surface stays stale after repeated rebuilds.
    pub fn begin_frame(&mut self) -> StrataResult<()> {
        if self.frames.state() == FrameState::Recording {
            return Ok(());
        }

        self.frames.wait_for_slot(&mut self.device)?;

        let mut attempts = 0;
        while !self.frames.acquire_image(&mut self.device)? {
            attempts += 1;
            if attempts > MAX_ACQUIRE_ATTEMPTS {
                engine_error!(
                    "strata::frame",
                    "Surface still out of date after {} swapchain rebuilds",
                    MAX_ACQUIRE_ATTEMPTS
                );
                return Err(StrataError::SurfaceOutOfDate);
            }
            self.restart_swapchain()?;
        }

        self.frames.begin_recording(&mut self.device)?;

        let slot = self.frames.slot_index();
        self.ring.begin_slot(slot);
        self.last_pipeline = None;
        self.last_bound = None;
        self.index_binding = None;
        self.index_count = 0;
        self.vertex_count = 0;
        self.bound_scissor = None;
        self.bloom_done = false;

        let white = self.textures.require(self.white_texture)?.descriptor;
        let tracker = &mut self.trackers[slot];
        tracker.reset_all();
        for binding in [DescriptorBinding::Texture0, DescriptorBinding::Texture1, DescriptorBinding::Texture2] {
            tracker.set(binding, white);
        }

        let kind = if std::mem::take(&mut self.screen_map_requested) && self.graph.pass(RenderPassKind::ScreenMap).is_some() {
            RenderPassKind::ScreenMap
        } else {
            RenderPassKind::Main
        };
        self.begin_pass(kind)
    }

    /// Finish, submit and present the current frame
    ///
    /// With post-processing: bloom (unless already applied), capture when
    /// requested, and the gamma pass into the acquired image. A frame whose
    /// geometry overflowed the ring is dropped instead and the ring is grown.
    /// Does nothing when no frame was begun.
    pub fn end_frame(&mut self) -> StrataResult<()> {
        if self.frames.state() != FrameState::Recording {
            return Ok(());
        }
        let cb = self.frames.command_buffer();

        if self.ring.overflowed() {
            return self.drop_frame(cb);
        }

        if self.active_pass == Some(RenderPassKind::ScreenMap) {
            self.end_screen_map()?;
        }

        if self.config.post_processing {
            // nothing left to draw after bloom
            self.last_pipeline = None;
            self.apply_bloom()?;

            let image_index = self.frames.image_index();
            let capture = std::mem::take(&mut self.capture_requested);
            let present = self.frames.has_image();
            let mut post = PostProcess {
                device: &mut self.device,
                cb,
                graph: &self.graph,
                cache: &mut self.pipelines,
                pipelines: &self.post_pipelines,
                last_bound: &mut self.last_bound,
            };
            if capture {
                post.run_capture()?;
            }
            if present {
                post.run_gamma(image_index)?;
            }
        }

        self.device.cmd_end_render_pass(cb);
        self.active_pass = None;

        let used = self.ring.cursor();
        self.stats.push_size = used;
        self.stats.vertex_buffer_max = self.stats.vertex_buffer_max.max(used);

        self.frames.submit(&mut self.device)?;
        self.stats.frames_submitted += 1;

        let outcome = self.frames.present(&mut self.device)?;
        self.frames.finish_frame();
        if outcome == PresentOutcome::NeedsRestart {
            self.restart_swapchain()?;
        }
        Ok(())
    }

    /// Discard the recorded frame and grow the ring while the device is idle
    fn drop_frame(&mut self, cb: CommandBufferHandle) -> StrataResult<()> {
        if self.active_pass.take().is_some() {
            self.device.cmd_end_render_pass(cb);
        }
        self.frames.abort_recording(&mut self.device)?;
        self.device.wait_idle()?;
        self.ring.apply_growth(&mut self.device)?;
        self.stats.frames_dropped += 1;
        Ok(())
    }

    fn recording_cb(&self) -> StrataResult<CommandBufferHandle> {
        if self.frames.state() != FrameState::Recording {
            return Err(StrataError::InvalidResource("no frame is being recorded".to_string()));
        }
        Ok(self.frames.command_buffer())
    }

    fn begin_pass(&mut self, kind: RenderPassKind) -> StrataResult<()> {
        let cb = self.frames.command_buffer();
        let begin = self
            .graph
            .begin_info(kind, self.frames.image_index())
            .ok_or_else(|| StrataError::InvalidResource(format!("no framebuffer for {:?}", kind)))?;
        self.device.cmd_begin_render_pass(cb, &begin);
        self.active_pass = Some(kind);
        self.depth_range = None;
        self.bound_scissor = None;
        Ok(())
    }

    fn active_target(&self) -> StrataResult<PipelineTarget> {
        self.active_pass
            .and_then(|kind| self.graph.target(kind))
            .ok_or_else(|| StrataError::InvalidResource("no render pass is active".to_string()))
    }

    // ===== DRAWING =====

    /// Intern `definition` and bind it for the active pass
    ///
    /// The native pipeline for this pass is compiled on first use; binding
    /// the pipeline that is already bound records nothing.
    pub fn bind_pipeline(&mut self, definition: &PipelineDefinition) -> StrataResult<PipelineId> {
        let cb = self.recording_cb()?;
        let id = self.pipelines.find_or_alloc(definition)?;
        let target = self.active_target()?;
        self.pipelines.bind(&mut self.device, cb, id, &target, &mut self.last_bound)?;
        self.last_pipeline = Some(id);
        Ok(id)
    }

    /// Append the streams of `batch` selected by `flags` and bind them
    ///
    /// `TessFlags::IDX` also appends and binds the batch's indices. After a
    /// ring overflow nothing is bound and draws are skipped until the frame
    /// is dropped.
    pub fn bind_geometry(&mut self, batch: &GeometryBatch, flags: TessFlags) -> StrataResult<()> {
        let cb = self.recording_cb()?;
        if flags.contains(TessFlags::IDX) {
            self.bind_index(&batch.indexes)?;
        }
        self.vertex_count = batch.vertex_count();
        if let Some(bindings) = self.ring.append_attributes(&mut self.device, batch, flags)? {
            let buffers = vec![bindings.buffer; bindings.offsets.len()];
            self.device.cmd_bind_vertex_buffers(cb, bindings.first_binding, &buffers, &bindings.offsets);
        }
        Ok(())
    }

    /// Append 32-bit indices and bind them unless the same range is bound
    pub fn bind_index(&mut self, indexes: &[u32]) -> StrataResult<()> {
        let cb = self.recording_cb()?;
        let Some(offset) = self.ring.append_indexes(&mut self.device, indexes)? else {
            self.index_count = 0;
            return Ok(());
        };
        let buffer = self
            .ring
            .buffer()
            .ok_or_else(|| StrataError::InvalidResource("geometry ring has no buffer".to_string()))?;
        if self.index_binding != Some((buffer, offset)) {
            self.device.cmd_bind_index_buffer(cb, buffer, offset, IndexType::U32);
            self.index_binding = Some((buffer, offset));
        }
        self.index_count = indexes.len() as u32;
        Ok(())
    }

    /// Restrict drawing to `scissor` (`None` = whole pass)
    pub fn set_scissor(&mut self, scissor: Option<Rect2D>) {
        self.scissor = scissor;
        self.depth_range = None;
    }

    /// Flush descriptor changes, update the viewport if needed, and draw
    ///
    /// Skipped once the ring has overflowed this frame.
    pub fn draw_geometry(&mut self, depth_range: DepthRange, indexed: bool) -> StrataResult<()> {
        let cb = self.recording_cb()?;
        if self.ring.overflowed() {
            return Ok(());
        }

        let slot = self.frames.slot_index();
        self.trackers[slot].flush(&mut self.device, cb);

        if self.depth_range != Some(depth_range) {
            self.apply_viewport(cb, depth_range)?;
        }

        if indexed {
            if self.index_count > 0 {
                self.device.cmd_draw_indexed(cb, self.index_count, 0, 0);
            }
        } else if self.vertex_count > 0 {
            self.device.cmd_draw(cb, self.vertex_count, 0);
        }
        Ok(())
    }

    fn apply_viewport(&mut self, cb: CommandBufferHandle, depth_range: DepthRange) -> StrataResult<()> {
        let kind = self
            .active_pass
            .ok_or_else(|| StrataError::InvalidResource("no render pass is active".to_string()))?;
        let (width, height) = self.graph.extent(kind);

        let scissor = self.scissor.unwrap_or(Rect2D { x: 0, y: 0, width, height });
        if self.bound_scissor != Some(scissor) {
            self.device.cmd_set_scissor(cb, &scissor);
            self.bound_scissor = Some(scissor);
        }

        let (min_depth, max_depth) = depth_range.bounds();
        self.device.cmd_set_viewport(
            cb,
            &Viewport {
                x: 0.0,
                y: 0.0,
                width: width as f32,
                height: height as f32,
                min_depth,
                max_depth,
            },
        );
        self.depth_range = Some(depth_range);
        Ok(())
    }

    // ===== DESCRIPTORS & UNIFORMS =====

    /// Bind `set` at `binding` for the next draw of the current slot
    pub fn update_descriptor(&mut self, binding: DescriptorBinding, set: DescriptorSetHandle) {
        let slot = self.frames.slot_index();
        self.trackers[slot].set(binding, set);
    }

    /// Set the dynamic offset of the storage or uniform binding
    pub fn update_descriptor_offset(&mut self, binding: DescriptorBinding, offset: u32) {
        let slot = self.frames.slot_index();
        self.trackers[slot].set_offset(binding, offset);
    }

    /// Append uniform data to the ring and point the uniform binding at it
    ///
    /// Returns the dynamic offset, or `None` after a ring overflow.
    pub fn push_uniform(&mut self, data: &[u8]) -> StrataResult<Option<u32>> {
        self.recording_cb()?;
        let alignment = self.device.limits().uniform_offset_alignment;
        let Some(offset) = self.ring.append_aligned(&mut self.device, data, alignment)? else {
            return Ok(None);
        };
        let set = self
            .ring
            .uniform_descriptor()
            .ok_or_else(|| StrataError::InvalidResource("geometry ring has no uniform descriptor".to_string()))?;
        let offset = offset as u32;
        self.update_descriptor(DescriptorBinding::Uniform, set);
        self.update_descriptor_offset(DescriptorBinding::Uniform, offset);
        Ok(Some(offset))
    }

    // ===== PASSES =====

    /// Run the bloom sub-graph now instead of at `end_frame`
    ///
    /// Leaves the post-bloom pass open for overlay drawing and restores the
    /// pipeline and descriptor sets the post-processing binds disturbed. Returns whether
    /// bloom ran: never during the screen map pass, and only once per frame.
    pub fn apply_bloom(&mut self) -> StrataResult<bool> {
        if self.frames.state() != FrameState::Recording
            || !self.config.bloom_active()
            || self.bloom_done
            || self.active_pass == Some(RenderPassKind::ScreenMap)
        {
            return Ok(false);
        }
        let cb = self.frames.command_buffer();

        PostProcess {
            device: &mut self.device,
            cb,
            graph: &self.graph,
            cache: &mut self.pipelines,
            pipelines: &self.post_pipelines,
            last_bound: &mut self.last_bound,
        }
        .run_bloom()?;
        self.active_pass = Some(RenderPassKind::PostBloom);
        self.bloom_done = true;
        self.depth_range = None;
        self.bound_scissor = None;

        // the sampler-only layouts disturbed every main-layout set
        self.trackers[self.frames.slot_index()].invalidate();

        if let Some(id) = self.last_pipeline {
            let target = self.active_target()?;
            self.pipelines.bind(&mut self.device, cb, id, &target, &mut self.last_bound)?;
        }
        engine_debug!("strata::renderer", "Bloom applied, draw state restored");
        Ok(true)
    }

    /// Render the capture pass at the next `end_frame` (post-processing only)
    pub fn request_capture(&mut self) {
        self.capture_requested = true;
    }

    /// Start the next frame in the screen map pass
    pub fn request_screen_map(&mut self) {
        self.screen_map_requested = true;
    }

    /// Leave the screen map pass and begin the main pass
    pub fn end_screen_map(&mut self) -> StrataResult<()> {
        if self.active_pass != Some(RenderPassKind::ScreenMap) {
            return Ok(());
        }
        let cb = self.recording_cb()?;
        self.device.cmd_end_render_pass(cb);
        self.begin_pass(RenderPassKind::Main)
    }

    pub fn set_minimized(&mut self, minimized: bool) {
        self.frames.set_minimized(minimized);
    }

    // ===== IMAGES =====

    /// Create a sampled image with repeating addressing
    pub fn create_image(&mut self, width: u32, height: u32, format: ImageFormat, mip_levels: u32) -> StrataResult<TextureKey> {
        self.create_image_with_address(width, height, format, mip_levels, AddressMode::Repeat)
    }

    pub fn create_image_with_address(
        &mut self,
        width: u32,
        height: u32,
        format: ImageFormat,
        mip_levels: u32,
        address_mode: AddressMode,
    ) -> StrataResult<TextureKey> {
        self.textures
            .create(&mut self.device, &mut self.samplers, width, height, format, mip_levels, address_mode)
    }

    /// Upload pixels already in the image's format
    pub fn upload_image_data(&mut self, image: TextureKey, region: &UploadRegion, pixels: &[u8]) -> StrataResult<()> {
        self.textures.upload(&mut self.device, image, region, pixels)
    }

    /// Upload RGBA8 pixels, converted to the image's format
    pub fn upload_image_rgba(&mut self, image: TextureKey, region: &UploadRegion, rgba: &[u8]) -> StrataResult<()> {
        self.textures.upload_rgba(&mut self.device, image, region, rgba)
    }

    /// Read the top-left `width` x `height` pixels as bottom-up RGB8
    ///
    /// Reads the capture image (filled by a frame ended after
    /// `request_capture`), else the resolved color image, else the
    /// presentable image of the last frame. Waits for the device.
    pub fn read_pixels(&mut self, buffer: &mut [u8], width: u32, height: u32) -> StrataResult<()> {
        if self.frames.state() == FrameState::Recording {
            return Err(StrataError::InvalidResource("read_pixels inside a frame".to_string()));
        }
        let (source, (max_width, max_height)) = self.readback_source()?;
        if width == 0 || height == 0 || width > max_width || height > max_height {
            return Err(StrataError::InvalidResource(format!(
                "readback of {}x{} from a {}x{} image",
                width, height, max_width, max_height
            )));
        }
        self.device.wait_idle()?;
        let mapped = read_image(&mut self.device, &source, width, height)?;
        convert_readback(&mapped, source.format, width, height, buffer)
    }

    fn readback_source(&self) -> StrataResult<(ReadbackSource, (u32, u32))> {
        let attachments = self.graph.attachments();
        for (role, layout) in [
            (AttachmentRole::Capture, ImageLayout::TransferSrc),
            (AttachmentRole::Color, ImageLayout::ShaderReadOnly),
        ] {
            if let Some(attachment) = attachments.get(role) {
                let source = ReadbackSource { image: attachment.image, layout, format: attachment.format };
                return Ok((source, (attachment.width, attachment.height)));
            }
        }

        let image = *self
            .swapchain
            .images
            .get(self.frames.image_index() as usize)
            .ok_or_else(|| StrataError::InvalidResource("no presentable image to read".to_string()))?;
        let source = ReadbackSource { image, layout: ImageLayout::PresentSrc, format: self.swapchain.format };
        Ok((source, (self.swapchain.width, self.swapchain.height)))
    }

    // ===== LIFETIME =====

    /// Rebuild the swapchain and everything sized by it
    ///
    /// Waits for the device, destroys the pass graph, its attachments and
    /// every native pipeline (definitions and ids survive), recreates the
    /// swapchain and the frame synchronization objects, and rebuilds the
    /// graph. A frame being recorded is discarded.
    pub fn restart_swapchain(&mut self) -> StrataResult<()> {
        if self.frames.state() == FrameState::Recording {
            let cb = self.frames.command_buffer();
            if self.active_pass.take().is_some() {
                self.device.cmd_end_render_pass(cb);
            }
            self.frames.abort_recording(&mut self.device)?;
        }
        self.device.wait_idle()?;

        self.graph.destroy(&mut self.device);
        self.attachment_arena.release_all(&mut self.device);
        self.pipelines.destroy_native(&mut self.device);
        self.last_bound = None;

        self.device.destroy_swapchain();
        self.swapchain = self.device.create_swapchain()?;
        self.frames.set_image_count(self.swapchain.image_count());
        self.frames.recreate_sync(&mut self.device)?;

        self.graph = Self::build_graph(
            &mut self.device,
            &mut self.attachment_arena,
            &self.config,
            &self.swapchain,
            self.attachment_sampler,
        )?;

        self.stats.swapchain_restarts += 1;
        engine_info!(
            "strata::renderer",
            "Swapchain restarted: {}x{}, {} images",
            self.swapchain.width,
            self.swapchain.height,
            self.swapchain.image_count()
        );
        Ok(())
    }

    /// Keep every pipeline interned so far across `release_resources`
    pub fn mark_persistent_pipelines(&mut self) -> PipelineId {
        self.pipelines.mark_persistent()
    }

    /// Free level resources between frames
    ///
    /// Destroys every texture (the white texture is recreated), releases the
    /// texture arena, releases pipelines above the persistent watermark and
    /// rewinds the geometry ring.
    pub fn release_resources(&mut self) -> StrataResult<()> {
        if self.frames.state() == FrameState::Recording {
            return Err(StrataError::InvalidResource("release_resources inside a frame".to_string()));
        }
        self.device.wait_idle()?;

        self.textures.release_all(&mut self.device);
        let watermark = self.pipelines.persistent_watermark();
        self.pipelines.release_since(&mut self.device, watermark);
        self.last_pipeline = None;
        self.last_bound = None;
        self.ring.begin_slot(self.frames.slot_index());
        self.stats.vertex_buffer_max = 0;
        self.stats.push_size = 0;

        self.white_texture = create_white_texture(&mut self.device, &mut self.textures, &mut self.samplers)?;
        engine_debug!(
            "strata::renderer",
            "Resources released, {} pipelines kept",
            self.pipelines.len()
        );
        Ok(())
    }

    /// Destroy every device object and hand the device back
    pub fn destroy(mut self) -> D {
        if let Err(e) = self.device.wait_idle() {
            engine_error!("strata::renderer", "wait_idle failed during shutdown: {}", e);
        }
        self.frames.destroy(&mut self.device);
        self.ring.destroy(&mut self.device);
        self.textures.destroy(&mut self.device);
        self.graph.destroy(&mut self.device);
        self.attachment_arena.release_all(&mut self.device);
        self.pipelines.release_since(&mut self.device, PipelineId(0));
        self.samplers.destroy(&mut self.device);
        self.device.destroy_swapchain();
        self.device
    }
}

fn create_white_texture<D: GraphicsDevice>(
    device: &mut D,
    textures: &mut TextureStore,
    samplers: &mut SamplerCache,
) -> StrataResult<TextureKey> {
    let key = textures.create(device, samplers, 1, 1, ImageFormat::R8G8B8A8_UNORM, 1, AddressMode::Repeat)?;
    let region = UploadRegion { x: 0, y: 0, width: 1, height: 1, mip_levels: 1 };
    textures.upload(device, key, &region, &[255; 4])?;
    Ok(key)
}

#[cfg(test)]
#[path = "renderer_context_tests.rs"]
mod tests;
