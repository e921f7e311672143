/// RenderPassGraph - native render passes, framebuffers and attachment descriptors
///
/// Built from `PassParams` and the current swapchain; torn down and rebuilt
/// as a whole when the swapchain is restarted.

use crate::error::StrataResult;
use crate::graphics_device::{
    DescriptorSetHandle, FramebufferDesc, FramebufferHandle, GraphicsDevice, ImageViewHandle,
    RenderPassBegin, RenderPassHandle, SamplerHandle, SwapchainInfo,
};
use crate::memory::ImageArena;
use crate::pipeline::PipelineTarget;
use crate::render_pass::{
    clear_values, describe_pass, AttachmentRole, AttachmentSet, PassExtents, PassParams,
    RenderPassKind,
};
use crate::engine_debug;

/// Sampled views of the attachments, as descriptor sets
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AttachmentDescriptors {
    pub color: Option<DescriptorSetHandle>,
    pub screen_map: Option<DescriptorSetHandle>,
    /// One per bloom image
    pub bloom: Vec<DescriptorSetHandle>,
}

pub struct RenderPassGraph {
    params: PassParams,
    extents: PassExtents,
    passes: [Option<RenderPassHandle>; RenderPassKind::COUNT],
    /// One per swapchain image when rendering directly, otherwise a single offscreen one
    main_framebuffers: Vec<FramebufferHandle>,
    screen_map_framebuffer: Option<FramebufferHandle>,
    capture_framebuffer: Option<FramebufferHandle>,
    bloom_extract_framebuffer: Option<FramebufferHandle>,
    /// Two per cascade: horizontal then vertical
    blur_framebuffers: Vec<FramebufferHandle>,
    gamma_framebuffers: Vec<FramebufferHandle>,
    attachments: AttachmentSet,
    descriptors: AttachmentDescriptors,
}

impl RenderPassGraph {
    /// Create attachments, render passes, framebuffers and attachment descriptors
    ///
    /// # Arguments
    ///
    /// * `arena` - Attachment arena (flushed once for all attachments)
    /// * `swapchain` - Presentable images the gamma (or direct main) pass renders into
    /// * `sampler` - Sampler used for attachment descriptors
    pub fn build<D: GraphicsDevice>(
        device: &mut D,
        arena: &mut ImageArena,
        params: PassParams,
        extents: PassExtents,
        swapchain: &SwapchainInfo,
        sampler: SamplerHandle,
    ) -> StrataResult<Self> {
        let attachments = AttachmentSet::create(device, arena, &params, &extents)?;
        let mut graph = Self {
            params,
            extents,
            passes: [None; RenderPassKind::COUNT],
            main_framebuffers: Vec::new(),
            screen_map_framebuffer: None,
            capture_framebuffer: None,
            bloom_extract_framebuffer: None,
            blur_framebuffers: Vec::new(),
            gamma_framebuffers: Vec::new(),
            attachments,
            descriptors: AttachmentDescriptors::default(),
        };

        // partially built graphs are torn down by the caller through destroy()
        if let Err(err) = graph.create_objects(device, swapchain, sampler) {
            graph.destroy(device);
            return Err(err);
        }

        engine_debug!(
            "strata::render_pass",
            "Pass graph built: render {}x{}, window {}x{}, {} attachments",
            extents.render.0, extents.render.1, extents.window.0, extents.window.1,
            graph.attachments.len()
        );
        Ok(graph)
    }

    fn create_objects<D: GraphicsDevice>(
        &mut self,
        device: &mut D,
        swapchain: &SwapchainInfo,
        sampler: SamplerHandle,
    ) -> StrataResult<()> {
        for kind in RenderPassKind::ALL {
            if let Some(desc) = describe_pass(kind, &self.params) {
                self.passes[kind.index()] = Some(device.create_render_pass(&desc)?);
            }
        }

        let (rw, rh) = self.extents.render;
        let depth = self.attachments.require(AttachmentRole::Depth)?.view;

        let main = self.pass_handle(RenderPassKind::Main)?;
        if self.params.post_processing {
            let color = self.attachments.require(AttachmentRole::Color)?.view;
            let mut views = vec![];
            match self.attachments.get(AttachmentRole::Msaa) {
                Some(msaa) => views.extend([msaa.view, depth, color]),
                None => views.extend([color, depth]),
            }
            self.main_framebuffers.push(framebuffer(device, main, &views, (rw, rh))?);

            let gamma = self.pass_handle(RenderPassKind::Gamma)?;
            for view in &swapchain.views {
                let fb = framebuffer(device, gamma, &[*view], self.extents.window)?;
                self.gamma_framebuffers.push(fb);
            }

            let capture_pass = self.pass_handle(RenderPassKind::Capture)?;
            let capture = self.attachments.require(AttachmentRole::Capture)?.view;
            self.capture_framebuffer = Some(framebuffer(device, capture_pass, &[capture], (rw, rh))?);

            self.descriptors.color = Some(device.create_image_descriptor(color, sampler)?);
        } else {
            for view in &swapchain.views {
                let fb = framebuffer(device, main, &[*view, depth], self.extents.window)?;
                self.main_framebuffers.push(fb);
            }
        }

        if self.params.screen_map {
            let pass = self.pass_handle(RenderPassKind::ScreenMap)?;
            let color = self.attachments.require(AttachmentRole::ScreenMapColor)?.view;
            let depth = self.attachments.require(AttachmentRole::ScreenMapDepth)?.view;
            let views = match self.attachments.get(AttachmentRole::ScreenMapMsaa) {
                Some(msaa) => vec![msaa.view, depth, color],
                None => vec![color, depth],
            };
            self.screen_map_framebuffer = Some(framebuffer(device, pass, &views, self.extents.screen_map)?);
            self.descriptors.screen_map = Some(device.create_image_descriptor(color, sampler)?);
        }

        if self.params.bloom {
            let extract_pass = self.pass_handle(RenderPassKind::BloomExtract)?;
            let blur_pass = self.pass_handle(RenderPassKind::Blur)?;
            let count = 1 + 2 * self.params.bloom_passes as usize;
            let mut views = Vec::with_capacity(count);
            for index in 0..count {
                views.push(self.attachments.require(AttachmentRole::Bloom(index))?.view);
            }

            self.bloom_extract_framebuffer = Some(framebuffer(device, extract_pass, &[views[0]], (rw, rh))?);
            // blur framebuffer n writes bloom image n + 1
            for n in 0..count - 1 {
                let extent = self.extents.bloom_image(n + 1);
                let fb = framebuffer(device, blur_pass, &[views[n + 1]], extent)?;
                self.blur_framebuffers.push(fb);
            }
            for view in views {
                let set = device.create_image_descriptor(view, sampler)?;
                self.descriptors.bloom.push(set);
            }
        }

        Ok(())
    }

    fn pass_handle(&self, kind: RenderPassKind) -> StrataResult<RenderPassHandle> {
        self.passes[kind.index()].ok_or_else(|| {
            crate::error::StrataError::InvalidResource(format!("render pass {:?} not built", kind))
        })
    }

    pub fn params(&self) -> &PassParams {
        &self.params
    }

    pub fn extents(&self) -> &PassExtents {
        &self.extents
    }

    pub fn attachments(&self) -> &AttachmentSet {
        &self.attachments
    }

    pub fn descriptors(&self) -> &AttachmentDescriptors {
        &self.descriptors
    }

    /// Native render pass of `kind`, if it exists
    pub fn pass(&self, kind: RenderPassKind) -> Option<RenderPassHandle> {
        self.passes[kind.index()]
    }

    /// Compilation target for pipelines used inside `kind`
    pub fn target(&self, kind: RenderPassKind) -> Option<PipelineTarget> {
        self.pass(kind).map(|render_pass| PipelineTarget {
            kind,
            render_pass,
            samples: self.params.pass_samples(kind),
        })
    }

    /// Render area of `kind` (blur passes use `blur_extent`)
    pub fn extent(&self, kind: RenderPassKind) -> (u32, u32) {
        match kind {
            RenderPassKind::Main if !self.params.post_processing => self.extents.window,
            RenderPassKind::Gamma => self.extents.window,
            RenderPassKind::ScreenMap => self.extents.screen_map,
            _ => self.extents.render,
        }
    }

    pub fn blur_extent(&self, index: usize) -> (u32, u32) {
        self.extents.bloom_image(index + 1)
    }

    pub fn blur_count(&self) -> usize {
        self.blur_framebuffers.len()
    }

    /// Begin arguments of `kind`
    ///
    /// `image_index` selects the swapchain framebuffer for the gamma pass and
    /// for the main pass when rendering directly; blur passes go through
    /// `blur_begin_info`.
    pub fn begin_info(&self, kind: RenderPassKind, image_index: u32) -> Option<RenderPassBegin> {
        let framebuffer = match kind {
            RenderPassKind::Main | RenderPassKind::PostBloom => {
                let index = if self.main_framebuffers.len() > 1 { image_index as usize } else { 0 };
                self.main_framebuffers.get(index).copied()
            }
            RenderPassKind::ScreenMap => self.screen_map_framebuffer,
            RenderPassKind::BloomExtract => self.bloom_extract_framebuffer,
            RenderPassKind::Blur => self.blur_framebuffers.first().copied(),
            RenderPassKind::Capture => self.capture_framebuffer,
            RenderPassKind::Gamma => self.gamma_framebuffers.get(image_index as usize).copied(),
        }?;
        self.begin(kind, framebuffer, self.extent(kind))
    }

    /// Begin arguments of blur pass `index` (even = horizontal, odd = vertical)
    pub fn blur_begin_info(&self, index: usize) -> Option<RenderPassBegin> {
        let framebuffer = *self.blur_framebuffers.get(index)?;
        self.begin(RenderPassKind::Blur, framebuffer, self.blur_extent(index))
    }

    fn begin(
        &self,
        kind: RenderPassKind,
        framebuffer: FramebufferHandle,
        (width, height): (u32, u32),
    ) -> Option<RenderPassBegin> {
        let render_pass = self.pass(kind)?;
        let desc = describe_pass(kind, &self.params)?;
        Some(RenderPassBegin {
            render_pass,
            framebuffer,
            width,
            height,
            clear_values: clear_values(&desc),
        })
    }

    /// Destroy descriptors, framebuffers, render passes and attachment images
    ///
    /// Attachment memory stays with the arena until `release_all`.
    pub fn destroy<D: GraphicsDevice>(&mut self, device: &mut D) {
        let descriptors = std::mem::take(&mut self.descriptors);
        for set in descriptors.color.into_iter().chain(descriptors.screen_map).chain(descriptors.bloom) {
            device.destroy_descriptor_set(set);
        }

        let framebuffers = self
            .main_framebuffers
            .drain(..)
            .chain(self.gamma_framebuffers.drain(..))
            .chain(self.blur_framebuffers.drain(..))
            .chain(self.screen_map_framebuffer.take())
            .chain(self.capture_framebuffer.take())
            .chain(self.bloom_extract_framebuffer.take())
            .collect::<Vec<_>>();
        for fb in framebuffers {
            device.destroy_framebuffer(fb);
        }

        for pass in self.passes.iter_mut() {
            if let Some(handle) = pass.take() {
                device.destroy_render_pass(handle);
            }
        }

        self.attachments.destroy(device);
    }
}

fn framebuffer<D: GraphicsDevice>(
    device: &mut D,
    render_pass: RenderPassHandle,
    attachments: &[ImageViewHandle],
    (width, height): (u32, u32),
) -> StrataResult<FramebufferHandle> {
    device.create_framebuffer(&FramebufferDesc { render_pass, attachments, width, height })
}

#[cfg(test)]
#[path = "render_pass_graph_tests.rs"]
mod tests;
