/// Post-processing sub-graph - bloom, capture and gamma
///
/// Every post-process step is a full-screen strip of four vertices reading
/// sampled attachments through descriptor sets bound from set 0 of the
/// pipeline's own sampler-only layout. The steps bind their pipelines and
/// descriptor sets directly, so the caller owns restoring whatever draw
/// state they disturbed.

use crate::error::{StrataError, StrataResult};
use crate::graphics_device::{
    CommandBufferHandle, DescriptorSetHandle, GraphicsDevice, PipelineHandle, Rect2D,
    RenderPassBegin, Viewport,
};
use crate::pipeline::{Blend, BlendFactor, PipelineCache, PipelineDefinition, PipelineId, ShaderVariant};
use crate::render_pass::{RenderPassGraph, RenderPassKind};

/// Interned ids of the post-processing pipelines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostProcessPipelines {
    pub bloom_extract: PipelineId,
    pub blur_horizontal: PipelineId,
    pub blur_vertical: PipelineId,
    /// Additive blend of the cascades into the main color target
    pub bloom_blend: PipelineId,
    pub capture: PipelineId,
    pub gamma: PipelineId,
}

impl PostProcessPipelines {
    /// Intern the post-processing definitions
    ///
    /// Call before marking the persistent watermark so level changes keep them.
    pub fn register(cache: &mut PipelineCache) -> StrataResult<Self> {
        let mut intern = |shader, blend| cache.find_or_alloc(&PipelineDefinition::post_process(shader, blend));
        Ok(Self {
            bloom_extract: intern(ShaderVariant::BloomExtract, None)?,
            blur_horizontal: intern(ShaderVariant::BlurHorizontal, None)?,
            blur_vertical: intern(ShaderVariant::BlurVertical, None)?,
            bloom_blend: intern(
                ShaderVariant::BloomBlend,
                Some(Blend { src: BlendFactor::One, dst: BlendFactor::One }),
            )?,
            capture: intern(ShaderVariant::Capture, None)?,
            gamma: intern(ShaderVariant::Gamma, None)?,
        })
    }
}

/// Recording context shared by the post-processing steps
pub struct PostProcess<'a, D: GraphicsDevice> {
    pub device: &'a mut D,
    pub cb: CommandBufferHandle,
    pub graph: &'a RenderPassGraph,
    pub cache: &'a mut PipelineCache,
    pub pipelines: &'a PostProcessPipelines,
    /// Last pipeline bound in the command stream
    pub last_bound: &'a mut Option<PipelineHandle>,
}

impl<'a, D: GraphicsDevice> PostProcess<'a, D> {
    /// End the open main pass and run extract, blur cascades and blend
    ///
    /// Leaves the post-bloom pass open so the frame can keep drawing on top
    /// of the blended image.
    pub fn run_bloom(&mut self) -> StrataResult<()> {
        let descriptors = self.graph.descriptors();
        let color = descriptors
            .color
            .ok_or_else(|| StrataError::InvalidResource("bloom without a color descriptor".to_string()))?;
        let bloom = descriptors.bloom.clone();

        self.device.cmd_end_render_pass(self.cb);

        let pipelines = *self.pipelines;
        let graph = self.graph;

        let extract = self.begin(graph.begin_info(RenderPassKind::BloomExtract, 0), RenderPassKind::BloomExtract)?;
        self.draw(pipelines.bloom_extract, RenderPassKind::BloomExtract, &extract, &[color])?;
        self.device.cmd_end_render_pass(self.cb);

        // blur n reads bloom image n and writes bloom image n + 1
        for index in 0..graph.blur_count() {
            let pipeline = if index % 2 == 0 { pipelines.blur_horizontal } else { pipelines.blur_vertical };
            let source = *bloom
                .get(index)
                .ok_or_else(|| StrataError::InvalidResource(format!("missing bloom descriptor {}", index)))?;
            let begin = self.begin(graph.blur_begin_info(index), RenderPassKind::Blur)?;
            self.draw(pipeline, RenderPassKind::Blur, &begin, &[source])?;
            self.device.cmd_end_render_pass(self.cb);
        }

        // vertical output of every cascade
        let cascades: Vec<DescriptorSetHandle> = (0..graph.params().bloom_passes as usize)
            .filter_map(|i| bloom.get((i + 1) * 2).copied())
            .collect();
        let post = self.begin(graph.begin_info(RenderPassKind::PostBloom, 0), RenderPassKind::PostBloom)?;
        self.draw(pipelines.bloom_blend, RenderPassKind::PostBloom, &post, &cascades)
    }

    /// End the open pass and resolve the color target into the capture image
    pub fn run_capture(&mut self) -> StrataResult<()> {
        let color = self.color_descriptor()?;
        self.device.cmd_end_render_pass(self.cb);
        let graph = self.graph;
        let begin = self.begin(graph.begin_info(RenderPassKind::Capture, 0), RenderPassKind::Capture)?;
        self.draw(self.pipelines.capture, RenderPassKind::Capture, &begin, &[color])
    }

    /// End the open pass and write the presentable image `image_index`
    pub fn run_gamma(&mut self, image_index: u32) -> StrataResult<()> {
        let color = self.color_descriptor()?;
        self.device.cmd_end_render_pass(self.cb);
        let graph = self.graph;
        let begin = self.begin(graph.begin_info(RenderPassKind::Gamma, image_index), RenderPassKind::Gamma)?;
        self.draw(self.pipelines.gamma, RenderPassKind::Gamma, &begin, &[color])
    }

    fn color_descriptor(&self) -> StrataResult<DescriptorSetHandle> {
        self.graph
            .descriptors()
            .color
            .ok_or_else(|| StrataError::InvalidResource("post-processing without a color descriptor".to_string()))
    }

    fn begin(&mut self, begin: Option<RenderPassBegin>, kind: RenderPassKind) -> StrataResult<RenderPassBegin> {
        let begin = begin.ok_or_else(|| StrataError::InvalidResource(format!("no framebuffer for {:?}", kind)))?;
        self.device.cmd_begin_render_pass(self.cb, &begin);
        Ok(begin)
    }

    fn draw(
        &mut self,
        id: PipelineId,
        kind: RenderPassKind,
        begin: &RenderPassBegin,
        sets: &[DescriptorSetHandle],
    ) -> StrataResult<()> {
        let target = self
            .graph
            .target(kind)
            .ok_or_else(|| StrataError::InvalidResource(format!("render pass {:?} not built", kind)))?;
        self.cache.bind(self.device, self.cb, id, &target, self.last_bound)?;
        let layout = self
            .cache
            .entry(id)
            .map(|entry| entry.definition.shader.layout())
            .ok_or_else(|| StrataError::InvalidResource(format!("unknown pipeline {:?}", id)))?;

        let viewport = Viewport {
            x: 0.0,
            y: 0.0,
            width: begin.width as f32,
            height: begin.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        self.device.cmd_set_viewport(self.cb, &viewport);
        self.device.cmd_set_scissor(self.cb, &Rect2D { x: 0, y: 0, width: begin.width, height: begin.height });
        self.device.cmd_bind_descriptor_sets(self.cb, layout, 0, sets, &[]);
        self.device.cmd_draw(self.cb, 4, 0);
        Ok(())
    }
}

#[cfg(test)]
#[path = "post_process_tests.rs"]
mod tests;
