/// Pipeline definitions - flat, structurally compared pipeline state
///
/// A `PipelineDefinition` is the cache key of the permutation cache: two
/// definitions with equal fields always resolve to the same cache entry.

use bitflags::bitflags;
use crate::config::MAX_BLOOM_PASSES;
use crate::descriptor::DescriptorBinding;
use crate::graphics_device::{RenderPassHandle, SampleCount};
use crate::render_pass::RenderPassKind;

/// Shader variant tag selecting the vertex/fragment module pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderVariant {
    SingleTexture,
    /// Single texture with identity (white) vertex color
    SingleTextureIdentity,
    MultiTextureMul,
    MultiTextureAdd,
    FixedColor,
    FogOnly,
    // post-processing
    BloomExtract,
    BlurHorizontal,
    BlurVertical,
    BloomBlend,
    Gamma,
    Capture,
}

impl ShaderVariant {
    /// Whether the variant draws a full-screen quad from a sampled attachment
    pub fn is_post_process(&self) -> bool {
        matches!(
            self,
            ShaderVariant::BloomExtract
                | ShaderVariant::BlurHorizontal
                | ShaderVariant::BlurVertical
                | ShaderVariant::BloomBlend
                | ShaderVariant::Gamma
                | ShaderVariant::Capture
        )
    }

    /// Pipeline layout the variant is compiled and bound against
    pub fn layout(&self) -> PipelineLayoutKind {
        match self {
            ShaderVariant::BloomBlend => PipelineLayoutKind::Blend,
            variant if variant.is_post_process() => PipelineLayoutKind::PostProcess,
            _ => PipelineLayoutKind::Main,
        }
    }
}

/// Pipeline layout selector
///
/// Descriptor sets must be bound through the layout of the pipeline that
/// reads them. Post-processing layouts hold sampler sets only, so they take
/// no dynamic offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineLayoutKind {
    /// `DescriptorBinding` order: storage, uniform, three textures, fog
    Main,
    /// One sampled attachment at set 0
    PostProcess,
    /// Up to `MAX_BLOOM_PASSES` sampled bloom cascades from set 0
    Blend,
}

impl PipelineLayoutKind {
    pub fn set_count(&self) -> u32 {
        match self {
            PipelineLayoutKind::Main => DescriptorBinding::COUNT as u32,
            PipelineLayoutKind::PostProcess => 1,
            PipelineLayoutKind::Blend => MAX_BLOOM_PASSES,
        }
    }

    /// Dynamic offsets expected when binding `count` sets from `first_set`
    pub fn dynamic_offset_count(&self, first_set: u32, count: u32) -> usize {
        match self {
            PipelineLayoutKind::Main => (first_set..first_set + count)
                .filter_map(|index| DescriptorBinding::from_index(index as usize))
                .filter(|binding| binding.is_dynamic())
                .count(),
            PipelineLayoutKind::PostProcess | PipelineLayoutKind::Blend => 0,
        }
    }
}

/// Blend factor applied to source or destination color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstColor,
    OneMinusDstColor,
    DstAlpha,
    OneMinusDstAlpha,
    SrcAlphaSaturate,
}

/// Additive blend equation `src * src_factor + dst * dst_factor`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Blend {
    pub src: BlendFactor,
    pub dst: BlendFactor,
}

bitflags! {
    /// Depth, alpha-test and raster state bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StateBits: u32 {
        const DEPTH_TEST_DISABLE = 0x01;
        const DEPTH_WRITE = 0x02;
        const DEPTH_FUNC_EQUAL = 0x04;
        const POLYMODE_LINE = 0x08;
        const ALPHA_TEST_GT_0 = 0x10;
        const ALPHA_TEST_LT_80 = 0x20;
        const ALPHA_TEST_GE_80 = 0x40;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullMode {
    None,
    Front,
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topology {
    TriangleList,
    TriangleStrip,
    LineList,
    PointList,
}

/// Stencil shadow phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShadowPhase {
    None,
    /// Stencil-only shadow volume edges
    Edges,
    /// Full-screen darkening quad masked by stencil
    FullscreenQuad,
}

/// Complete pipeline state compared by value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineDefinition {
    pub shader: ShaderVariant,
    pub blend: Option<Blend>,
    pub state_bits: StateBits,
    pub cull: CullMode,
    pub topology: Topology,
    pub polygon_offset: bool,
    /// Flip face winding for mirror/portal views
    pub mirror: bool,
    pub shadow_phase: ShadowPhase,
    pub line_width: u8,
    pub fog_stage: bool,
    pub abs_light: bool,
    pub allow_discard: bool,
}

impl Default for PipelineDefinition {
    fn default() -> Self {
        Self {
            shader: ShaderVariant::SingleTexture,
            blend: None,
            state_bits: StateBits::DEPTH_WRITE,
            cull: CullMode::Back,
            topology: Topology::TriangleList,
            polygon_offset: false,
            mirror: false,
            shadow_phase: ShadowPhase::None,
            line_width: 1,
            fog_stage: false,
            abs_light: false,
            allow_discard: false,
        }
    }
}

impl PipelineDefinition {
    /// Full-screen post-processing pipeline: no depth, no culling, strip of 4
    pub fn post_process(shader: ShaderVariant, blend: Option<Blend>) -> Self {
        Self {
            shader,
            blend,
            state_bits: StateBits::DEPTH_TEST_DISABLE,
            cull: CullMode::None,
            topology: Topology::TriangleStrip,
            ..Self::default()
        }
    }
}

/// Render pass a pipeline is compiled against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineTarget {
    pub kind: RenderPassKind,
    pub render_pass: RenderPassHandle,
    pub samples: SampleCount,
}
