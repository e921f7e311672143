/// Graphics pipeline construction from a `PipelineDefinition`
///
/// Every pipeline shares one pipeline layout (six descriptor sets, see
/// `vulkan_descriptor_set`) and takes viewport and scissor as dynamic state.
/// Alpha test, discard, fog and lighting sub-modes are passed to the shaders
/// as specialization constants so one module pair serves every permutation.

use ash::vk;
use strata_engine::engine_err;
use strata_engine::strata::render::{
    CullMode, PipelineDefinition, PipelineTarget, ShaderVariant, ShadowPhase, StateBits,
    VertexAttribute,
};
use strata_engine::strata::StrataResult;

use crate::vulkan_format::{blend_factor_to_vk, cull_mode_to_vk, sample_count_to_vk, topology_to_vk};
use crate::vulkan_shader::ShaderModules;

/// Constant depth bias applied to polygon-offset pipelines (decals)
const DEPTH_BIAS_CONSTANT: f32 = -1.0;
const DEPTH_BIAS_SLOPE: f32 = -2.0;

/// Specialization constant ids shared with the shaders
const SPEC_ALPHA_TEST: u32 = 0;
const SPEC_DISCARD: u32 = 1;
const SPEC_FOG: u32 = 2;
const SPEC_ABS_LIGHT: u32 = 3;

/// Vertex streams a definition reads, in binding order
pub(crate) fn vertex_attributes(def: &PipelineDefinition) -> Vec<VertexAttribute> {
    if def.shader.is_post_process() {
        // full-screen strip generated from the vertex index
        return Vec::new();
    }
    let mut attributes = match def.shader {
        ShaderVariant::FixedColor => vec![VertexAttribute::Position],
        ShaderVariant::SingleTextureIdentity | ShaderVariant::FogOnly => {
            vec![VertexAttribute::Position, VertexAttribute::TexCoord0]
        }
        ShaderVariant::MultiTextureMul | ShaderVariant::MultiTextureAdd => vec![
            VertexAttribute::Position,
            VertexAttribute::Color,
            VertexAttribute::TexCoord0,
            VertexAttribute::TexCoord1,
        ],
        _ => vec![VertexAttribute::Position, VertexAttribute::Color, VertexAttribute::TexCoord0],
    };
    if def.abs_light {
        attributes.push(VertexAttribute::Normal);
    }
    attributes
}

fn attribute_format(attribute: VertexAttribute) -> vk::Format {
    match attribute {
        VertexAttribute::Position | VertexAttribute::Normal => vk::Format::R32G32B32_SFLOAT,
        VertexAttribute::Color => vk::Format::R8G8B8A8_UNORM,
        VertexAttribute::TexCoord0 | VertexAttribute::TexCoord1 => vk::Format::R32G32_SFLOAT,
    }
}

/// One binding per attribute stream, location equal to binding
pub(crate) fn vertex_input_descriptions(
    attributes: &[VertexAttribute],
) -> (Vec<vk::VertexInputBindingDescription>, Vec<vk::VertexInputAttributeDescription>) {
    let bindings = attributes
        .iter()
        .map(|a| vk::VertexInputBindingDescription {
            binding: a.binding(),
            stride: a.element_size() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        })
        .collect();
    let descriptions = attributes
        .iter()
        .map(|a| vk::VertexInputAttributeDescription {
            location: a.binding(),
            binding: a.binding(),
            format: attribute_format(*a),
            offset: 0,
        })
        .collect();
    (bindings, descriptions)
}

/// Values of the specialization constants, indexed by constant id
pub(crate) fn specialization_values(def: &PipelineDefinition) -> [u32; 4] {
    let alpha_test = if def.state_bits.contains(StateBits::ALPHA_TEST_GT_0) {
        1
    } else if def.state_bits.contains(StateBits::ALPHA_TEST_LT_80) {
        2
    } else if def.state_bits.contains(StateBits::ALPHA_TEST_GE_80) {
        3
    } else {
        0
    };
    let mut values = [0u32; 4];
    values[SPEC_ALPHA_TEST as usize] = alpha_test;
    values[SPEC_DISCARD as usize] = def.allow_discard as u32;
    values[SPEC_FOG as usize] = def.fog_stage as u32;
    values[SPEC_ABS_LIGHT as usize] = def.abs_light as u32;
    values
}

pub(crate) fn rasterization_state(def: &PipelineDefinition) -> vk::PipelineRasterizationStateCreateInfo<'static> {
    let polygon_mode = if def.state_bits.contains(StateBits::POLYMODE_LINE) {
        vk::PolygonMode::LINE
    } else {
        vk::PolygonMode::FILL
    };
    // shadow volumes are drawn double sided
    let cull = if def.shadow_phase == ShadowPhase::Edges {
        CullMode::None
    } else {
        def.cull
    };
    // mirrored views flip the winding of every triangle
    let front_face = if def.mirror {
        vk::FrontFace::CLOCKWISE
    } else {
        vk::FrontFace::COUNTER_CLOCKWISE
    };
    vk::PipelineRasterizationStateCreateInfo::default()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(polygon_mode)
        .cull_mode(cull_mode_to_vk(cull))
        .front_face(front_face)
        .depth_bias_enable(def.polygon_offset)
        .depth_bias_constant_factor(if def.polygon_offset { DEPTH_BIAS_CONSTANT } else { 0.0 })
        .depth_bias_slope_factor(if def.polygon_offset { DEPTH_BIAS_SLOPE } else { 0.0 })
        .line_width(f32::from(def.line_width.max(1)))
}

fn stencil_state(fail: vk::StencilOp, pass: vk::StencilOp, compare: vk::CompareOp) -> vk::StencilOpState {
    vk::StencilOpState {
        fail_op: fail,
        pass_op: pass,
        depth_fail_op: vk::StencilOp::KEEP,
        compare_op: compare,
        compare_mask: 0xff,
        write_mask: 0xff,
        reference: 0,
    }
}

pub(crate) fn depth_stencil_state(def: &PipelineDefinition) -> vk::PipelineDepthStencilStateCreateInfo<'static> {
    let depth_test = !def.state_bits.contains(StateBits::DEPTH_TEST_DISABLE)
        && def.shadow_phase != ShadowPhase::FullscreenQuad;
    let depth_write = def.state_bits.contains(StateBits::DEPTH_WRITE) && def.shadow_phase == ShadowPhase::None;
    let compare = if def.state_bits.contains(StateBits::DEPTH_FUNC_EQUAL) {
        vk::CompareOp::EQUAL
    } else {
        vk::CompareOp::LESS_OR_EQUAL
    };

    let info = vk::PipelineDepthStencilStateCreateInfo::default()
        .depth_test_enable(depth_test)
        .depth_write_enable(depth_write)
        .depth_compare_op(compare)
        .depth_bounds_test_enable(false)
        .min_depth_bounds(0.0)
        .max_depth_bounds(1.0);

    match def.shadow_phase {
        ShadowPhase::None => info.stencil_test_enable(false),
        ShadowPhase::Edges => {
            let (front, back) = if def.mirror {
                (vk::StencilOp::DECREMENT_AND_WRAP, vk::StencilOp::INCREMENT_AND_WRAP)
            } else {
                (vk::StencilOp::INCREMENT_AND_WRAP, vk::StencilOp::DECREMENT_AND_WRAP)
            };
            info.stencil_test_enable(true)
                .front(stencil_state(vk::StencilOp::KEEP, front, vk::CompareOp::ALWAYS))
                .back(stencil_state(vk::StencilOp::KEEP, back, vk::CompareOp::ALWAYS))
        }
        ShadowPhase::FullscreenQuad => {
            let masked = stencil_state(vk::StencilOp::KEEP, vk::StencilOp::KEEP, vk::CompareOp::NOT_EQUAL);
            info.stencil_test_enable(true).front(masked).back(masked)
        }
    }
}

pub(crate) fn blend_attachment(def: &PipelineDefinition) -> vk::PipelineColorBlendAttachmentState {
    // shadow edges only touch the stencil buffer
    let write_mask = if def.shadow_phase == ShadowPhase::Edges {
        vk::ColorComponentFlags::empty()
    } else {
        vk::ColorComponentFlags::RGBA
    };
    let attachment = vk::PipelineColorBlendAttachmentState::default().color_write_mask(write_mask);
    match def.blend {
        Some(blend) => attachment
            .blend_enable(true)
            .src_color_blend_factor(blend_factor_to_vk(blend.src))
            .dst_color_blend_factor(blend_factor_to_vk(blend.dst))
            .color_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(blend_factor_to_vk(blend.src))
            .dst_alpha_blend_factor(blend_factor_to_vk(blend.dst))
            .alpha_blend_op(vk::BlendOp::ADD),
        None => attachment.blend_enable(false),
    }
}

/// Compile `def` against the render pass in `target`
pub(crate) fn create_graphics_pipeline(
    device: &ash::Device,
    modules: &ShaderModules,
    layout: vk::PipelineLayout,
    render_pass: vk::RenderPass,
    def: &PipelineDefinition,
    target: &PipelineTarget,
) -> StrataResult<vk::Pipeline> {
    let (vertex_module, fragment_module) = modules.get(def.shader)?;

    let values = specialization_values(def);
    let spec_data: Vec<u8> = values.iter().flat_map(|v| v.to_ne_bytes()).collect();
    let spec_entries: Vec<vk::SpecializationMapEntry> = (0..values.len() as u32)
        .map(|id| vk::SpecializationMapEntry {
            constant_id: id,
            offset: id * 4,
            size: 4,
        })
        .collect();
    let spec_info = vk::SpecializationInfo::default()
        .map_entries(&spec_entries)
        .data(&spec_data);

    let stages = [
        vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(vertex_module)
            .name(c"main")
            .specialization_info(&spec_info),
        vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .module(fragment_module)
            .name(c"main")
            .specialization_info(&spec_info),
    ];

    let attributes = vertex_attributes(def);
    let (bindings, descriptions) = vertex_input_descriptions(&attributes);
    let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
        .vertex_binding_descriptions(&bindings)
        .vertex_attribute_descriptions(&descriptions);

    let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
        .topology(topology_to_vk(def.topology))
        .primitive_restart_enable(false);

    // Viewport state (dynamic)
    let viewports = [vk::Viewport::default()];
    let scissors = [vk::Rect2D::default()];
    let viewport_state = vk::PipelineViewportStateCreateInfo::default()
        .viewports(&viewports)
        .scissors(&scissors);

    let rasterization_state = rasterization_state(def);
    let depth_stencil_state = depth_stencil_state(def);

    let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
        .rasterization_samples(sample_count_to_vk(target.samples))
        .sample_shading_enable(false)
        .alpha_to_coverage_enable(false);

    let color_blend_attachment = blend_attachment(def);
    let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
        .logic_op_enable(false)
        .attachments(std::slice::from_ref(&color_blend_attachment));

    let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

    let create_info = vk::GraphicsPipelineCreateInfo::default()
        .stages(&stages)
        .vertex_input_state(&vertex_input_state)
        .input_assembly_state(&input_assembly_state)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterization_state)
        .depth_stencil_state(&depth_stencil_state)
        .multisample_state(&multisample_state)
        .color_blend_state(&color_blend_state)
        .dynamic_state(&dynamic_state)
        .layout(layout)
        .render_pass(render_pass)
        .subpass(0);

    let pipelines = unsafe {
        device
            .create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
            .map_err(|(_, e)| {
                engine_err!(
                    "strata::vulkan",
                    "Failed to create {:?} pipeline for {:?} pass: {:?}",
                    def.shader,
                    target.kind,
                    e
                )
            })?
    };
    pipelines
        .into_iter()
        .next()
        .ok_or_else(|| engine_err!("strata::vulkan", "vkCreateGraphicsPipelines returned no pipeline"))
}

#[cfg(test)]
#[path = "vulkan_pipeline_tests.rs"]
mod tests;
