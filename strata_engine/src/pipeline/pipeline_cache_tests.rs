use super::*;
use crate::graphics_device::mock_graphics_device::MockGraphicsDevice;
use crate::graphics_device::{RenderPassHandle, SampleCount};
use crate::pipeline::{Blend, BlendFactor, CullMode, PipelineLayoutKind, ShaderVariant, ShadowPhase, StateBits, Topology};

fn target(kind: RenderPassKind) -> PipelineTarget {
    PipelineTarget {
        kind,
        render_pass: RenderPassHandle(1000 + kind.index() as u64),
        samples: SampleCount::S1,
    }
}

/// Default definition plus one variant per field, each differing in exactly one field
fn single_field_variants() -> Vec<PipelineDefinition> {
    let base = PipelineDefinition::default();
    vec![
        base,
        PipelineDefinition { shader: ShaderVariant::MultiTextureAdd, ..base },
        PipelineDefinition {
            blend: Some(Blend { src: BlendFactor::One, dst: BlendFactor::One }),
            ..base
        },
        PipelineDefinition { state_bits: StateBits::DEPTH_TEST_DISABLE, ..base },
        PipelineDefinition { cull: CullMode::None, ..base },
        PipelineDefinition { topology: Topology::LineList, ..base },
        PipelineDefinition { polygon_offset: true, ..base },
        PipelineDefinition { mirror: true, ..base },
        PipelineDefinition { shadow_phase: ShadowPhase::Edges, ..base },
        PipelineDefinition { line_width: 2, ..base },
        PipelineDefinition { fog_stage: true, ..base },
        PipelineDefinition { abs_light: true, ..base },
        PipelineDefinition { allow_discard: true, ..base },
    ]
}

// ============================================================================
// Deduplication
// ============================================================================

#[test]
fn test_equal_definitions_share_id() {
    let mut cache = PipelineCache::new(16);
    let a = cache.find_or_alloc(&PipelineDefinition::default()).unwrap();
    let b = cache.find_or_alloc(&PipelineDefinition::default()).unwrap();
    assert_eq!(a, b);
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_single_field_difference_gives_distinct_ids() {
    let mut cache = PipelineCache::new(64);
    let defs = single_field_variants();
    let mut ids: Vec<PipelineId> = defs.iter().map(|d| cache.find_or_alloc(d).unwrap()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), defs.len());
}

#[test]
fn test_find_does_not_intern() {
    let mut cache = PipelineCache::new(4);
    assert!(cache.find(&PipelineDefinition::default()).is_none());
    let id = cache.find_or_alloc(&PipelineDefinition::default()).unwrap();
    assert_eq!(cache.find(&PipelineDefinition::default()), Some(id));
}

#[test]
fn test_capacity_exceeded() {
    let mut cache = PipelineCache::new(2);
    let defs = single_field_variants();
    cache.find_or_alloc(&defs[0]).unwrap();
    cache.find_or_alloc(&defs[1]).unwrap();
    let err = cache.find_or_alloc(&defs[2]).unwrap_err();
    assert!(matches!(err, StrataError::CapacityExceeded { limit: 2, .. }));
    // existing definitions still resolve when full
    assert!(cache.find_or_alloc(&defs[1]).is_ok());
}

// ============================================================================
// Per-pass materialization
// ============================================================================

#[test]
fn test_materialize_is_per_render_pass() {
    let mut device = MockGraphicsDevice::new();
    let mut cache = PipelineCache::new(8);
    let id = cache.find_or_alloc(&PipelineDefinition::default()).unwrap();

    let main = cache.materialize(&mut device, id, &target(RenderPassKind::Main)).unwrap();
    let post = cache.materialize(&mut device, id, &target(RenderPassKind::PostBloom)).unwrap();

    assert_ne!(main, post);
    assert_eq!(device.count("create_pipeline"), 2);
}

#[test]
fn test_materialize_same_pair_never_recompiles() {
    let mut device = MockGraphicsDevice::new();
    let mut cache = PipelineCache::new(8);
    let id = cache.find_or_alloc(&PipelineDefinition::default()).unwrap();

    let first = cache.materialize(&mut device, id, &target(RenderPassKind::Main)).unwrap();
    let second = cache.materialize(&mut device, id, &target(RenderPassKind::Main)).unwrap();

    assert_eq!(first, second);
    assert_eq!(device.count("create_pipeline"), 1);
    assert_eq!(cache.compile_count(), 1);
    assert_eq!(cache.entry(id).unwrap().handle(RenderPassKind::Main), Some(first));
    assert_eq!(cache.entry(id).unwrap().handle(RenderPassKind::ScreenMap), None);
}

#[test]
fn test_materialize_unknown_id() {
    let mut device = MockGraphicsDevice::new();
    let mut cache = PipelineCache::new(8);
    let result = cache.materialize(&mut device, PipelineId(3), &target(RenderPassKind::Main));
    assert!(matches!(result, Err(StrataError::InvalidResource(_))));
}

// ============================================================================
// Binding
// ============================================================================

#[test]
fn test_bind_skips_redundant_binds() {
    let mut device = MockGraphicsDevice::new();
    let mut cache = PipelineCache::new(8);
    let defs = single_field_variants();
    let a = cache.find_or_alloc(&defs[0]).unwrap();
    let b = cache.find_or_alloc(&defs[1]).unwrap();
    let cb = crate::graphics_device::CommandBufferHandle(1);
    let t = target(RenderPassKind::Main);
    let mut last = None;

    cache.bind(&mut device, cb, a, &t, &mut last).unwrap();
    cache.bind(&mut device, cb, a, &t, &mut last).unwrap();
    cache.bind(&mut device, cb, b, &t, &mut last).unwrap();
    cache.bind(&mut device, cb, a, &t, &mut last).unwrap();

    assert_eq!(device.count("cmd_bind_pipeline"), 3);
}

// ============================================================================
// Release
// ============================================================================

#[test]
fn test_release_since_keeps_persistent_entries() {
    let mut device = MockGraphicsDevice::new();
    let mut cache = PipelineCache::new(32);
    let defs = single_field_variants();

    let ui = cache.find_or_alloc(&defs[0]).unwrap();
    cache.materialize(&mut device, ui, &target(RenderPassKind::Main)).unwrap();
    let watermark = cache.mark_persistent();

    let level = cache.find_or_alloc(&defs[1]).unwrap();
    let level_handle = cache.materialize(&mut device, level, &target(RenderPassKind::Main)).unwrap();

    cache.release_since(&mut device, watermark);

    assert_eq!(cache.len(), 1);
    assert!(cache.find(&defs[1]).is_none());
    assert_eq!(cache.find(&defs[0]), Some(ui));
    assert!(!device.pipelines.contains_key(&level_handle));
    // the released definition can be interned again at the freed index
    assert_eq!(cache.find_or_alloc(&defs[2]).unwrap(), level);
}

#[test]
fn test_destroy_native_keeps_ids() {
    let mut device = MockGraphicsDevice::new();
    let mut cache = PipelineCache::new(8);
    let id = cache.find_or_alloc(&PipelineDefinition::default()).unwrap();
    cache.materialize(&mut device, id, &target(RenderPassKind::Main)).unwrap();

    cache.destroy_native(&mut device);

    assert!(device.pipelines.is_empty());
    assert_eq!(cache.find(&PipelineDefinition::default()), Some(id));
    assert_eq!(cache.entry(id).unwrap().handle(RenderPassKind::Main), None);
    cache.materialize(&mut device, id, &target(RenderPassKind::Main)).unwrap();
    assert_eq!(device.count("create_pipeline"), 2);
}

// ============================================================================
// Layouts
// ============================================================================

#[test]
fn test_shader_layout_selection() {
    assert_eq!(ShaderVariant::SingleTexture.layout(), PipelineLayoutKind::Main);
    assert_eq!(ShaderVariant::FogOnly.layout(), PipelineLayoutKind::Main);
    for shader in [
        ShaderVariant::BloomExtract,
        ShaderVariant::BlurHorizontal,
        ShaderVariant::BlurVertical,
        ShaderVariant::Gamma,
        ShaderVariant::Capture,
    ] {
        assert_eq!(shader.layout(), PipelineLayoutKind::PostProcess, "{:?}", shader);
    }
    assert_eq!(ShaderVariant::BloomBlend.layout(), PipelineLayoutKind::Blend);
}

#[test]
fn test_layout_dynamic_offset_counts() {
    let main = PipelineLayoutKind::Main;
    assert_eq!(main.set_count(), 6);
    assert_eq!(main.dynamic_offset_count(0, 6), 2);
    assert_eq!(main.dynamic_offset_count(1, 4), 1);
    assert_eq!(main.dynamic_offset_count(2, 3), 0);
    assert_eq!(PipelineLayoutKind::PostProcess.set_count(), 1);
    assert_eq!(PipelineLayoutKind::PostProcess.dynamic_offset_count(0, 1), 0);
    assert_eq!(PipelineLayoutKind::Blend.set_count(), crate::config::MAX_BLOOM_PASSES);
    assert_eq!(PipelineLayoutKind::Blend.dynamic_offset_count(0, 4), 0);
}
