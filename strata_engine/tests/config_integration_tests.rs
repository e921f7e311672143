//! Integration tests for the public configuration and value types
//!
//! Exercises the crate through its `strata` namespace only. No GPU required.
//!
//! Run with: cargo test --test config_integration_tests

use strata_engine::glam::{Vec2, Vec3};
use strata_engine::strata::device::SampleCount;
use strata_engine::strata::render::{
    AddressMode, DescriptorBinding, Filter, GeometryBatch, RendererConfig, SamplerDef, TessFlags,
    VertexAttribute, LOD_BASE_ONLY, LOD_CLAMP_NONE, MAX_BLOOM_PASSES,
};
use strata_engine::strata::StrataError;

// ============================================================================
// RENDERER CONFIG
// ============================================================================

#[test]
fn test_integration_default_config_is_valid() {
    let config = RendererConfig::default();
    assert!(config.validate().is_ok());
    assert!(config.post_processing);
    assert!(!config.bloom_active());
}

#[test]
fn test_integration_bloom_requires_post_processing() {
    let config = RendererConfig {
        bloom: true,
        bloom_passes: MAX_BLOOM_PASSES,
        ..RendererConfig::default()
    };
    assert!(config.bloom_active());

    let direct = RendererConfig {
        post_processing: false,
        ..config
    };
    assert!(direct.validate().is_ok());
    assert!(!direct.bloom_active());
}

#[test]
fn test_integration_invalid_configs_are_rejected() {
    let cases = [
        RendererConfig { frames_in_flight: 1, ..RendererConfig::default() },
        RendererConfig { render_scale: 0.0, ..RendererConfig::default() },
        RendererConfig { geometry_alignment: 24, ..RendererConfig::default() },
        RendererConfig {
            msaa_samples: SampleCount::S4,
            post_processing: false,
            ..RendererConfig::default()
        },
    ];
    for config in cases {
        let error = config.validate().unwrap_err();
        assert!(matches!(error, StrataError::InvalidConfig(_)), "{:?}", config);
        assert!(error.is_fatal());
    }
}

#[test]
fn test_integration_error_display() {
    let error = StrataError::ChunkOverflow { requested: 100, chunk_size: 64 };
    assert_eq!(
        error.to_string(),
        "Image request of 100 bytes exceeds chunk size of 64 bytes"
    );
    assert!(!StrataError::SurfaceOutOfDate.is_fatal());
}

// ============================================================================
// VALUE TYPES
// ============================================================================

#[test]
fn test_integration_sampler_lod_clamps() {
    assert_eq!(SamplerDef::texture(AddressMode::Repeat, true).max_lod(), LOD_CLAMP_NONE);
    assert_eq!(SamplerDef::texture(AddressMode::Repeat, false).max_lod(), LOD_BASE_ONLY);
    assert_eq!(SamplerDef::attachment(Filter::Nearest).max_lod(), 1.0);
}

#[test]
fn test_integration_descriptor_binding_layout() {
    let indexes: Vec<usize> = DescriptorBinding::ALL.iter().map(|b| b.index()).collect();
    assert_eq!(indexes, vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(DescriptorBinding::from_index(5), Some(DescriptorBinding::Fog));
    assert_eq!(DescriptorBinding::from_index(6), None);
    assert!(DescriptorBinding::Uniform.is_dynamic());
    assert!(!DescriptorBinding::Texture0.is_dynamic());
}

#[test]
fn test_integration_geometry_batch_streams() {
    let mut batch = GeometryBatch::new();
    batch.xyz = vec![Vec3::ZERO, Vec3::X, Vec3::Y];
    batch.st0 = vec![Vec2::ZERO; 3];
    batch.indexes = vec![0, 1, 2];

    assert_eq!(batch.vertex_count(), 3);
    assert_eq!(batch.index_count(), 3);
    assert_eq!(batch.attribute_bytes(VertexAttribute::Position).len(), 36);
    assert_eq!(batch.attribute_bytes(VertexAttribute::TexCoord0).len(), 24);
    assert!(batch.attribute_bytes(VertexAttribute::Normal).is_empty());
    assert_eq!(VertexAttribute::TexCoord0.flag(), TessFlags::ST0);

    batch.clear();
    assert_eq!(batch.vertex_count(), 0);
}
