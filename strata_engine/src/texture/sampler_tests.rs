use super::*;
use crate::graphics_device::mock_graphics_device::MockGraphicsDevice;

// ============================================================================
// Definitions
// ============================================================================

#[test]
fn test_texture_sampler_follows_mip_count() {
    let mipmapped = SamplerDef::texture(AddressMode::Repeat, true);
    assert_eq!(mipmapped.mipmap_mode, Some(MipmapMode::Linear));
    assert!(mipmapped.anisotropy);
    assert_eq!(mipmapped.max_lod(), LOD_CLAMP_NONE);

    let flat = SamplerDef::texture(AddressMode::Repeat, false);
    assert_eq!(flat.mipmap_mode, None);
    assert!(!flat.anisotropy);
    assert_eq!(flat.max_lod(), LOD_BASE_ONLY);
    assert_eq!(flat, SamplerDef::default());
}

#[test]
fn test_attachment_sampler_clamps() {
    let def = SamplerDef::attachment(Filter::Nearest);
    assert_eq!(def.address_mode, AddressMode::ClampToEdge);
    assert_eq!(def.min_filter, Filter::Nearest);
    assert_eq!(def.max_lod(), 1.0);
    assert!(!def.anisotropy);
}

// ============================================================================
// Cache
// ============================================================================

#[test]
fn test_equal_definitions_share_a_sampler() {
    let mut device = MockGraphicsDevice::new();
    let mut cache = SamplerCache::new(4);

    let a = cache.find_or_create(&mut device, &SamplerDef::default()).unwrap();
    let b = cache.find_or_create(&mut device, &SamplerDef::default()).unwrap();
    let c = cache
        .find_or_create(&mut device, &SamplerDef::texture(AddressMode::ClampToEdge, false))
        .unwrap();

    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(cache.len(), 2);
    assert_eq!(device.count("create_sampler"), 2);
}

#[test]
fn test_sampler_limit() {
    let mut device = MockGraphicsDevice::new();
    let mut cache = SamplerCache::new(1);
    cache.find_or_create(&mut device, &SamplerDef::default()).unwrap();

    let result = cache.find_or_create(&mut device, &SamplerDef::attachment(Filter::Linear));
    assert!(matches!(result, Err(StrataError::CapacityExceeded { what: "samplers", limit: 1 })));
    // existing definitions are still served
    assert!(cache.find_or_create(&mut device, &SamplerDef::default()).is_ok());
}

#[test]
fn test_destroy_releases_samplers() {
    let mut device = MockGraphicsDevice::new();
    let mut cache = SamplerCache::new(8);
    cache.find_or_create(&mut device, &SamplerDef::default()).unwrap();
    cache.find_or_create(&mut device, &SamplerDef::attachment(Filter::Linear)).unwrap();

    cache.destroy(&mut device);
    assert!(cache.is_empty());
    assert!(device.live.is_empty());
}
