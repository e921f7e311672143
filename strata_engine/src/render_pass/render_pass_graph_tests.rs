use super::*;
use crate::config::RendererConfig;
use crate::graphics_device::mock_graphics_device::MockGraphicsDevice;
use crate::graphics_device::{ClearValue, SampleCount};
use crate::texture::SamplerDef;

const MIB: u64 = 1024 * 1024;

struct Fixture {
    device: MockGraphicsDevice,
    arena: ImageArena,
    swapchain: SwapchainInfo,
    sampler: SamplerHandle,
}

fn fixture() -> Fixture {
    let mut device = MockGraphicsDevice::new();
    let swapchain = device.create_swapchain().unwrap();
    let sampler = device.create_sampler(&SamplerDef::default()).unwrap();
    Fixture {
        device,
        arena: ImageArena::new("strata::test", 64 * MIB, false),
        swapchain,
        sampler,
    }
}

fn build(f: &mut Fixture, config: &RendererConfig) -> RenderPassGraph {
    let params = PassParams::from_config(config, f.device.formats, f.swapchain.format);
    let extents = PassExtents::new(f.swapchain.width, f.swapchain.height, &params, config.render_scale);
    RenderPassGraph::build(&mut f.device, &mut f.arena, params, extents, &f.swapchain, f.sampler).unwrap()
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn test_default_graph() {
    let mut f = fixture();
    let graph = build(&mut f, &RendererConfig::default());

    assert_eq!(f.device.count("create_render_pass"), 4);
    // main + screen map + capture + one gamma per swapchain image
    assert_eq!(f.device.count("create_framebuffer"), 6);
    assert_eq!(f.device.count("create_framebuffer 640x480 attachments=2"), 1);
    assert_eq!(f.device.count("create_framebuffer 40x30 attachments=2"), 1);
    assert!(graph.pass(RenderPassKind::PostBloom).is_none());
    assert!(graph.descriptors().color.is_some());
    assert!(graph.descriptors().screen_map.is_some());
    assert!(graph.descriptors().bloom.is_empty());
    assert_eq!(graph.blur_count(), 0);
}

#[test]
fn test_bloom_graph_cascades() {
    let mut f = fixture();
    let config = RendererConfig { bloom: true, bloom_passes: 2, ..Default::default() };
    let graph = build(&mut f, &config);

    assert_eq!(graph.blur_count(), 4);
    assert_eq!(graph.descriptors().bloom.len(), 5);
    assert_eq!(graph.blur_extent(0), (320, 240));
    assert_eq!(graph.blur_extent(1), (320, 240));
    assert_eq!(graph.blur_extent(2), (160, 120));
    assert_eq!(graph.blur_begin_info(3).unwrap().width, 160);
    assert!(graph.blur_begin_info(4).is_none());
    assert!(graph.pass(RenderPassKind::PostBloom).is_some());
}

#[test]
fn test_msaa_main_framebuffer_has_resolve() {
    let mut f = fixture();
    let config = RendererConfig { msaa_samples: SampleCount::S4, ..Default::default() };
    let graph = build(&mut f, &config);

    assert_eq!(f.device.count("create_framebuffer 640x480 attachments=3"), 1);
    let target = graph.target(RenderPassKind::Main).unwrap();
    assert_eq!(target.samples, SampleCount::S4);
    assert_eq!(graph.target(RenderPassKind::Gamma).unwrap().samples, SampleCount::S1);
}

#[test]
fn test_direct_rendering_uses_swapchain_framebuffers() {
    let mut f = fixture();
    let graph = build(&mut f, &RendererConfig { post_processing: false, ..Default::default() });

    assert_eq!(f.device.count("create_render_pass"), 1);
    assert_eq!(f.device.count("create_framebuffer"), 3);
    let first = graph.begin_info(RenderPassKind::Main, 0).unwrap();
    let last = graph.begin_info(RenderPassKind::Main, 2).unwrap();
    assert_ne!(first.framebuffer, last.framebuffer);
    assert!(graph.begin_info(RenderPassKind::Gamma, 0).is_none());
    assert!(graph.descriptors().color.is_none());
}

// ============================================================================
// Begin info
// ============================================================================

#[test]
fn test_begin_info_extents_and_clears() {
    let mut f = fixture();
    let config = RendererConfig { render_scale: 0.5, bloom: true, ..Default::default() };
    let graph = build(&mut f, &config);

    let main = graph.begin_info(RenderPassKind::Main, 1).unwrap();
    assert_eq!((main.width, main.height), (320, 240));
    assert_eq!(main.clear_values.len(), 2);
    assert_eq!(main.clear_values[1], ClearValue::DepthStencil { depth: 1.0, stencil: 0 });

    let gamma = graph.begin_info(RenderPassKind::Gamma, 1).unwrap();
    assert_eq!((gamma.width, gamma.height), (640, 480));
    assert!(gamma.clear_values.is_empty());

    let post = graph.begin_info(RenderPassKind::PostBloom, 0).unwrap();
    assert_eq!(post.framebuffer, main.framebuffer);
    assert!(post.clear_values.is_empty());
}

#[test]
fn test_gamma_framebuffer_per_image() {
    let mut f = fixture();
    let graph = build(&mut f, &RendererConfig::default());
    let a = graph.begin_info(RenderPassKind::Gamma, 0).unwrap();
    let b = graph.begin_info(RenderPassKind::Gamma, 1).unwrap();
    assert_ne!(a.framebuffer, b.framebuffer);
    assert!(graph.begin_info(RenderPassKind::Gamma, 3).is_none());
}

// ============================================================================
// Teardown
// ============================================================================

#[test]
fn test_destroy_releases_everything() {
    let mut f = fixture();
    let live_before = f.device.live.len();
    let mut graph = build(&mut f, &RendererConfig { bloom: true, ..Default::default() });

    graph.destroy(&mut f.device);
    f.arena.release_all(&mut f.device);

    assert_eq!(f.device.live.len(), live_before);
    assert!(graph.pass(RenderPassKind::Main).is_none());
    assert!(graph.attachments().is_empty());
}
