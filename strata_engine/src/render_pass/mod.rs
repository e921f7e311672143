/// Render pass orchestration - the fixed pass DAG, its attachments and framebuffers

pub mod pass_layout;
pub mod attachments;
pub mod render_pass_graph;
pub mod post_process;

pub use pass_layout::*;
pub use attachments::*;
pub use render_pass_graph::*;
pub use post_process::*;

/// Every render pass the frame core can begin
///
/// Pipelines are compiled per kind: two kinds never share a native pipeline
/// even when their definitions are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RenderPassKind {
    /// Reduced-resolution pre-pass sampled later by the main pass
    ScreenMap,
    Main,
    /// Main attachments reloaded after bloom to blend cascades and finish 2D drawing
    PostBloom,
    BloomExtract,
    /// Horizontal and vertical blur cascades (one compatible pass for all)
    Blur,
    /// Screenshot target read back by `read_pixels`
    Capture,
    /// Writes the presentable image
    Gamma,
}

impl RenderPassKind {
    pub const COUNT: usize = 7;

    pub const ALL: [RenderPassKind; RenderPassKind::COUNT] = [
        RenderPassKind::ScreenMap,
        RenderPassKind::Main,
        RenderPassKind::PostBloom,
        RenderPassKind::BloomExtract,
        RenderPassKind::Blur,
        RenderPassKind::Capture,
        RenderPassKind::Gamma,
    ];

    /// Dense index for per-kind arrays
    pub fn index(&self) -> usize {
        *self as usize
    }
}
