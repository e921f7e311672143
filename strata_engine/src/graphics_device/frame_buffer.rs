/// Render pass and framebuffer descriptors
///
/// A render pass declares its attachments with load/store operations and the
/// layouts each attachment enters and leaves the pass in. A framebuffer binds
/// concrete image views to those attachment slots.

use crate::graphics_device::{
    FramebufferHandle, ImageFormat, ImageLayout, ImageViewHandle, RenderPassHandle, SampleCount,
};

/// What happens to an attachment's contents at the start of a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadOp {
    Load,
    Clear,
    DontCare,
}

/// What happens to an attachment's contents at the end of a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Store,
    DontCare,
}

/// One attachment slot of a render pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttachmentDesc {
    pub format: ImageFormat,
    pub samples: SampleCount,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub stencil_load_op: LoadOp,
    pub stencil_store_op: StoreOp,
    pub initial_layout: ImageLayout,
    pub final_layout: ImageLayout,
}

impl AttachmentDesc {
    /// Color attachment with no stencil ops
    pub fn color(
        format: ImageFormat,
        samples: SampleCount,
        load_op: LoadOp,
        store_op: StoreOp,
        initial_layout: ImageLayout,
        final_layout: ImageLayout,
    ) -> Self {
        Self {
            format,
            samples,
            load_op,
            store_op,
            stencil_load_op: LoadOp::DontCare,
            stencil_store_op: StoreOp::DontCare,
            initial_layout,
            final_layout,
        }
    }
}

/// Descriptor for creating a single-subpass render pass
///
/// Framebuffer attachment order is: color, depth (if any), resolve (if any).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderPassDesc {
    pub color: AttachmentDesc,
    pub depth: Option<AttachmentDesc>,
    /// Single-sample target the multisampled color attachment resolves into
    pub resolve: Option<AttachmentDesc>,
}

impl RenderPassDesc {
    /// All attachments in framebuffer order
    pub fn attachments(&self) -> Vec<AttachmentDesc> {
        let mut out = vec![self.color];
        out.extend(self.depth);
        out.extend(self.resolve);
        out
    }
}

/// Descriptor for creating a framebuffer
pub struct FramebufferDesc<'a> {
    /// The render pass this framebuffer is compatible with
    pub render_pass: RenderPassHandle,
    /// Views in the render pass's attachment order
    pub attachments: &'a [ImageViewHandle],
    pub width: u32,
    pub height: u32,
}

/// Clear value for one attachment
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    Color([f32; 4]),
    DepthStencil { depth: f32, stencil: u32 },
}

/// Arguments of `cmd_begin_render_pass`
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPassBegin {
    pub render_pass: RenderPassHandle,
    pub framebuffer: FramebufferHandle,
    pub width: u32,
    pub height: u32,
    /// One entry per attachment, in attachment order
    pub clear_values: Vec<ClearValue>,
}

/// Viewport rectangle with depth range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

/// Scissor rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect2D {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}
