/// Pass layout rules - attachment formats, load/store ops and layouts per pass
///
/// Every attachment enters a pass in the layout the previous pass (or its
/// creation-time transition) left it in, so steady-state frames need no
/// explicit barriers:
///
/// | image            | created as        | passes keep it in      |
/// |------------------|-------------------|------------------------|
/// | color / resolve  | ShaderReadOnly    | ShaderReadOnly         |
/// | msaa color       | ColorAttachment   | ColorAttachment        |
/// | depth            | DepthStencil      | DepthStencil           |
/// | bloom            | ShaderReadOnly    | ShaderReadOnly         |
/// | capture          | TransferSrc       | Undefined -> TransferSrc |
/// | swapchain        | -                 | Undefined -> PresentSrc |

use crate::config::RendererConfig;
use crate::graphics_device::{
    AttachmentDesc, ClearValue, DeviceFormats, ImageFormat, ImageLayout, LoadOp, RenderPassDesc,
    SampleCount, StoreOp,
};
use crate::render_pass::RenderPassKind;

/// Inputs that decide the shape of every pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassParams {
    pub formats: DeviceFormats,
    /// Swapchain image format
    pub present_format: ImageFormat,
    pub samples: SampleCount,
    pub screen_map_samples: SampleCount,
    pub bloom: bool,
    pub stencil: bool,
    pub post_processing: bool,
    pub screen_map: bool,
    pub bloom_passes: u32,
}

impl PassParams {
    pub fn from_config(config: &RendererConfig, formats: DeviceFormats, present_format: ImageFormat) -> Self {
        let samples = if config.post_processing { config.msaa_samples } else { SampleCount::S1 };
        Self {
            formats,
            present_format,
            samples,
            screen_map_samples: samples.min(SampleCount::S4),
            bloom: config.bloom_active(),
            stencil: config.stencil_bits > 0,
            post_processing: config.post_processing,
            screen_map: config.post_processing && config.screen_map,
            bloom_passes: if config.bloom_active() { config.bloom_passes } else { 0 },
        }
    }

    /// Whether `kind` exists under these parameters
    pub fn has_pass(&self, kind: RenderPassKind) -> bool {
        match kind {
            RenderPassKind::Main => true,
            RenderPassKind::ScreenMap => self.screen_map,
            RenderPassKind::PostBloom | RenderPassKind::BloomExtract | RenderPassKind::Blur => self.bloom,
            RenderPassKind::Capture | RenderPassKind::Gamma => self.post_processing,
        }
    }

    /// Sample count pipelines must be compiled with for `kind`
    pub fn pass_samples(&self, kind: RenderPassKind) -> SampleCount {
        match kind {
            RenderPassKind::Main | RenderPassKind::PostBloom => self.samples,
            RenderPassKind::ScreenMap => self.screen_map_samples,
            _ => SampleCount::S1,
        }
    }
}

/// Pixel extents of the pass graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassExtents {
    /// Swapchain extent (gamma pass)
    pub window: (u32, u32),
    /// Offscreen extent (main, post-bloom, bloom extract, capture)
    pub render: (u32, u32),
    pub screen_map: (u32, u32),
}

impl PassExtents {
    pub fn new(window_width: u32, window_height: u32, params: &PassParams, render_scale: f32) -> Self {
        let window = (window_width.max(1), window_height.max(1));
        let render = if params.post_processing {
            (
                ((window.0 as f32 * render_scale).round() as u32).max(1),
                ((window.1 as f32 * render_scale).round() as u32).max(1),
            )
        } else {
            window
        };
        Self {
            window,
            render,
            screen_map: ((render.0 / 16).max(4), (render.1 / 16).max(4)),
        }
    }

    /// Extent of blur cascade `cascade` (half the render extent per step)
    pub fn cascade(&self, cascade: usize) -> (u32, u32) {
        let shift = cascade as u32 + 1;
        ((self.render.0 >> shift).max(1), (self.render.1 >> shift).max(1))
    }

    /// Extent of bloom image `index` (0 = extract, then H/V pairs per cascade)
    pub fn bloom_image(&self, index: usize) -> (u32, u32) {
        if index == 0 {
            self.render
        } else {
            self.cascade((index - 1) / 2)
        }
    }
}

fn depth_attachment(params: &PassParams, samples: SampleCount, load: LoadOp, store: StoreOp) -> AttachmentDesc {
    let stencil_load = match load {
        LoadOp::Load => LoadOp::Load,
        _ if params.stencil => LoadOp::Clear,
        _ => LoadOp::DontCare,
    };
    let stencil_store = if params.stencil { store } else { StoreOp::DontCare };
    AttachmentDesc {
        format: params.formats.depth,
        samples,
        load_op: load,
        store_op: store,
        stencil_load_op: stencil_load,
        stencil_store_op: stencil_store,
        initial_layout: ImageLayout::DepthStencilAttachment,
        final_layout: ImageLayout::DepthStencilAttachment,
    }
}

fn single_color(format: ImageFormat, initial: ImageLayout, final_layout: ImageLayout) -> RenderPassDesc {
    RenderPassDesc {
        color: AttachmentDesc::color(format, SampleCount::S1, LoadOp::DontCare, StoreOp::Store, initial, final_layout),
        depth: None,
        resolve: None,
    }
}

/// Attachment declaration of `kind`, or `None` if the pass does not exist
pub fn describe_pass(kind: RenderPassKind, params: &PassParams) -> Option<RenderPassDesc> {
    if !params.has_pass(kind) {
        return None;
    }

    let shader_read = ImageLayout::ShaderReadOnly;
    let color_fmt = params.formats.color;

    let desc = match kind {
        RenderPassKind::Main if !params.post_processing => RenderPassDesc {
            color: AttachmentDesc::color(
                params.present_format,
                SampleCount::S1,
                LoadOp::DontCare,
                StoreOp::Store,
                ImageLayout::Undefined,
                ImageLayout::PresentSrc,
            ),
            depth: Some(depth_attachment(params, SampleCount::S1, LoadOp::Clear, StoreOp::DontCare)),
            resolve: None,
        },
        RenderPassKind::Main | RenderPassKind::PostBloom => {
            let reload = kind == RenderPassKind::PostBloom;
            let (load, depth_load, depth_store) = if reload {
                (LoadOp::Load, LoadOp::Load, StoreOp::DontCare)
            } else if params.bloom {
                (LoadOp::DontCare, LoadOp::Clear, StoreOp::Store)
            } else {
                (LoadOp::DontCare, LoadOp::Clear, StoreOp::DontCare)
            };
            let depth = Some(depth_attachment(params, params.samples, depth_load, depth_store));
            let resolved = AttachmentDesc::color(color_fmt, SampleCount::S1, load, StoreOp::Store, shader_read, shader_read);

            if params.samples.is_multisampled() {
                let msaa_store = if params.bloom && !reload { StoreOp::Store } else { StoreOp::DontCare };
                RenderPassDesc {
                    color: AttachmentDesc::color(
                        color_fmt,
                        params.samples,
                        load,
                        msaa_store,
                        ImageLayout::ColorAttachment,
                        ImageLayout::ColorAttachment,
                    ),
                    depth,
                    resolve: Some(resolved),
                }
            } else {
                RenderPassDesc { color: resolved, depth, resolve: None }
            }
        }
        RenderPassKind::ScreenMap => {
            let resolved = AttachmentDesc::color(color_fmt, SampleCount::S1, LoadOp::DontCare, StoreOp::Store, shader_read, shader_read);
            let depth = AttachmentDesc {
                stencil_load_op: LoadOp::Clear,
                ..depth_attachment(params, params.screen_map_samples, LoadOp::Clear, StoreOp::DontCare)
            };
            if params.screen_map_samples.is_multisampled() {
                RenderPassDesc {
                    color: AttachmentDesc::color(
                        color_fmt,
                        params.screen_map_samples,
                        LoadOp::DontCare,
                        StoreOp::DontCare,
                        ImageLayout::ColorAttachment,
                        ImageLayout::ColorAttachment,
                    ),
                    depth: Some(depth),
                    resolve: Some(resolved),
                }
            } else {
                RenderPassDesc { color: resolved, depth: Some(depth), resolve: None }
            }
        }
        RenderPassKind::BloomExtract | RenderPassKind::Blur => {
            single_color(params.formats.bloom, shader_read, shader_read)
        }
        RenderPassKind::Capture => {
            single_color(params.formats.capture, ImageLayout::Undefined, ImageLayout::TransferSrc)
        }
        RenderPassKind::Gamma => {
            single_color(params.present_format, ImageLayout::Undefined, ImageLayout::PresentSrc)
        }
    };
    Some(desc)
}

/// Clear values for beginning `desc`, one per attachment; empty if nothing clears
pub fn clear_values(desc: &RenderPassDesc) -> Vec<ClearValue> {
    let attachments = desc.attachments();
    let clears = attachments
        .iter()
        .any(|a| a.load_op == LoadOp::Clear || a.stencil_load_op == LoadOp::Clear);
    if !clears {
        return Vec::new();
    }
    attachments
        .iter()
        .map(|a| {
            if a.format.is_depth() {
                ClearValue::DepthStencil { depth: 1.0, stencil: 0 }
            } else {
                ClearValue::Color([0.0, 0.0, 0.0, 1.0])
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "pass_layout_tests.rs"]
mod tests;
