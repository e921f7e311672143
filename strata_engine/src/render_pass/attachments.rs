/// Render target images of the pass graph
///
/// All attachments are created together, placed through the attachment
/// arena in one flush, and destroyed together on swapchain restart.

use crate::error::{StrataError, StrataResult};
use crate::graphics_device::{
    GraphicsDevice, ImageAspect, ImageDesc, ImageFormat, ImageHandle, ImageLayout, ImageTiling,
    ImageUsage, ImageViewDesc, ImageViewHandle, SampleCount,
};
use crate::memory::{ImageArena, ImageRequest};
use crate::render_pass::{PassExtents, PassParams};

/// What an attachment image is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentRole {
    /// Single-sample color (MSAA resolve target), sampled by post-processing
    Color,
    Msaa,
    Depth,
    Capture,
    /// 0 = bloom extract, then a horizontal/vertical pair per cascade
    Bloom(usize),
    ScreenMapColor,
    ScreenMapMsaa,
    ScreenMapDepth,
}

/// One created, bound and viewed attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentImage {
    pub image: ImageHandle,
    pub view: ImageViewHandle,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

/// Creation parameters of one attachment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttachmentSpec {
    pub role: AttachmentRole,
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    pub samples: SampleCount,
    pub usage: ImageUsage,
    pub layout: ImageLayout,
    /// Contents never leave tile memory
    pub transient: bool,
}

/// Attachments needed by `params`, in allocation order
///
/// Similar images are grouped (bloom, resolve, screen map, msaa, capture,
/// depth) so they end up adjacent in memory.
pub fn attachment_specs(params: &PassParams, extents: &PassExtents) -> Vec<AttachmentSpec> {
    let mut specs = Vec::new();
    let sampled = ImageUsage::COLOR_ATTACHMENT | ImageUsage::SAMPLED;
    let (rw, rh) = extents.render;
    let depth_usage = ImageUsage::DEPTH_STENCIL_ATTACHMENT;
    let color = |role, (width, height): (u32, u32), format, usage, layout| AttachmentSpec {
        role,
        width,
        height,
        format,
        samples: SampleCount::S1,
        usage,
        layout,
        transient: false,
    };

    if params.post_processing {
        if params.bloom {
            for index in 0..(1 + 2 * params.bloom_passes as usize) {
                specs.push(color(
                    AttachmentRole::Bloom(index),
                    extents.bloom_image(index),
                    params.formats.bloom,
                    sampled,
                    ImageLayout::ShaderReadOnly,
                ));
            }
        }

        specs.push(color(
            AttachmentRole::Color,
            extents.render,
            params.formats.color,
            sampled | ImageUsage::TRANSFER_SRC,
            ImageLayout::ShaderReadOnly,
        ));

        if params.screen_map {
            if params.screen_map_samples.is_multisampled() {
                specs.push(AttachmentSpec {
                    samples: params.screen_map_samples,
                    usage: ImageUsage::COLOR_ATTACHMENT | ImageUsage::TRANSIENT_ATTACHMENT,
                    transient: true,
                    ..color(
                        AttachmentRole::ScreenMapMsaa,
                        extents.screen_map,
                        params.formats.color,
                        ImageUsage::COLOR_ATTACHMENT,
                        ImageLayout::ColorAttachment,
                    )
                });
            }
            specs.push(color(
                AttachmentRole::ScreenMapColor,
                extents.screen_map,
                params.formats.color,
                sampled,
                ImageLayout::ShaderReadOnly,
            ));
            specs.push(AttachmentSpec {
                samples: params.screen_map_samples,
                usage: depth_usage | ImageUsage::TRANSIENT_ATTACHMENT,
                transient: true,
                ..color(
                    AttachmentRole::ScreenMapDepth,
                    extents.screen_map,
                    params.formats.depth,
                    depth_usage,
                    ImageLayout::DepthStencilAttachment,
                )
            });
        }

        if params.samples.is_multisampled() {
            let transient = !params.bloom;
            let mut usage = ImageUsage::COLOR_ATTACHMENT;
            if transient {
                usage |= ImageUsage::TRANSIENT_ATTACHMENT;
            }
            specs.push(AttachmentSpec {
                samples: params.samples,
                transient,
                ..color(AttachmentRole::Msaa, extents.render, params.formats.color, usage, ImageLayout::ColorAttachment)
            });
        }

        specs.push(color(
            AttachmentRole::Capture,
            extents.render,
            params.formats.capture,
            ImageUsage::COLOR_ATTACHMENT | ImageUsage::TRANSFER_SRC,
            ImageLayout::TransferSrc,
        ));
    }

    // depth survives the main pass only when post-bloom reloads it
    let transient = !params.bloom;
    let mut usage = depth_usage;
    if transient {
        usage |= ImageUsage::TRANSIENT_ATTACHMENT;
    }
    let depth_extent = if params.post_processing { (rw, rh) } else { extents.window };
    specs.push(AttachmentSpec {
        samples: params.samples,
        transient,
        ..color(AttachmentRole::Depth, depth_extent, params.formats.depth, usage, ImageLayout::DepthStencilAttachment)
    });

    specs
}

/// Every attachment image of the pass graph
#[derive(Debug, Default)]
pub struct AttachmentSet {
    images: Vec<(AttachmentRole, AttachmentImage)>,
}

impl AttachmentSet {
    /// Create every attachment `params` needs and place them in `arena`
    ///
    /// # Errors
    ///
    /// Propagates arena failures (chunk overflow, no memory type); these are fatal.
    pub fn create<D: GraphicsDevice>(
        device: &mut D,
        arena: &mut ImageArena,
        params: &PassParams,
        extents: &PassExtents,
    ) -> StrataResult<Self> {
        let specs = attachment_specs(params, extents);
        let mut created = Vec::with_capacity(specs.len());

        for spec in &specs {
            let image = device.create_image(&ImageDesc {
                width: spec.width,
                height: spec.height,
                format: spec.format,
                mip_levels: 1,
                samples: spec.samples,
                usage: spec.usage,
                tiling: ImageTiling::Optimal,
            })?;
            let aspect = if spec.format.is_depth() {
                if params.stencil && spec.format.has_stencil() {
                    ImageAspect::DEPTH | ImageAspect::STENCIL
                } else {
                    ImageAspect::DEPTH
                }
            } else {
                ImageAspect::COLOR
            };
            arena.request(ImageRequest {
                image,
                view: ImageViewDesc { format: spec.format, aspect, mip_levels: 1 },
                target_layout: spec.layout,
                lazy: spec.transient,
            });
            created.push(image);
        }

        let placements = match arena.flush(device) {
            Ok(placements) => placements,
            Err(err) => {
                for image in created {
                    device.destroy_image(image);
                }
                return Err(err);
            }
        };

        let images = specs
            .iter()
            .zip(placements)
            .map(|(spec, placed)| {
                (
                    spec.role,
                    AttachmentImage {
                        image: placed.image,
                        view: placed.view,
                        format: spec.format,
                        width: spec.width,
                        height: spec.height,
                    },
                )
            })
            .collect();

        Ok(Self { images })
    }

    pub fn get(&self, role: AttachmentRole) -> Option<&AttachmentImage> {
        self.images.iter().find(|(r, _)| *r == role).map(|(_, image)| image)
    }

    /// Like `get`, for attachments the current parameters guarantee
    pub fn require(&self, role: AttachmentRole) -> StrataResult<&AttachmentImage> {
        self.get(role)
            .ok_or_else(|| StrataError::InvalidResource(format!("missing {:?} attachment", role)))
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(AttachmentRole, AttachmentImage)> {
        self.images.iter()
    }

    /// Destroy views and images; the memory belongs to the arena
    pub fn destroy<D: GraphicsDevice>(&mut self, device: &mut D) {
        for (_, attachment) in self.images.drain(..) {
            device.destroy_image_view(attachment.view);
            device.destroy_image(attachment.image);
        }
    }
}

#[cfg(test)]
#[path = "attachments_tests.rs"]
mod tests;
