/// Command recording helpers that need more than a one-line translation

use ash::vk;
use ash::vk::Handle;
use strata_engine::strata::device::{BufferImageCopy, ClearValue, ImageTransition};

use crate::vulkan_format::{aspect_to_vk, dst_sync, image_layout_to_vk, src_sync};

pub(crate) fn clear_value_to_vk(value: &ClearValue) -> vk::ClearValue {
    match *value {
        ClearValue::Color(color) => vk::ClearValue {
            color: vk::ClearColorValue { float32: color },
        },
        ClearValue::DepthStencil { depth, stencil } => vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue { depth, stencil },
        },
    }
}

/// Barriers for a batch of transitions plus the merged stage masks
pub(crate) fn transition_barriers(
    transitions: &[ImageTransition],
) -> (Vec<vk::ImageMemoryBarrier<'static>>, vk::PipelineStageFlags, vk::PipelineStageFlags) {
    let mut src_stages = vk::PipelineStageFlags::empty();
    let mut dst_stages = vk::PipelineStageFlags::empty();
    let barriers = transitions
        .iter()
        .map(|t| {
            let (src_access, src_stage) = src_sync(t.old_layout);
            let (dst_access, dst_stage) = dst_sync(t.new_layout);
            src_stages |= src_stage;
            dst_stages |= dst_stage;
            vk::ImageMemoryBarrier::default()
                .old_layout(image_layout_to_vk(t.old_layout))
                .new_layout(image_layout_to_vk(t.new_layout))
                .src_access_mask(src_access)
                .dst_access_mask(dst_access)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(vk::Image::from_raw(t.image.as_raw()))
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: aspect_to_vk(t.aspect),
                    base_mip_level: 0,
                    level_count: t.mip_levels.max(1),
                    base_array_layer: 0,
                    layer_count: 1,
                })
        })
        .collect();
    (barriers, src_stages, dst_stages)
}

pub(crate) fn record_transitions(device: &ash::Device, cb: vk::CommandBuffer, transitions: &[ImageTransition]) {
    if transitions.is_empty() {
        return;
    }
    let (barriers, src_stages, dst_stages) = transition_barriers(transitions);
    unsafe {
        device.cmd_pipeline_barrier(
            cb,
            src_stages,
            dst_stages,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &barriers,
        );
    }
}

pub(crate) fn buffer_image_copy_to_vk(region: &BufferImageCopy) -> vk::BufferImageCopy {
    vk::BufferImageCopy::default()
        .buffer_offset(region.buffer_offset)
        .buffer_row_length(0)
        .buffer_image_height(0)
        .image_subresource(color_layers(region.mip_level))
        .image_offset(vk::Offset3D { x: region.x, y: region.y, z: 0 })
        .image_extent(vk::Extent3D { width: region.width, height: region.height, depth: 1 })
}

fn color_layers(mip_level: u32) -> vk::ImageSubresourceLayers {
    vk::ImageSubresourceLayers {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        mip_level,
        base_array_layer: 0,
        layer_count: 1,
    }
}

/// Copy when extents match, otherwise a linear-filtered blit
pub(crate) fn record_copy_image(
    device: &ash::Device,
    cb: vk::CommandBuffer,
    src: vk::Image,
    src_extent: (u32, u32),
    dst: vk::Image,
    dst_extent: (u32, u32),
) {
    unsafe {
        if src_extent == dst_extent {
            let region = vk::ImageCopy::default()
                .src_subresource(color_layers(0))
                .dst_subresource(color_layers(0))
                .extent(vk::Extent3D { width: src_extent.0, height: src_extent.1, depth: 1 });
            device.cmd_copy_image(
                cb,
                src,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                dst,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );
        } else {
            let region = vk::ImageBlit::default()
                .src_subresource(color_layers(0))
                .src_offsets(blit_bounds(src_extent))
                .dst_subresource(color_layers(0))
                .dst_offsets(blit_bounds(dst_extent));
            device.cmd_blit_image(
                cb,
                src,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                dst,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
                vk::Filter::LINEAR,
            );
        }
    }
}

fn blit_bounds(extent: (u32, u32)) -> [vk::Offset3D; 2] {
    [
        vk::Offset3D { x: 0, y: 0, z: 0 },
        vk::Offset3D { x: extent.0 as i32, y: extent.1 as i32, z: 1 },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_engine::strata::device::{ImageAspect, ImageHandle, ImageLayout};

    #[test]
    fn test_clear_values() {
        let color = clear_value_to_vk(&ClearValue::Color([0.0, 0.5, 1.0, 1.0]));
        assert_eq!(unsafe { color.color.float32 }, [0.0, 0.5, 1.0, 1.0]);
        let depth = clear_value_to_vk(&ClearValue::DepthStencil { depth: 1.0, stencil: 0 });
        assert_eq!(unsafe { depth.depth_stencil.depth }, 1.0);
    }

    #[test]
    fn test_transition_barriers_merge_stages() {
        let transitions = [
            ImageTransition {
                image: ImageHandle(7),
                aspect: ImageAspect::COLOR,
                mip_levels: 4,
                old_layout: ImageLayout::Undefined,
                new_layout: ImageLayout::TransferDst,
            },
            ImageTransition {
                image: ImageHandle(9),
                aspect: ImageAspect::DEPTH | ImageAspect::STENCIL,
                mip_levels: 1,
                old_layout: ImageLayout::Undefined,
                new_layout: ImageLayout::DepthStencilAttachment,
            },
        ];
        let (barriers, src, dst) = transition_barriers(&transitions);
        assert_eq!(barriers.len(), 2);
        assert_eq!(barriers[0].image, vk::Image::from_raw(7));
        assert_eq!(barriers[0].new_layout, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
        assert_eq!(barriers[0].subresource_range.level_count, 4);
        assert_eq!(
            barriers[1].subresource_range.aspect_mask,
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        );
        assert_eq!(src, vk::PipelineStageFlags::TOP_OF_PIPE);
        assert_eq!(
            dst,
            vk::PipelineStageFlags::TRANSFER | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS
        );
    }

    #[test]
    fn test_buffer_image_copy_region() {
        let region = buffer_image_copy_to_vk(&BufferImageCopy {
            buffer_offset: 256,
            mip_level: 2,
            x: 0,
            y: 0,
            width: 16,
            height: 8,
        });
        assert_eq!(region.buffer_offset, 256);
        assert_eq!(region.image_subresource.mip_level, 2);
        assert_eq!(region.image_extent.width, 16);
        assert_eq!(region.image_extent.depth, 1);
    }

    #[test]
    fn test_blit_bounds() {
        let bounds = blit_bounds((320, 240));
        assert_eq!(bounds[1].x, 320);
        assert_eq!(bounds[1].y, 240);
        assert_eq!(bounds[1].z, 1);
    }
}
