/// Synchronous GPU to CPU pixel readback
///
/// The source image is copied into a linear host-visible image in one
/// one-shot submission, mapped, and converted to tightly packed RGB8 rows
/// in bottom-up order: the first output row is the bottom row of the image.

use crate::error::{StrataError, StrataResult};
use crate::graphics_device::{
    find_preferred_memory_type, submit_one_shot, GraphicsDevice, ImageAspect, ImageDesc,
    ImageFormat, ImageHandle, ImageLayout, ImageTiling, ImageTransition, ImageUsage, MappedImage,
    MemoryProperties, SampleCount,
};
use crate::engine_error;

/// Readback memory, fastest for CPU reads first
pub const READBACK_MEMORY_PREFERENCES: [MemoryProperties; 4] = [
    MemoryProperties::HOST_VISIBLE
        .union(MemoryProperties::HOST_COHERENT)
        .union(MemoryProperties::HOST_CACHED),
    MemoryProperties::HOST_VISIBLE.union(MemoryProperties::HOST_CACHED),
    MemoryProperties::HOST_VISIBLE.union(MemoryProperties::HOST_COHERENT),
    MemoryProperties::HOST_VISIBLE,
];

/// Image to read from and the layout it currently rests in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadbackSource {
    pub image: ImageHandle,
    pub layout: ImageLayout,
    pub format: ImageFormat,
}

/// Copy the top-left `width` x `height` texels of `source` into host memory
///
/// The source is restored to its resting layout in the same submission.
pub fn read_image<D: GraphicsDevice>(
    device: &mut D,
    source: &ReadbackSource,
    width: u32,
    height: u32,
) -> StrataResult<MappedImage> {
    let linear = device.create_image(&ImageDesc {
        width,
        height,
        format: source.format,
        mip_levels: 1,
        samples: SampleCount::S1,
        usage: ImageUsage::TRANSFER_DST,
        tiling: ImageTiling::Linear,
    })?;

    let result = (|| {
        let reqs = device.image_memory_requirements(linear)?;
        let memory_type = find_preferred_memory_type(
            &device.memory_types(),
            reqs.type_bits,
            &READBACK_MEMORY_PREFERENCES,
        )
        .ok_or_else(|| {
            engine_error!("strata::readback", "No host-visible memory type for image capture");
            StrataError::NoCompatibleMemoryType {
                type_bits: reqs.type_bits,
                properties: MemoryProperties::HOST_VISIBLE.bits(),
            }
        })?;
        let memory = device.allocate_memory(reqs.size, memory_type, None)?;

        let mapped = (|| {
            device.bind_image_memory(linear, memory, 0)?;

            let transition = |image, old_layout, new_layout| ImageTransition {
                image,
                aspect: ImageAspect::COLOR,
                mip_levels: 1,
                old_layout,
                new_layout,
            };
            let moves_source = source.layout != ImageLayout::TransferSrc;
            submit_one_shot(device, |device, cb| {
                let mut before = vec![transition(linear, ImageLayout::Undefined, ImageLayout::TransferDst)];
                if moves_source {
                    before.push(transition(source.image, source.layout, ImageLayout::TransferSrc));
                }
                device.cmd_transition_images(cb, &before);
                device.cmd_copy_image(cb, source.image, (width, height), linear, (width, height));
                if moves_source {
                    device.cmd_transition_images(
                        cb,
                        &[transition(source.image, ImageLayout::TransferSrc, source.layout)],
                    );
                }
            })?;

            device.read_linear_image(linear, memory)
        })();

        device.free_memory(memory);
        mapped
    })();

    device.destroy_image(linear);
    result
}

/// Convert mapped rows of `format` into packed RGB8, flipped to bottom-up
///
/// Output row 0 is the last mapped row (the bottom of the image). Packed
/// formats are expanded per channel; 16-bit channels keep their high byte;
/// 8-bit formats copy the first three bytes of each texel. Blue-first
/// formats are swapped back to RGB.
///
/// # Errors
///
/// `InvalidResource` if `out` or the mapped data is too small, or if
/// `format` has no color conversion (depth formats).
pub fn convert_readback(
    mapped: &MappedImage,
    format: ImageFormat,
    width: u32,
    height: u32,
    out: &mut [u8],
) -> StrataResult<()> {
    let decode = texel_decoder(format)?;
    let (w, h) = (width as usize, height as usize);
    let bpp = format.bytes_per_pixel() as usize;
    let pitch = mapped.row_pitch as usize;
    let needed = if h == 0 { 0 } else { pitch * (h - 1) + w * bpp };

    if out.len() < w * h * 3 {
        return Err(StrataError::InvalidResource(format!(
            "readback buffer of {} bytes is smaller than {}x{} RGB",
            out.len(), width, height
        )));
    }
    if mapped.data.len() < needed {
        return Err(StrataError::InvalidResource(format!(
            "mapped image holds {} bytes, need {}",
            mapped.data.len(), needed
        )));
    }

    for row in 0..h {
        let src = &mapped.data[row * pitch..row * pitch + w * bpp];
        let dst_row = h - 1 - row;
        let dst = &mut out[dst_row * w * 3..(dst_row + 1) * w * 3];

        for (texel, rgb) in src.chunks_exact(bpp).zip(dst.chunks_exact_mut(3)) {
            decode(texel, rgb);
        }
    }

    if format.is_bgr() {
        for rgb in out[..w * h * 3].chunks_exact_mut(3) {
            rgb.swap(0, 2);
        }
    }
    Ok(())
}

/// Texel to 8-bit channels in memory order (before any blue-first swap)
type TexelDecoder = fn(&[u8], &mut [u8]);

fn texel_decoder(format: ImageFormat) -> StrataResult<TexelDecoder> {
    let decode: TexelDecoder = match format {
        ImageFormat::B4G4R4A4_UNORM_PACK16 => |texel, rgb| {
            let packed = u16::from_le_bytes([texel[0], texel[1]]);
            for (channel, value) in rgb.iter_mut().enumerate() {
                *value = (((packed >> (12 - 4 * channel)) & 0xF) << 4) as u8;
            }
        },
        ImageFormat::A1R5G5B5_UNORM_PACK16 => |texel, rgb| {
            let packed = u16::from_le_bytes([texel[0], texel[1]]);
            for (channel, value) in rgb.iter_mut().enumerate() {
                let bits = (packed >> (10 - 5 * channel)) & 0x1F;
                *value = ((bits << 3) | (bits >> 2)) as u8;
            }
        },
        ImageFormat::A2B10G10R10_UNORM_PACK32 => |texel, rgb| {
            let packed = u32::from_le_bytes([texel[0], texel[1], texel[2], texel[3]]);
            for (channel, value) in rgb.iter_mut().enumerate() {
                *value = ((packed >> (10 * channel + 2)) & 0xFF) as u8;
            }
        },
        ImageFormat::R16G16B16A16_UNORM => |texel, rgb| {
            for (channel, value) in rgb.iter_mut().enumerate() {
                *value = texel[channel * 2 + 1];
            }
        },
        ImageFormat::R8G8B8A8_UNORM
        | ImageFormat::R8G8B8A8_SRGB
        | ImageFormat::B8G8R8A8_UNORM
        | ImageFormat::B8G8R8A8_SRGB
        | ImageFormat::R8G8B8_UNORM => |texel, rgb| rgb.copy_from_slice(&texel[..3]),
        ImageFormat::D16_UNORM
        | ImageFormat::D24_UNORM_S8_UINT
        | ImageFormat::D32_SFLOAT
        | ImageFormat::D32_SFLOAT_S8_UINT => {
            engine_error!("strata::readback", "No color readback from {:?}", format);
            return Err(StrataError::InvalidResource(format!("no color readback from {:?}", format)));
        }
    };
    Ok(decode)
}

#[cfg(test)]
#[path = "readback_tests.rs"]
mod tests;
