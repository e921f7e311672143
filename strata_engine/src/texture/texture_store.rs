/// TextureStore - sampled images, their memory and their upload path
///
/// Texture images are placed through their own `ImageArena`, get a
/// combined image/sampler descriptor at creation, and are filled through a
/// shared host-visible staging buffer with one-shot transfer submissions.

use slotmap::{new_key_type, SlotMap};
use crate::error::{StrataError, StrataResult};
use crate::graphics_device::{
    submit_one_shot, BufferHandle, BufferImageCopy, BufferUsage, DescriptorSetHandle,
    GraphicsDevice, ImageAspect, ImageDesc, ImageFormat, ImageHandle, ImageLayout, ImageTiling,
    ImageTransition, ImageUsage, ImageViewDesc, ImageViewHandle, SampleCount,
};
use crate::memory::{ImageArena, ImageRequest};
use crate::texture::{AddressMode, SamplerCache, SamplerDef};
use crate::engine_debug;

/// Upper bound on copy regions per upload (one per mip level)
pub const MAX_UPLOAD_REGIONS: usize = 16;

new_key_type! {
    /// Stable key of a texture image
    pub struct TextureKey;
}

/// One sampled image with its view and descriptor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureImage {
    pub image: ImageHandle,
    pub view: ImageViewHandle,
    pub descriptor: DescriptorSetHandle,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    /// Layout the image was left in by the last upload
    pub layout: ImageLayout,
}

/// Destination rectangle of an upload, at the base mip level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadRegion {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    /// Number of mip levels whose data follows the base level in `pixels`
    pub mip_levels: u32,
}

impl UploadRegion {
    /// The whole image, with every mip level
    pub fn full(texture: &TextureImage) -> Self {
        Self {
            x: 0,
            y: 0,
            width: texture.width,
            height: texture.height,
            mip_levels: texture.mip_levels,
        }
    }
}

/// Copy regions for `region` and the byte size of the packed mip chain
///
/// Each level halves offset and extent (extents never drop below 1); the
/// chain stops at the requested level count, at 1x1, or at
/// `MAX_UPLOAD_REGIONS`.
pub fn mip_copy_regions(region: &UploadRegion, bytes_per_pixel: u32) -> (Vec<BufferImageCopy>, u64) {
    let mut regions = Vec::new();
    let mut buffer_size = 0u64;
    let (mut x, mut y) = (region.x, region.y);
    let (mut width, mut height) = (region.width, region.height);

    loop {
        regions.push(BufferImageCopy {
            buffer_offset: buffer_size,
            mip_level: regions.len() as u32,
            x,
            y,
            width,
            height,
        });
        buffer_size += width as u64 * height as u64 * bytes_per_pixel as u64;

        if regions.len() as u32 >= region.mip_levels.max(1)
            || (width == 1 && height == 1)
            || regions.len() >= MAX_UPLOAD_REGIONS
        {
            break;
        }
        x >>= 1;
        y >>= 1;
        width = (width >> 1).max(1);
        height = (height >> 1).max(1);
    }
    (regions, buffer_size)
}

fn scale_channel(value: u8, max: f32) -> u16 {
    ((value as f32 / 255.0) * max + 0.5) as u16
}

/// Convert tightly packed RGBA8 texels into `format`
///
/// # Errors
///
/// `InvalidResource` if `rgba` is not a whole number of texels or `format`
/// is not a texture format.
pub fn resample_rgba(format: ImageFormat, rgba: &[u8]) -> StrataResult<Vec<u8>> {
    if rgba.len() % 4 != 0 {
        return Err(StrataError::InvalidResource(format!(
            "RGBA data of {} bytes is not a whole number of texels",
            rgba.len()
        )));
    }
    let texels = rgba.chunks_exact(4);

    let out = match format {
        ImageFormat::R8G8B8A8_UNORM | ImageFormat::R8G8B8A8_SRGB => rgba.to_vec(),
        ImageFormat::B8G8R8A8_UNORM | ImageFormat::B8G8R8A8_SRGB => {
            texels.flat_map(|t| [t[2], t[1], t[0], t[3]]).collect()
        }
        ImageFormat::R8G8B8_UNORM => texels.flat_map(|t| [t[0], t[1], t[2]]).collect(),
        ImageFormat::B4G4R4A4_UNORM_PACK16 => texels
            .flat_map(|t| {
                let packed = scale_channel(t[3], 15.0)
                    | scale_channel(t[0], 15.0) << 4
                    | scale_channel(t[1], 15.0) << 8
                    | scale_channel(t[2], 15.0) << 12;
                packed.to_le_bytes()
            })
            .collect(),
        ImageFormat::A1R5G5B5_UNORM_PACK16 => texels
            .flat_map(|t| {
                let packed = scale_channel(t[2], 31.0)
                    | scale_channel(t[1], 31.0) << 5
                    | scale_channel(t[0], 31.0) << 10
                    | 1 << 15;
                packed.to_le_bytes()
            })
            .collect(),
        other => {
            return Err(StrataError::InvalidResource(format!("cannot resample RGBA into {:?}", other)));
        }
    };
    Ok(out)
}

pub struct TextureStore {
    arena: ImageArena,
    textures: SlotMap<TextureKey, TextureImage>,
    staging: Option<(BufferHandle, u64)>,
    staging_min: u64,
}

impl TextureStore {
    /// # Arguments
    ///
    /// * `chunk_size` - Initial chunk size of the texture arena
    /// * `staging_min` - Smallest staging buffer ever created
    pub fn new(chunk_size: u64, staging_min: u64) -> Self {
        Self {
            arena: ImageArena::new("strata::texture", chunk_size, false).with_adaptive_chunks(),
            textures: SlotMap::with_key(),
            staging: None,
            staging_min,
        }
    }

    pub fn arena(&self) -> &ImageArena {
        &self.arena
    }

    pub fn get(&self, key: TextureKey) -> Option<&TextureImage> {
        self.textures.get(key)
    }

    pub fn require(&self, key: TextureKey) -> StrataResult<&TextureImage> {
        self.textures
            .get(key)
            .ok_or_else(|| StrataError::InvalidResource(format!("unknown texture {:?}", key)))
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    /// Size of the current staging buffer, 0 if none exists yet
    pub fn staging_size(&self) -> u64 {
        self.staging.map_or(0, |(_, size)| size)
    }

    /// Create a sampled image, place it and give it a descriptor
    ///
    /// The image stays in `Undefined` layout until its first upload.
    pub fn create<D: GraphicsDevice>(
        &mut self,
        device: &mut D,
        samplers: &mut SamplerCache,
        width: u32,
        height: u32,
        format: ImageFormat,
        mip_levels: u32,
        address_mode: AddressMode,
    ) -> StrataResult<TextureKey> {
        if width == 0 || height == 0 || mip_levels == 0 {
            return Err(StrataError::InvalidResource(format!(
                "texture {}x{} with {} mip levels",
                width, height, mip_levels
            )));
        }

        let image = device.create_image(&ImageDesc {
            width,
            height,
            format,
            mip_levels,
            samples: SampleCount::S1,
            usage: ImageUsage::TRANSFER_DST | ImageUsage::SAMPLED,
            tiling: ImageTiling::Optimal,
        })?;

        self.arena.request(ImageRequest {
            image,
            view: ImageViewDesc { format, aspect: ImageAspect::COLOR, mip_levels },
            target_layout: ImageLayout::Undefined,
            lazy: false,
        });
        let placement = match self.arena.flush(device) {
            Ok(placements) => placements.into_iter().next(),
            Err(e) => {
                device.destroy_image(image);
                return Err(e);
            }
        };
        let Some(placement) = placement else {
            device.destroy_image(image);
            return Err(StrataError::InvalidResource("texture placement missing".to_string()));
        };

        let descriptor = samplers
            .find_or_create(device, &SamplerDef::texture(address_mode, mip_levels > 1))
            .and_then(|sampler| device.create_image_descriptor(placement.view, sampler));
        let descriptor = match descriptor {
            Ok(descriptor) => descriptor,
            Err(e) => {
                device.destroy_image_view(placement.view);
                device.destroy_image(image);
                return Err(e);
            }
        };

        Ok(self.textures.insert(TextureImage {
            image,
            view: placement.view,
            descriptor,
            format,
            width,
            height,
            mip_levels,
            layout: ImageLayout::Undefined,
        }))
    }

    /// Copy texels already in the image's format into `region`
    ///
    /// `pixels` holds the base level followed by each smaller mip level.
    ///
    /// # Errors
    ///
    /// `InvalidResource` for an unknown key, a region outside the image or
    /// too few bytes.
    pub fn upload<D: GraphicsDevice>(
        &mut self,
        device: &mut D,
        key: TextureKey,
        region: &UploadRegion,
        pixels: &[u8],
    ) -> StrataResult<()> {
        let texture = *self.require(key)?;
        let inside = region.x >= 0
            && region.y >= 0
            && region.x as u64 + region.width as u64 <= texture.width as u64
            && region.y as u64 + region.height as u64 <= texture.height as u64;
        if !inside || region.width == 0 || region.height == 0 || region.mip_levels > texture.mip_levels {
            return Err(StrataError::InvalidResource(format!(
                "upload region {:?} outside {}x{} texture",
                region, texture.width, texture.height
            )));
        }

        let (regions, size) = mip_copy_regions(region, texture.format.bytes_per_pixel());
        if (pixels.len() as u64) < size {
            return Err(StrataError::InvalidResource(format!(
                "upload needs {} bytes, got {}",
                size,
                pixels.len()
            )));
        }

        let staging = self.ensure_staging(device, size)?;
        device.write_buffer(staging, 0, &pixels[..size as usize])?;

        let transition = |old_layout, new_layout| ImageTransition {
            image: texture.image,
            aspect: ImageAspect::COLOR,
            mip_levels: texture.mip_levels,
            old_layout,
            new_layout,
        };
        let to_dst = transition(texture.layout, ImageLayout::TransferDst);
        let to_read = transition(ImageLayout::TransferDst, ImageLayout::ShaderReadOnly);
        submit_one_shot(device, |device, cb| {
            device.cmd_transition_images(cb, &[to_dst]);
            device.cmd_copy_buffer_to_image(cb, staging, texture.image, &regions);
            device.cmd_transition_images(cb, &[to_read]);
        })?;

        if let Some(texture) = self.textures.get_mut(key) {
            texture.layout = ImageLayout::ShaderReadOnly;
        }
        Ok(())
    }

    /// Resample RGBA8 texels into the image's format, then `upload`
    pub fn upload_rgba<D: GraphicsDevice>(
        &mut self,
        device: &mut D,
        key: TextureKey,
        region: &UploadRegion,
        rgba: &[u8],
    ) -> StrataResult<()> {
        let format = self.require(key)?.format;
        let pixels = resample_rgba(format, rgba)?;
        self.upload(device, key, region, &pixels)
    }

    /// Staging buffer of at least `size` bytes, replacing a smaller one
    fn ensure_staging<D: GraphicsDevice>(&mut self, device: &mut D, size: u64) -> StrataResult<BufferHandle> {
        if let Some((buffer, capacity)) = self.staging {
            if capacity >= size {
                return Ok(buffer);
            }
            device.destroy_buffer(buffer);
            self.staging = None;
        }
        let capacity = size.max(self.staging_min);
        let buffer = device.create_host_buffer(capacity, BufferUsage::TRANSFER_SRC)?;
        engine_debug!("strata::texture", "Staging buffer resized to {}K", capacity / 1024);
        self.staging = Some((buffer, capacity));
        Ok(buffer)
    }

    /// Destroy every texture and free the arena (chunk size adapts)
    pub fn release_all<D: GraphicsDevice>(&mut self, device: &mut D) {
        for (_, texture) in self.textures.drain() {
            device.destroy_descriptor_set(texture.descriptor);
            device.destroy_image_view(texture.view);
            device.destroy_image(texture.image);
        }
        self.arena.release_all(device);
    }

    pub fn destroy<D: GraphicsDevice>(&mut self, device: &mut D) {
        self.release_all(device);
        if let Some((buffer, _)) = self.staging.take() {
            device.destroy_buffer(buffer);
        }
    }
}

#[cfg(test)]
#[path = "texture_store_tests.rs"]
mod tests;
