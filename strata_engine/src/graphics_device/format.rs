/// Image formats, layouts and image creation descriptors

use bitflags::bitflags;
use crate::graphics_device::ImageHandle;

/// Pixel formats used by attachments, textures and the swapchain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum ImageFormat {
    R8G8B8A8_UNORM,
    R8G8B8A8_SRGB,
    B8G8R8A8_UNORM,
    B8G8R8A8_SRGB,
    R8G8B8_UNORM,
    B4G4R4A4_UNORM_PACK16,
    A1R5G5B5_UNORM_PACK16,
    A2B10G10R10_UNORM_PACK32,
    R16G16B16A16_UNORM,
    D16_UNORM,
    D24_UNORM_S8_UINT,
    D32_SFLOAT,
    D32_SFLOAT_S8_UINT,
}

impl ImageFormat {
    /// Size of one texel in bytes
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            ImageFormat::B4G4R4A4_UNORM_PACK16
            | ImageFormat::A1R5G5B5_UNORM_PACK16
            | ImageFormat::D16_UNORM => 2,
            ImageFormat::R8G8B8_UNORM => 3,
            ImageFormat::R16G16B16A16_UNORM | ImageFormat::D32_SFLOAT_S8_UINT => 8,
            _ => 4,
        }
    }

    pub fn is_depth(&self) -> bool {
        matches!(
            self,
            ImageFormat::D16_UNORM
                | ImageFormat::D24_UNORM_S8_UINT
                | ImageFormat::D32_SFLOAT
                | ImageFormat::D32_SFLOAT_S8_UINT
        )
    }

    pub fn has_stencil(&self) -> bool {
        matches!(self, ImageFormat::D24_UNORM_S8_UINT | ImageFormat::D32_SFLOAT_S8_UINT)
    }

    /// Whether the red channel is stored after blue in memory
    pub fn is_bgr(&self) -> bool {
        matches!(
            self,
            ImageFormat::B8G8R8A8_UNORM
                | ImageFormat::B8G8R8A8_SRGB
                | ImageFormat::B4G4R4A4_UNORM_PACK16
        )
    }

    /// Aspect an image view of this format covers
    pub fn aspect(&self) -> ImageAspect {
        if self.has_stencil() {
            ImageAspect::DEPTH | ImageAspect::STENCIL
        } else if self.is_depth() {
            ImageAspect::DEPTH
        } else {
            ImageAspect::COLOR
        }
    }
}

/// Image layouts tracked across passes and transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageLayout {
    Undefined,
    General,
    ColorAttachment,
    DepthStencilAttachment,
    ShaderReadOnly,
    TransferSrc,
    TransferDst,
    PresentSrc,
}

/// Multisample count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SampleCount {
    S1,
    S2,
    S4,
    S8,
}

impl SampleCount {
    pub fn count(&self) -> u32 {
        match self {
            SampleCount::S1 => 1,
            SampleCount::S2 => 2,
            SampleCount::S4 => 4,
            SampleCount::S8 => 8,
        }
    }

    pub fn is_multisampled(&self) -> bool {
        *self != SampleCount::S1
    }
}

/// Memory arrangement of image texels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageTiling {
    Optimal,
    /// Row-major texels readable through a host mapping
    Linear,
}

bitflags! {
    /// How an image will be used
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageUsage: u32 {
        const TRANSFER_SRC = 0x01;
        const TRANSFER_DST = 0x02;
        const SAMPLED = 0x04;
        const COLOR_ATTACHMENT = 0x10;
        const DEPTH_STENCIL_ATTACHMENT = 0x20;
        const TRANSIENT_ATTACHMENT = 0x40;
    }
}

bitflags! {
    /// Image aspects covered by a view or a transition
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageAspect: u32 {
        const COLOR = 0x1;
        const DEPTH = 0x2;
        const STENCIL = 0x4;
    }
}

/// Descriptor for creating an image (memory is bound separately)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageDesc {
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    pub mip_levels: u32,
    pub samples: SampleCount,
    pub usage: ImageUsage,
    pub tiling: ImageTiling,
}

/// Descriptor for creating an image view
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageViewDesc {
    pub format: ImageFormat,
    pub aspect: ImageAspect,
    pub mip_levels: u32,
}

/// One layout transition recorded as an image barrier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageTransition {
    pub image: ImageHandle,
    pub aspect: ImageAspect,
    pub mip_levels: u32,
    pub old_layout: ImageLayout,
    pub new_layout: ImageLayout,
}
