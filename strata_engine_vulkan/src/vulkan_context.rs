/// VulkanContext - the already-initialized objects the backend runs on
///
/// Instance, device, queue and surface are created by the application's
/// bootstrap and outlive the backend: `VulkanGraphicsDevice` never destroys
/// them. The context also carries the attachment formats chosen for the
/// physical device.

use ash::vk;
use strata_engine::strata::device::{DeviceFormats, ImageFormat};
use strata_engine::strata::{StrataError, StrataResult};
use strata_engine::{engine_error, engine_info};

use crate::vulkan_format::format_to_vk;
use crate::vulkan_swapchain::choose_surface_format;

/// Bootstrap bundle handed to `VulkanGraphicsDevice::new`
pub struct VulkanContext {
    pub instance: ash::Instance,
    pub physical_device: vk::PhysicalDevice,
    pub device: ash::Device,
    /// Graphics queue, also used for presentation
    pub queue: vk::Queue,
    pub queue_family: u32,
    pub surface: vk::SurfaceKHR,
    pub surface_loader: ash::khr::surface::Instance,
    pub formats: DeviceFormats,
    /// VK_KHR_dedicated_allocation (core in 1.1) is usable
    pub dedicated_allocation: bool,
    /// Window size in pixels, used when the surface does not dictate one
    pub window_extent: (u32, u32),
    pub vsync: bool,
}

impl VulkanContext {
    /// Wrap bootstrap objects and pick attachment formats
    ///
    /// # Arguments
    ///
    /// * `entry` - Loader the instance was created with
    /// * `queue_family` - Family of queue 0, which must support graphics and present
    /// * `stencil_bits` - Zero selects a depth-only format
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        entry: &ash::Entry,
        instance: ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        queue_family: u32,
        surface: vk::SurfaceKHR,
        window_extent: (u32, u32),
        stencil_bits: u32,
    ) -> StrataResult<Self> {
        let surface_loader = ash::khr::surface::Instance::new(entry, &instance);
        let queue = unsafe { device.get_device_queue(queue_family, 0) };

        let surface_formats = unsafe {
            surface_loader
                .get_physical_device_surface_formats(physical_device, surface)
                .map_err(|e| {
                    engine_error!("strata::vulkan", "Failed to query surface formats: {:?}", e);
                    StrataError::InitializationFailed(format!("Failed to query surface formats: {:?}", e))
                })?
        };
        let (_, base) = choose_surface_format(&surface_formats).ok_or_else(|| {
            engine_error!("strata::vulkan", "No supported surface format");
            StrataError::InitializationFailed("No supported surface format".to_string())
        })?;

        let formats = select_device_formats(base, stencil_bits, |format| unsafe {
            instance.get_physical_device_format_properties(physical_device, format)
        })?;

        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let dedicated_allocation = properties.api_version >= vk::API_VERSION_1_1;

        engine_info!(
            "strata::vulkan",
            "Formats: color {:?}, depth {:?}, capture {:?}, bloom {:?}",
            formats.color,
            formats.depth,
            formats.capture,
            formats.bloom
        );

        Ok(Self {
            instance,
            physical_device,
            device,
            queue,
            queue_family,
            surface,
            surface_loader,
            formats,
            dedicated_allocation,
            window_extent,
            vsync: true,
        })
    }

    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    /// Override the color/bloom attachment format (e.g. a 16-bit HDR target)
    pub fn with_color_format(mut self, format: ImageFormat) -> Self {
        self.formats.color = format;
        self
    }
}

/// Pick depth, color, capture and bloom formats
///
/// Depth takes the first candidate with optimal-tiling depth/stencil
/// attachment support. Capture is RGBA8 when the color format can be blitted
/// into a linear RGBA8 image; otherwise it falls back to the color format so
/// readback can use a plain copy.
pub(crate) fn select_device_formats(
    base: ImageFormat,
    stencil_bits: u32,
    properties: impl Fn(vk::Format) -> vk::FormatProperties,
) -> StrataResult<DeviceFormats> {
    let candidates: &[ImageFormat] = if stencil_bits > 0 {
        &[ImageFormat::D24_UNORM_S8_UINT, ImageFormat::D32_SFLOAT_S8_UINT]
    } else {
        &[ImageFormat::D32_SFLOAT, ImageFormat::D16_UNORM]
    };
    let depth = candidates
        .iter()
        .copied()
        .find(|format| {
            properties(format_to_vk(*format))
                .optimal_tiling_features
                .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
        })
        .ok_or_else(|| {
            engine_error!("strata::vulkan", "No depth attachment format (stencil bits {})", stencil_bits);
            StrataError::InitializationFailed("No depth attachment format".to_string())
        })?;

    let capture = ImageFormat::R8G8B8A8_UNORM;
    let blit_src = properties(format_to_vk(base))
        .optimal_tiling_features
        .contains(vk::FormatFeatureFlags::BLIT_SRC);
    let blit_dst = properties(format_to_vk(capture))
        .linear_tiling_features
        .contains(vk::FormatFeatureFlags::BLIT_DST);
    let capture = if blit_src && blit_dst { capture } else { base };

    Ok(DeviceFormats { color: base, depth, capture, bloom: base })
}
