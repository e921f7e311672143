/// Swapchain - presentable images of the window surface
///
/// Creation picks format, present mode, extent and image count from the
/// surface capabilities. Destruction only happens with the device idle, on
/// restart or shutdown. Acquire and present report explicit statuses; the
/// frame controller decides when to rebuild.

use ash::vk;
use strata_engine::strata::device::{AcquireStatus, ImageFormat, PresentStatus};
use strata_engine::strata::{StrataError, StrataResult};
use strata_engine::{engine_err, engine_error, engine_info};

use crate::vulkan_format::{acquire_status_from_vk, format_from_vk, present_status_from_vk};

/// Pick the surface format
///
/// Prefers UNORM BGRA then RGBA in the sRGB-nonlinear color space (the
/// gamma pass applies its own curve); falls back to the first format the
/// core knows about.
pub(crate) fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<(vk::SurfaceFormatKHR, ImageFormat)> {
    // a single UNDEFINED entry means any format is accepted
    if let [only] = formats {
        if only.format == vk::Format::UNDEFINED {
            let format = vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            };
            return Some((format, ImageFormat::B8G8R8A8_UNORM));
        }
    }
    let preferred = [vk::Format::B8G8R8A8_UNORM, vk::Format::R8G8B8A8_UNORM];
    preferred
        .iter()
        .find_map(|wanted| {
            formats
                .iter()
                .find(|f| f.format == *wanted && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR)
        })
        .or_else(|| formats.iter().find(|f| format_from_vk(f.format).is_some()))
        .and_then(|f| format_from_vk(f.format).map(|format| (*f, format)))
}

/// FIFO with vsync; otherwise MAILBOX, then IMMEDIATE, then FIFO
pub(crate) fn choose_present_mode(modes: &[vk::PresentModeKHR], vsync: bool) -> vk::PresentModeKHR {
    if vsync {
        return vk::PresentModeKHR::FIFO;
    }
    [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE]
        .into_iter()
        .find(|mode| modes.contains(mode))
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// Surface extent, or the window extent clamped to the surface limits
pub(crate) fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, window: (u32, u32)) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        return caps.current_extent;
    }
    vk::Extent2D {
        width: window.0.clamp(caps.min_image_extent.width, caps.max_image_extent.width),
        height: window.1.clamp(caps.min_image_extent.height, caps.max_image_extent.height),
    }
}

/// One image above the minimum, capped by the maximum (zero means unbounded)
pub(crate) fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = caps.min_image_count + 1;
    if caps.max_image_count > 0 {
        count.min(caps.max_image_count)
    } else {
        count
    }
}

/// Live swapchain and its image views
pub(crate) struct Swapchain {
    pub(crate) swapchain: vk::SwapchainKHR,
    pub(crate) images: Vec<vk::Image>,
    pub(crate) views: Vec<vk::ImageView>,
    pub(crate) format: ImageFormat,
    pub(crate) extent: vk::Extent2D,
}

/// Surface and loaders needed to (re)create swapchains
pub(crate) struct SurfaceContext<'a> {
    pub(crate) device: &'a ash::Device,
    pub(crate) physical_device: vk::PhysicalDevice,
    pub(crate) surface: vk::SurfaceKHR,
    pub(crate) surface_loader: &'a ash::khr::surface::Instance,
    pub(crate) swapchain_loader: &'a ash::khr::swapchain::Device,
    pub(crate) window_extent: (u32, u32),
    pub(crate) vsync: bool,
}

impl Swapchain {
    pub(crate) fn new(ctx: &SurfaceContext<'_>) -> StrataResult<Self> {
        unsafe {
            let caps = ctx
                .surface_loader
                .get_physical_device_surface_capabilities(ctx.physical_device, ctx.surface)
                .map_err(|e| init_failed("Failed to get surface capabilities", e))?;
            let formats = ctx
                .surface_loader
                .get_physical_device_surface_formats(ctx.physical_device, ctx.surface)
                .map_err(|e| init_failed("Failed to get surface formats", e))?;
            let modes = ctx
                .surface_loader
                .get_physical_device_surface_present_modes(ctx.physical_device, ctx.surface)
                .map_err(|e| init_failed("Failed to get surface present modes", e))?;

            let (surface_format, format) = choose_surface_format(&formats).ok_or_else(|| {
                engine_error!("strata::vulkan", "No supported surface format among {} candidates", formats.len());
                StrataError::InitializationFailed("No supported surface format".to_string())
            })?;
            let extent = choose_extent(&caps, ctx.window_extent);
            if extent.width == 0 || extent.height == 0 {
                engine_error!("strata::vulkan", "Surface has zero extent");
                return Err(StrataError::InitializationFailed("Surface has zero extent".to_string()));
            }
            let present_mode = choose_present_mode(&modes, ctx.vsync);

            let create_info = vk::SwapchainCreateInfoKHR::default()
                .surface(ctx.surface)
                .min_image_count(choose_image_count(&caps))
                .image_format(surface_format.format)
                .image_color_space(surface_format.color_space)
                .image_extent(extent)
                .image_array_layers(1)
                // transfer usage for readback without post-processing
                .image_usage(
                    vk::ImageUsageFlags::COLOR_ATTACHMENT
                        | vk::ImageUsageFlags::TRANSFER_SRC
                        | vk::ImageUsageFlags::TRANSFER_DST,
                )
                .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
                .pre_transform(caps.current_transform)
                .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
                .present_mode(present_mode)
                .clipped(true);

            let swapchain = ctx
                .swapchain_loader
                .create_swapchain(&create_info, None)
                .map_err(|e| init_failed("Failed to create swapchain", e))?;

            let images = match ctx.swapchain_loader.get_swapchain_images(swapchain) {
                Ok(images) => images,
                Err(e) => {
                    ctx.swapchain_loader.destroy_swapchain(swapchain, None);
                    return Err(init_failed("Failed to get swapchain images", e));
                }
            };

            let mut views = Vec::with_capacity(images.len());
            for &image in &images {
                let view_info = vk::ImageViewCreateInfo::default()
                    .image(image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(surface_format.format)
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    });
                match ctx.device.create_image_view(&view_info, None) {
                    Ok(view) => views.push(view),
                    Err(e) => {
                        for view in views {
                            ctx.device.destroy_image_view(view, None);
                        }
                        ctx.swapchain_loader.destroy_swapchain(swapchain, None);
                        return Err(init_failed("Failed to create swapchain image view", e));
                    }
                }
            }

            engine_info!(
                "strata::vulkan",
                "Swapchain {}x{} {:?}, {} images, {:?}",
                extent.width,
                extent.height,
                format,
                images.len(),
                present_mode
            );

            Ok(Self { swapchain, images, views, format, extent })
        }
    }

    pub(crate) fn acquire(
        &self,
        loader: &ash::khr::swapchain::Device,
        semaphore: vk::Semaphore,
        timeout_ns: u64,
    ) -> StrataResult<AcquireStatus> {
        let result = unsafe { loader.acquire_next_image(self.swapchain, timeout_ns, semaphore, vk::Fence::null()) };
        match acquire_status_from_vk(result) {
            Some(status) => Ok(status),
            None => match result {
                Err(vk::Result::ERROR_DEVICE_LOST) => Err(StrataError::DeviceLost),
                Err(e) => Err(engine_err!("strata::vulkan", "Failed to acquire swapchain image: {:?}", e)),
                Ok(_) => Err(engine_err!("strata::vulkan", "Unexpected acquire result")),
            },
        }
    }

    pub(crate) fn present(
        &self,
        loader: &ash::khr::swapchain::Device,
        queue: vk::Queue,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> StrataResult<PresentStatus> {
        let wait_semaphores = [wait];
        let swapchains = [self.swapchain];
        let indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&indices);
        let result = unsafe { loader.queue_present(queue, &present_info) };
        present_status_from_vk(result).ok_or_else(|| {
            engine_err!("strata::vulkan", "Failed to present swapchain image: {:?}", result)
        })
    }

    /// Destroy views and swapchain (device must be idle)
    pub(crate) fn destroy(self, device: &ash::Device, loader: &ash::khr::swapchain::Device) {
        unsafe {
            for view in self.views {
                device.destroy_image_view(view, None);
            }
            loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

fn init_failed(what: &str, e: vk::Result) -> StrataError {
    engine_error!("strata::vulkan", "{}: {:?}", what, e);
    StrataError::InitializationFailed(format!("{}: {:?}", what, e))
}

#[cfg(test)]
#[path = "vulkan_swapchain_tests.rs"]
mod tests;
