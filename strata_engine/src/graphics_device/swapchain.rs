/// Presentation and synchronization status types
///
/// The swapchain itself lives behind `GraphicsDevice`; these types carry the
/// outcomes the frame controller must branch on instead of opaque errors.

use crate::graphics_device::{ImageFormat, ImageHandle, ImageViewHandle};

/// Outcome of acquiring a presentable image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireStatus {
    /// Image acquired
    Acquired(u32),
    /// Image acquired but the surface no longer matches exactly
    Suboptimal(u32),
    /// Surface is stale; the swapchain must be rebuilt before acquiring
    OutOfDate,
    /// No image became available within the timeout
    Timeout,
}

/// Outcome of presenting an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentStatus {
    Presented,
    Suboptimal,
    OutOfDate,
    DeviceLost,
}

/// Outcome of a bounded fence wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceStatus {
    Signaled,
    Timeout,
    DeviceLost,
}

/// Presentable images of a freshly created swapchain
#[derive(Debug, Clone, PartialEq)]
pub struct SwapchainInfo {
    pub images: Vec<ImageHandle>,
    pub views: Vec<ImageViewHandle>,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

impl SwapchainInfo {
    /// Number of presentable images
    pub fn image_count(&self) -> u32 {
        self.images.len() as u32
    }
}
