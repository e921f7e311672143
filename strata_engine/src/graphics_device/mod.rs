/// Graphics device module - the trait seam and the value types crossing it

pub mod graphics_device;
pub mod handles;
pub mod format;
pub mod memory;
pub mod buffer;
pub mod frame_buffer;
pub mod swapchain;
pub mod one_shot;

pub use graphics_device::*;
pub use handles::*;
pub use format::*;
pub use memory::*;
pub use buffer::*;
pub use frame_buffer::*;
pub use swapchain::*;
pub use one_shot::*;

// Mock graphics device for tests (no GPU required)
#[cfg(test)]
pub mod mock_graphics_device;
