/*!
# Strata Engine - Vulkan Backend

Vulkan implementation of the strata `GraphicsDevice` trait.

The backend runs on objects created by the application's bootstrap (instance,
device, graphics/present queue, window surface), bundled in a
[`VulkanContext`]. It uses Ash for the Vulkan bindings and gpu-allocator for
the host-visible buffers; image memory is allocated raw because the frame
core places images itself.

```no_run
use strata_engine::strata::RendererContext;
use strata_engine::strata::render::RendererConfig;
use strata_engine_vulkan::{ShaderLibrary, VulkanContext, VulkanGraphicsDevice};

# fn run(ctx: VulkanContext, shaders: ShaderLibrary) -> strata_engine::strata::StrataResult<()> {
let device = VulkanGraphicsDevice::new(ctx, &shaders)?;
let mut renderer = RendererContext::new(device, RendererConfig::default())?;
renderer.begin_frame()?;
renderer.end_frame()?;
# Ok(())
# }
```
*/

mod vulkan_format;
mod vulkan_shader;
mod vulkan_pipeline;
mod vulkan_swapchain;
mod vulkan_buffer;
mod vulkan_descriptor_set;
mod vulkan_command_list;
mod vulkan_context;
mod vulkan_graphics_device;

pub use vulkan_context::VulkanContext;
pub use vulkan_graphics_device::VulkanGraphicsDevice;
pub use vulkan_shader::{ShaderCode, ShaderLibrary};
