/*!
# Strata Engine

Backend-agnostic GPU frame core for an explicit graphics API.

The crate owns every policy decision of a Vulkan-style renderer (memory
placement, pipeline permutation caching, per-frame geometry staging,
descriptor binding, the render pass graph and frame pacing) and drives a
native device through the `GraphicsDevice` trait. Backends implement that
trait over an already-initialized device, queue and surface.

## Architecture

- **RendererContext**: the frame API (`begin_frame`, `bind_pipeline`,
  `bind_geometry`, `draw_geometry`, `end_frame`, images, readback)
- **ImageArena**: chunked bump allocation of image memory
- **PipelineCache**: definition interning with per-pass lazy compilation
- **GeometryRing**: per-slot host-visible vertex/index/uniform staging
- **DescriptorTracker**: minimal-diff descriptor set binding
- **RenderPassGraph**: screen map, main, bloom, capture and gamma passes
- **FrameController**: fenced frame slots, acquire, submit, present
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod config;
pub mod graphics_device;
pub mod memory;
pub mod pipeline;
pub mod geometry;
pub mod descriptor;
pub mod render_pass;
pub mod frame;
pub mod texture;
pub mod renderer_context;

// Main strata namespace module
pub mod strata {
    // Error types
    pub use crate::error::{StrataError, StrataResult};

    // Logger registry
    pub use crate::engine::Engine;

    // Frame API entry point
    pub use crate::renderer_context::RendererContext;

    // Logging sub-module (types only; the engine_* macros live at the crate root)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger, format_entry};
    }

    // Device seam implemented by backends
    pub mod device {
        pub use crate::graphics_device::*;
    }

    // Frame core components
    pub mod render {
        pub use crate::config::*;
        pub use crate::renderer_context::*;
        pub use crate::memory::*;
        pub use crate::pipeline::*;
        pub use crate::geometry::*;
        pub use crate::descriptor::*;
        pub use crate::render_pass::*;
        pub use crate::frame::*;
        pub use crate::texture::*;
    }
}

// Re-export math library at crate root
pub use glam;
