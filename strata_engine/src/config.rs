/// Renderer configuration surface
///
/// Plain values read once at `RendererContext` creation. Everything the
/// frame core needs to size its arenas, caches and pass graph lives here.

use crate::error::{StrataError, StrataResult};
use crate::graphics_device::SampleCount;

const MIB: u64 = 1024 * 1024;

/// Maximum number of bloom blur cascades
pub const MAX_BLOOM_PASSES: u32 = 4;

/// Renderer configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    /// Number of independently fenced frame slots
    pub frames_in_flight: u32,
    /// Sample count of the main color/depth attachments
    pub msaa_samples: SampleCount,
    pub bloom: bool,
    /// Blur cascades at halving resolution
    pub bloom_passes: u32,
    /// Render into offscreen attachments and finish with a gamma pass.
    /// When false, the main pass targets swapchain images directly.
    pub post_processing: bool,
    /// Offscreen resolution relative to the window, in (0, 1]
    pub render_scale: f32,
    pub stencil_bits: u32,
    /// Give lone image requests a dedicated allocation
    pub dedicated_allocation: bool,
    /// Allow the reduced-resolution pre-pass
    pub screen_map: bool,
    /// Initial chunk size of the texture arena
    pub image_chunk_size: u64,
    /// Chunk size of the attachment arena; bounds the largest attachment
    pub attachment_chunk_size: u64,
    /// Initial per-slot geometry ring capacity
    pub geometry_buffer_size: u64,
    pub geometry_alignment: u64,
    /// Lower bound of the image upload staging buffer
    pub staging_buffer_min: u64,
    pub fence_timeout_ns: u64,
    pub acquire_timeout_ns: u64,
    pub max_pipelines: usize,
    pub max_samplers: usize,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            msaa_samples: SampleCount::S1,
            bloom: false,
            bloom_passes: MAX_BLOOM_PASSES,
            post_processing: true,
            render_scale: 1.0,
            stencil_bits: 8,
            dedicated_allocation: false,
            screen_map: true,
            image_chunk_size: 32 * MIB,
            attachment_chunk_size: 64 * MIB,
            geometry_buffer_size: 8 * MIB,
            geometry_alignment: 32,
            staging_buffer_min: 2 * MIB,
            fence_timeout_ns: 10_000_000_000,
            acquire_timeout_ns: 1_000_000_000,
            max_pipelines: 1152,
            max_samplers: 32,
        }
    }
}

impl RendererConfig {
    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns `StrataError::InvalidConfig` naming the first offending field.
    pub fn validate(&self) -> StrataResult<()> {
        if self.frames_in_flight < 2 {
            return Err(StrataError::InvalidConfig(format!(
                "frames_in_flight must be at least 2 (got {})",
                self.frames_in_flight
            )));
        }
        if self.bloom && (self.bloom_passes == 0 || self.bloom_passes > MAX_BLOOM_PASSES) {
            return Err(StrataError::InvalidConfig(format!(
                "bloom_passes must be in 1..={} (got {})",
                MAX_BLOOM_PASSES, self.bloom_passes
            )));
        }
        if !(self.render_scale > 0.0 && self.render_scale <= 1.0) {
            return Err(StrataError::InvalidConfig(format!(
                "render_scale must be in (0, 1] (got {})",
                self.render_scale
            )));
        }
        if self.msaa_samples.is_multisampled() && !self.post_processing {
            return Err(StrataError::InvalidConfig(
                "msaa_samples requires post_processing".to_string(),
            ));
        }
        for (name, value) in [
            ("image_chunk_size", self.image_chunk_size),
            ("attachment_chunk_size", self.attachment_chunk_size),
            ("geometry_buffer_size", self.geometry_buffer_size),
            ("staging_buffer_min", self.staging_buffer_min),
        ] {
            if value == 0 {
                return Err(StrataError::InvalidConfig(format!("{} must be non-zero", name)));
            }
        }
        if !self.geometry_alignment.is_power_of_two() {
            return Err(StrataError::InvalidConfig(format!(
                "geometry_alignment must be a power of two (got {})",
                self.geometry_alignment
            )));
        }
        if self.max_pipelines == 0 || self.max_samplers == 0 {
            return Err(StrataError::InvalidConfig(
                "max_pipelines and max_samplers must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether the bloom sub-graph runs
    pub fn bloom_active(&self) -> bool {
        self.post_processing && self.bloom
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
