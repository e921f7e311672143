/// Sampler definitions and the deduplicating sampler cache

use rustc_hash::FxHashMap;
use crate::error::{StrataError, StrataResult};
use crate::graphics_device::{GraphicsDevice, SamplerHandle};
use crate::engine_error;

/// Max LOD of a sampler that follows the whole mip chain
pub const LOD_CLAMP_NONE: f32 = 1000.0;

/// Max LOD of a sampler over a single-level image
///
/// Slightly above zero so magnification and minification still pick
/// different filters.
pub const LOD_BASE_ONLY: f32 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MipmapMode {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    Repeat,
    ClampToEdge,
}

/// Complete sampler state, compared structurally
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerDef {
    pub address_mode: AddressMode,
    pub mag_filter: Filter,
    pub min_filter: Filter,
    /// `None` samples the base level only
    pub mipmap_mode: Option<MipmapMode>,
    /// Clamp the LOD range to [0, 1]
    pub max_lod_one: bool,
    pub anisotropy: bool,
}

impl Default for SamplerDef {
    fn default() -> Self {
        Self::texture(AddressMode::Repeat, false)
    }
}

impl SamplerDef {
    /// Sampler for a texture image
    ///
    /// Mipmapped images get trilinear filtering with anisotropy; single-level
    /// images get plain bilinear filtering.
    pub fn texture(address_mode: AddressMode, mipmapped: bool) -> Self {
        Self {
            address_mode,
            mag_filter: Filter::Linear,
            min_filter: Filter::Linear,
            mipmap_mode: mipmapped.then_some(MipmapMode::Linear),
            max_lod_one: false,
            anisotropy: mipmapped,
        }
    }

    /// Sampler for a render attachment read by a post-processing pass
    pub fn attachment(filter: Filter) -> Self {
        Self {
            address_mode: AddressMode::ClampToEdge,
            mag_filter: filter,
            min_filter: filter,
            mipmap_mode: None,
            max_lod_one: true,
            anisotropy: false,
        }
    }

    pub fn max_lod(&self) -> f32 {
        if self.max_lod_one {
            1.0
        } else if self.mipmap_mode.is_some() {
            LOD_CLAMP_NONE
        } else {
            LOD_BASE_ONLY
        }
    }
}

/// Creates each distinct sampler once and hands out the shared handle
pub struct SamplerCache {
    samplers: FxHashMap<SamplerDef, SamplerHandle>,
    limit: usize,
}

impl SamplerCache {
    pub fn new(limit: usize) -> Self {
        Self {
            samplers: FxHashMap::default(),
            limit,
        }
    }

    /// Handle of a sampler equal to `def`, creating it on first request
    ///
    /// # Errors
    ///
    /// `CapacityExceeded` once `limit` distinct samplers exist.
    pub fn find_or_create<D: GraphicsDevice>(
        &mut self,
        device: &mut D,
        def: &SamplerDef,
    ) -> StrataResult<SamplerHandle> {
        if let Some(&handle) = self.samplers.get(def) {
            return Ok(handle);
        }
        if self.samplers.len() >= self.limit {
            engine_error!("strata::texture", "Sampler table full ({} entries)", self.limit);
            return Err(StrataError::CapacityExceeded { what: "samplers", limit: self.limit });
        }
        let handle = device.create_sampler(def)?;
        self.samplers.insert(*def, handle);
        Ok(handle)
    }

    pub fn len(&self) -> usize {
        self.samplers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samplers.is_empty()
    }

    pub fn destroy<D: GraphicsDevice>(&mut self, device: &mut D) {
        for (_, handle) in self.samplers.drain() {
            device.destroy_sampler(handle);
        }
    }
}

#[cfg(test)]
#[path = "sampler_tests.rs"]
mod tests;
