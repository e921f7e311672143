/// Shader byte code per shader variant and the modules built from it
///
/// Shader compilation happens outside the renderer; the application hands
/// over precompiled SPIR-V for every variant it intends to draw with.

use ash::vk;
use rustc_hash::FxHashMap;
use strata_engine::strata::render::ShaderVariant;
use strata_engine::strata::{StrataError, StrataResult};
use strata_engine::{engine_bail, engine_err};

/// SPIR-V words of one vertex/fragment pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderCode {
    pub vertex: Vec<u32>,
    pub fragment: Vec<u32>,
}

/// Precompiled shader code keyed by variant
#[derive(Debug, Clone, Default)]
pub struct ShaderLibrary {
    variants: FxHashMap<ShaderVariant, ShaderCode>,
}

impl ShaderLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, variant: ShaderVariant, code: ShaderCode) {
        self.variants.insert(variant, code);
    }

    /// Add a variant from raw SPIR-V bytes
    ///
    /// # Errors
    ///
    /// `InvalidResource` if either blob is not a whole number of words or
    /// lacks the SPIR-V magic number.
    pub fn insert_bytes(&mut self, variant: ShaderVariant, vertex: &[u8], fragment: &[u8]) -> StrataResult<()> {
        let code = ShaderCode {
            vertex: spirv_words(vertex)?,
            fragment: spirv_words(fragment)?,
        };
        self.insert(variant, code);
        Ok(())
    }

    pub fn get(&self, variant: ShaderVariant) -> Option<&ShaderCode> {
        self.variants.get(&variant)
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    pub fn variants(&self) -> impl Iterator<Item = ShaderVariant> + '_ {
        self.variants.keys().copied()
    }
}

/// Decode SPIR-V bytes into words
pub(crate) fn spirv_words(bytes: &[u8]) -> StrataResult<Vec<u32>> {
    let mut cursor = std::io::Cursor::new(bytes);
    ash::util::read_spv(&mut cursor)
        .map_err(|e| StrataError::InvalidResource(format!("Invalid SPIR-V ({} bytes): {}", bytes.len(), e)))
}

/// Shader modules created from a `ShaderLibrary`
pub(crate) struct ShaderModules {
    modules: FxHashMap<ShaderVariant, (vk::ShaderModule, vk::ShaderModule)>,
}

impl ShaderModules {
    pub(crate) fn new(device: &ash::Device, library: &ShaderLibrary) -> StrataResult<Self> {
        let mut modules = Self { modules: FxHashMap::default() };
        for (variant, code) in &library.variants {
            let pair = create_module(device, &code.vertex, *variant).and_then(|vertex| {
                match create_module(device, &code.fragment, *variant) {
                    Ok(fragment) => Ok((vertex, fragment)),
                    Err(err) => {
                        unsafe { device.destroy_shader_module(vertex, None) };
                        Err(err)
                    }
                }
            });
            match pair {
                Ok(pair) => {
                    modules.modules.insert(*variant, pair);
                }
                Err(err) => {
                    modules.destroy(device);
                    return Err(err);
                }
            }
        }
        Ok(modules)
    }

    /// Vertex and fragment modules of `variant`
    pub(crate) fn get(&self, variant: ShaderVariant) -> StrataResult<(vk::ShaderModule, vk::ShaderModule)> {
        match self.modules.get(&variant) {
            Some(pair) => Ok(*pair),
            None => engine_bail!("strata::vulkan", "No shader code for variant {:?}", variant),
        }
    }

    pub(crate) fn destroy(&mut self, device: &ash::Device) {
        for (_, (vertex, fragment)) in self.modules.drain() {
            unsafe {
                device.destroy_shader_module(vertex, None);
                device.destroy_shader_module(fragment, None);
            }
        }
    }
}

fn create_module(device: &ash::Device, code: &[u32], variant: ShaderVariant) -> StrataResult<vk::ShaderModule> {
    let create_info = vk::ShaderModuleCreateInfo::default().code(code);
    unsafe {
        device
            .create_shader_module(&create_info, None)
            .map_err(|e| engine_err!("strata::vulkan", "Failed to create shader module for {:?}: {:?}", variant, e))
    }
}

#[cfg(test)]
#[path = "vulkan_shader_tests.rs"]
mod tests;
