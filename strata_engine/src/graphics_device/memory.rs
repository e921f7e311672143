/// Device memory properties and memory-type selection

use bitflags::bitflags;

bitflags! {
    /// Memory property flags (bit values match the Vulkan flags)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MemoryProperties: u32 {
        const DEVICE_LOCAL = 0x01;
        const HOST_VISIBLE = 0x02;
        const HOST_COHERENT = 0x04;
        const HOST_CACHED = 0x08;
        const LAZILY_ALLOCATED = 0x10;
    }
}

/// Size, alignment and acceptable memory types of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRequirements {
    pub size: u64,
    pub alignment: u64,
    /// Bit `i` set when memory type `i` may back the resource
    pub type_bits: u32,
}

/// First memory type allowed by `type_bits` that has every flag in `required`
///
/// # Arguments
///
/// * `types` - Property flags of each memory type, indexed by type index
/// * `type_bits` - Mask of acceptable type indices
/// * `required` - Flags the type must include
pub fn find_memory_type(
    types: &[MemoryProperties],
    type_bits: u32,
    required: MemoryProperties,
) -> Option<u32> {
    types
        .iter()
        .enumerate()
        .take(32)
        .find(|(i, props)| type_bits & (1 << i) != 0 && props.contains(required))
        .map(|(i, _)| i as u32)
}

/// First match among several property sets, tried in order of preference
pub fn find_preferred_memory_type(
    types: &[MemoryProperties],
    type_bits: u32,
    preferences: &[MemoryProperties],
) -> Option<u32> {
    preferences
        .iter()
        .find_map(|props| find_memory_type(types, type_bits, *props))
}

/// Round `value` up to a multiple of `alignment` (any non-zero alignment)
pub fn align_up(value: u64, alignment: u64) -> u64 {
    if alignment <= 1 {
        return value;
    }
    value.div_ceil(alignment) * alignment
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
