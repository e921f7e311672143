/// DescriptorTracker - minimal-diff descriptor set binding for one frame slot
///
/// Keeps the descriptor set currently bound at every binding plus the dynamic
/// offsets of the two buffer bindings. Changes widen a dirty range; `flush`
/// binds that range right before a draw and clears it.

use crate::graphics_device::{CommandBufferHandle, DescriptorSetHandle, GraphicsDevice};
use crate::pipeline::PipelineLayoutKind;

/// Descriptor set index in the shared pipeline layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DescriptorBinding {
    /// Dynamic storage buffer
    Storage,
    /// Dynamic uniform buffer
    Uniform,
    Texture0,
    Texture1,
    Texture2,
    Fog,
}

impl DescriptorBinding {
    pub const COUNT: usize = 6;

    pub const ALL: [DescriptorBinding; DescriptorBinding::COUNT] = [
        DescriptorBinding::Storage,
        DescriptorBinding::Uniform,
        DescriptorBinding::Texture0,
        DescriptorBinding::Texture1,
        DescriptorBinding::Texture2,
        DescriptorBinding::Fog,
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Whether the binding takes a dynamic offset
    pub fn is_dynamic(&self) -> bool {
        matches!(self, DescriptorBinding::Storage | DescriptorBinding::Uniform)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptorTracker {
    current: [Option<DescriptorSetHandle>; DescriptorBinding::COUNT],
    /// Dynamic offsets of `Storage` and `Uniform`
    offsets: [u32; 2],
    /// Inclusive range of bindings changed since the last flush
    dirty: Option<(usize, usize)>,
}

impl DescriptorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `set` at `binding`; returns whether anything changed
    pub fn set(&mut self, binding: DescriptorBinding, set: DescriptorSetHandle) -> bool {
        let index = binding.index();
        if self.current[index] == Some(set) {
            return false;
        }
        self.current[index] = Some(set);
        self.widen(index);
        true
    }

    /// Set the dynamic offset of a buffer binding
    ///
    /// A changed offset re-dirties the binding if a set is bound there.
    /// Offsets of non-dynamic bindings are ignored.
    pub fn set_offset(&mut self, binding: DescriptorBinding, offset: u32) {
        if !binding.is_dynamic() {
            return;
        }
        let index = binding.index();
        if self.offsets[index] != offset {
            self.offsets[index] = offset;
            if self.current[index].is_some() {
                self.widen(index);
            }
        }
    }

    /// Forget the cached set at `binding` so the next `set` rebinds it
    pub fn reset(&mut self, binding: DescriptorBinding) {
        self.current[binding.index()] = None;
    }

    /// Mark every bound set dirty so the next flush rebinds it
    ///
    /// Needed after sets were bound through an incompatible layout, which
    /// disturbs all main-layout bindings.
    pub fn invalidate(&mut self) {
        for index in 0..DescriptorBinding::COUNT {
            if self.current[index].is_some() {
                self.widen(index);
            }
        }
    }

    /// Forget everything (new command buffer)
    pub fn reset_all(&mut self) {
        *self = Self::default();
    }

    pub fn current(&self, binding: DescriptorBinding) -> Option<DescriptorSetHandle> {
        self.current[binding.index()]
    }

    pub fn offset(&self, binding: DescriptorBinding) -> u32 {
        if binding.is_dynamic() {
            self.offsets[binding.index()]
        } else {
            0
        }
    }

    /// Dirty bindings as an inclusive index range
    pub fn dirty_range(&self) -> Option<(usize, usize)> {
        self.dirty
    }

    fn widen(&mut self, index: usize) {
        self.dirty = Some(match self.dirty {
            Some((start, end)) => (start.min(index), end.max(index)),
            None => (index, index),
        });
    }

    /// Bind the dirty range and clear it
    ///
    /// Unset bindings inside the range split it, since a null set cannot be
    /// bound; in the usual case this is a single bind call. Returns the
    /// number of bind calls recorded.
    pub fn flush<D: GraphicsDevice>(&mut self, device: &mut D, cb: CommandBufferHandle) -> usize {
        let Some((start, end)) = self.dirty.take() else {
            return 0;
        };

        let mut calls = 0;
        let mut index = start;
        while index <= end {
            if self.current[index].is_none() {
                index += 1;
                continue;
            }
            let first = index;
            let mut sets = Vec::new();
            let mut dynamic_offsets = Vec::new();
            while index <= end {
                let Some(set) = self.current[index] else { break };
                sets.push(set);
                if index < self.offsets.len() {
                    dynamic_offsets.push(self.offsets[index]);
                }
                index += 1;
            }
            device.cmd_bind_descriptor_sets(cb, PipelineLayoutKind::Main, first as u32, &sets, &dynamic_offsets);
            calls += 1;
        }
        calls
    }
}

#[cfg(test)]
#[path = "descriptor_tracker_tests.rs"]
mod tests;
