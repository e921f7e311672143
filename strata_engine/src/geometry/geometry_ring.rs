/// GeometryRing - per-slot host-visible staging for vertex, index and uniform data
///
/// Every frame slot owns one persistently mapped buffer with a bump cursor
/// reset at frame begin. An append that does not fit writes nothing and
/// records a larger capacity instead; the frame controller then drops the
/// frame, waits for the device and calls `apply_growth` to recreate every
/// slot's buffer. Capacity never shrinks.

use crate::error::{StrataError, StrataResult};
use crate::graphics_device::{
    align_up, BufferDescriptorKind, BufferHandle, BufferUsage, DescriptorSetHandle,
    GraphicsDevice,
};
use crate::geometry::{GeometryBatch, TessFlags, VertexAttribute};
use crate::{engine_debug, engine_info};

/// Range of the per-slot uniform descriptor
pub const UNIFORM_RANGE: u64 = 256;

/// Alignment of index data inside the ring
const INDEX_ALIGNMENT: u64 = 4;

/// One slot's buffer and write state
#[derive(Debug, Clone)]
struct RingSlot {
    buffer: BufferHandle,
    /// Dynamic uniform descriptor over `buffer`
    uniform_descriptor: DescriptorSetHandle,
    cursor: u64,
    /// Offset of each attribute stream, by binding
    attribute_offsets: [u64; VertexAttribute::COUNT],
}

/// Vertex buffer bindings recorded for one draw
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexBindings {
    pub buffer: BufferHandle,
    pub first_binding: u32,
    /// One offset per binding from `first_binding`
    pub offsets: Vec<u64>,
}

pub struct GeometryRing {
    slots: Vec<RingSlot>,
    capacity: u64,
    alignment: u64,
    active: usize,
    /// Capacity requested by an overflow this frame
    pending_capacity: Option<u64>,
}

impl GeometryRing {
    /// Create one buffer of `capacity` bytes per frame slot
    ///
    /// # Arguments
    ///
    /// * `slot_count` - Number of frame slots
    /// * `alignment` - Padding applied before every attribute stream
    pub fn new<D: GraphicsDevice>(
        device: &mut D,
        slot_count: usize,
        capacity: u64,
        alignment: u64,
    ) -> StrataResult<Self> {
        let mut ring = Self {
            slots: Vec::with_capacity(slot_count),
            capacity,
            alignment,
            active: 0,
            pending_capacity: None,
        };
        for _ in 0..slot_count {
            let slot = Self::create_slot(device, capacity)?;
            ring.slots.push(slot);
        }
        Ok(ring)
    }

    fn create_slot<D: GraphicsDevice>(device: &mut D, capacity: u64) -> StrataResult<RingSlot> {
        let usage = BufferUsage::VERTEX | BufferUsage::INDEX | BufferUsage::UNIFORM | BufferUsage::STORAGE;
        let buffer = device.create_host_buffer(capacity, usage)?;
        let uniform_descriptor =
            device.create_buffer_descriptor(buffer, UNIFORM_RANGE.min(capacity), BufferDescriptorKind::Uniform)?;
        Ok(RingSlot {
            buffer,
            uniform_descriptor,
            cursor: 0,
            attribute_offsets: [0; VertexAttribute::COUNT],
        })
    }

    /// Make `slot` the append target and rewind its cursor
    pub fn begin_slot(&mut self, slot: usize) {
        self.active = slot.min(self.slots.len().saturating_sub(1));
        self.reset();
    }

    /// Rewind the active slot's cursor
    pub fn reset(&mut self) {
        if let Some(slot) = self.slots.get_mut(self.active) {
            slot.cursor = 0;
            slot.attribute_offsets = [0; VertexAttribute::COUNT];
        }
    }

    /// Copy `data` at the next `alignment` boundary of the active slot
    ///
    /// Returns the byte offset, or `None` when the data does not fit; the
    /// overflow is recorded and nothing is written.
    pub fn append_aligned<D: GraphicsDevice>(
        &mut self,
        device: &mut D,
        data: &[u8],
        alignment: u64,
    ) -> StrataResult<Option<u64>> {
        let slot = self
            .slots
            .get_mut(self.active)
            .ok_or_else(|| StrataError::InvalidResource("geometry ring has no slots".to_string()))?;
        let offset = align_up(slot.cursor, alignment);
        let end = offset + data.len() as u64;

        if end > self.capacity {
            let wanted = end.next_power_of_two();
            let pending = self.pending_capacity.map_or(wanted, |p| p.max(wanted));
            if self.pending_capacity.is_none() {
                engine_debug!(
                    "strata::geometry",
                    "Geometry ring overflow: {} bytes needed, capacity {}",
                    end, self.capacity
                );
            }
            self.pending_capacity = Some(pending);
            return Ok(None);
        }

        if !data.is_empty() {
            device.write_buffer(slot.buffer, offset, data)?;
        }
        slot.cursor = end;
        Ok(Some(offset))
    }

    /// Copy `data` at the ring's stream alignment
    pub fn append<D: GraphicsDevice>(&mut self, device: &mut D, data: &[u8]) -> StrataResult<Option<u64>> {
        let alignment = self.alignment;
        self.append_aligned(device, data, alignment)
    }

    /// Append the streams selected by `flags` and compute their bindings
    ///
    /// Streams are bound as one contiguous range from the lowest to the
    /// highest selected binding; bindings inside the range that were not
    /// selected keep their previous offsets. Returns `None` when no vertex
    /// stream is selected or the ring overflowed.
    pub fn append_attributes<D: GraphicsDevice>(
        &mut self,
        device: &mut D,
        batch: &GeometryBatch,
        flags: TessFlags,
    ) -> StrataResult<Option<VertexBindings>> {
        let vertex_count = batch.vertex_count() as usize;
        let mut first = None;
        let mut last = 0;

        for attribute in VertexAttribute::ALL {
            if !flags.contains(attribute.flag()) {
                continue;
            }
            if batch.attribute_len(attribute) != vertex_count {
                return Err(StrataError::InvalidResource(format!(
                    "{:?} stream has {} elements for {} vertices",
                    attribute,
                    batch.attribute_len(attribute),
                    vertex_count
                )));
            }
            if let Some(offset) = self.append(device, batch.attribute_bytes(attribute))? {
                self.slots[self.active].attribute_offsets[attribute.binding() as usize] = offset;
            }
            first.get_or_insert(attribute.binding());
            last = attribute.binding();
        }

        let Some(first) = first else {
            return Ok(None);
        };
        if self.overflowed() {
            return Ok(None);
        }
        let slot = &self.slots[self.active];
        Ok(Some(VertexBindings {
            buffer: slot.buffer,
            first_binding: first,
            offsets: slot.attribute_offsets[first as usize..=last as usize].to_vec(),
        }))
    }

    /// Append 32-bit indices; returns their byte offset
    pub fn append_indexes<D: GraphicsDevice>(&mut self, device: &mut D, indexes: &[u32]) -> StrataResult<Option<u64>> {
        self.append_aligned(device, bytemuck::cast_slice(indexes), INDEX_ALIGNMENT)
    }

    /// Whether an append overflowed since the last growth
    pub fn overflowed(&self) -> bool {
        self.pending_capacity.is_some()
    }

    pub fn pending_capacity(&self) -> Option<u64> {
        self.pending_capacity
    }

    /// Recreate every slot's buffer at the pending capacity
    ///
    /// The device must be idle. Returns the new capacity, or `None` if no
    /// overflow was pending.
    pub fn apply_growth<D: GraphicsDevice>(&mut self, device: &mut D) -> StrataResult<Option<u64>> {
        let Some(pending) = self.pending_capacity.take() else {
            return Ok(None);
        };
        let capacity = pending.max(self.capacity);
        let count = self.slots.len();
        self.destroy(device);
        for _ in 0..count {
            let slot = Self::create_slot(device, capacity)?;
            self.slots.push(slot);
        }
        self.capacity = capacity;
        engine_info!("strata::geometry", "Geometry buffer resized to {}K", capacity / 1024);
        Ok(Some(capacity))
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Bytes used in the active slot
    pub fn cursor(&self) -> u64 {
        self.slots.get(self.active).map_or(0, |s| s.cursor)
    }

    pub fn active_slot(&self) -> usize {
        self.active
    }

    pub fn buffer(&self) -> Option<BufferHandle> {
        self.slots.get(self.active).map(|s| s.buffer)
    }

    pub fn uniform_descriptor(&self) -> Option<DescriptorSetHandle> {
        self.slots.get(self.active).map(|s| s.uniform_descriptor)
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Destroy every slot's descriptor and buffer
    pub fn destroy<D: GraphicsDevice>(&mut self, device: &mut D) {
        for slot in self.slots.drain(..) {
            device.destroy_descriptor_set(slot.uniform_descriptor);
            device.destroy_buffer(slot.buffer);
        }
    }
}

#[cfg(test)]
#[path = "geometry_ring_tests.rs"]
mod tests;
