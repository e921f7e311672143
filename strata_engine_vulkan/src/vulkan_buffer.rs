/// Host-visible buffers placed by gpu-allocator
///
/// Geometry rings, upload staging and uniform data all live in persistently
/// mapped CPU-to-GPU memory; writes are plain copies into the mapping.

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator};
use gpu_allocator::MemoryLocation;
use strata_engine::strata::device::BufferUsage;
use strata_engine::strata::{StrataError, StrataResult};
use strata_engine::{engine_err, engine_error};

pub(crate) fn buffer_usage_to_vk(usage: BufferUsage) -> vk::BufferUsageFlags {
    let mut flags = vk::BufferUsageFlags::empty();
    if usage.contains(BufferUsage::TRANSFER_SRC) { flags |= vk::BufferUsageFlags::TRANSFER_SRC; }
    if usage.contains(BufferUsage::TRANSFER_DST) { flags |= vk::BufferUsageFlags::TRANSFER_DST; }
    if usage.contains(BufferUsage::UNIFORM) { flags |= vk::BufferUsageFlags::UNIFORM_BUFFER; }
    if usage.contains(BufferUsage::STORAGE) { flags |= vk::BufferUsageFlags::STORAGE_BUFFER; }
    if usage.contains(BufferUsage::INDEX) { flags |= vk::BufferUsageFlags::INDEX_BUFFER; }
    if usage.contains(BufferUsage::VERTEX) { flags |= vk::BufferUsageFlags::VERTEX_BUFFER; }
    flags
}

/// Mapped host buffer
pub(crate) struct HostBuffer {
    pub(crate) buffer: vk::Buffer,
    allocation: Option<Allocation>,
    pub(crate) size: u64,
}

impl HostBuffer {
    pub(crate) fn new(
        device: &ash::Device,
        allocator: &mut Allocator,
        size: u64,
        usage: BufferUsage,
    ) -> StrataResult<Self> {
        unsafe {
            let create_info = vk::BufferCreateInfo::default()
                .size(size)
                .usage(buffer_usage_to_vk(usage))
                .sharing_mode(vk::SharingMode::EXCLUSIVE);
            let buffer = device
                .create_buffer(&create_info, None)
                .map_err(|e| engine_err!("strata::vulkan", "Failed to create buffer of {} bytes: {:?}", size, e))?;

            let requirements = device.get_buffer_memory_requirements(buffer);
            let allocation = match allocator.allocate(&AllocationCreateDesc {
                name: "strata host buffer",
                requirements,
                location: MemoryLocation::CpuToGpu,
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            }) {
                Ok(allocation) => allocation,
                Err(e) => {
                    device.destroy_buffer(buffer, None);
                    engine_error!("strata::vulkan", "Out of memory for {} byte host buffer: {}", size, e);
                    return Err(StrataError::OutOfMemory);
                }
            };

            if let Err(e) = device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) {
                allocator.free(allocation).ok();
                device.destroy_buffer(buffer, None);
                return Err(engine_err!("strata::vulkan", "Failed to bind buffer memory: {:?}", e));
            }

            Ok(Self { buffer, allocation: Some(allocation), size })
        }
    }

    /// Copy `data` into the mapping at `offset`
    pub(crate) fn write(&mut self, offset: u64, data: &[u8]) -> StrataResult<()> {
        let size = self.size;
        let mapped = self
            .allocation
            .as_mut()
            .and_then(|allocation| allocation.mapped_slice_mut())
            .ok_or_else(|| StrataError::BackendError("Buffer is not CPU-accessible".to_string()))?;
        let end = offset
            .checked_add(data.len() as u64)
            .filter(|end| *end <= size)
            .ok_or_else(|| {
                StrataError::InvalidResource(format!(
                    "Write of {} bytes at {} exceeds buffer size {}",
                    data.len(),
                    offset,
                    size
                ))
            })?;
        mapped[offset as usize..end as usize].copy_from_slice(data);
        Ok(())
    }

    pub(crate) fn destroy(mut self, device: &ash::Device, allocator: &mut Allocator) {
        if let Some(allocation) = self.allocation.take() {
            allocator.free(allocation).ok();
        }
        unsafe { device.destroy_buffer(self.buffer, None) };
    }
}
