/// ImageArena - chunked bump allocator for device-local image memory
///
/// Images are queued with `request` and placed together by `flush`: each one
/// goes into the first chunk with room for it (first fit, in request order)
/// or into a freshly allocated chunk of the configured size. Chunks are never
/// partially freed; `release_all` destroys them wholesale. Only an arena
/// built `with_adaptive_chunks` changes its chunk size between lifetimes.

use crate::error::{StrataError, StrataResult};
use crate::graphics_device::{
    align_up, find_memory_type, submit_one_shot, GraphicsDevice, ImageAspect, ImageHandle,
    ImageLayout, ImageTransition, ImageViewDesc, ImageViewHandle, MemoryHandle,
    MemoryProperties,
};
use crate::{engine_debug, engine_error, engine_info};

/// An image waiting for placement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageRequest {
    pub image: ImageHandle,
    pub view: ImageViewDesc,
    /// Layout the image is transitioned to after binding (`Undefined` skips it)
    pub target_layout: ImageLayout,
    /// Prefer lazily-allocated (tile) memory for a transient attachment
    pub lazy: bool,
}

/// Where a flushed image ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImagePlacement {
    pub image: ImageHandle,
    pub view: ImageViewHandle,
    pub memory: MemoryHandle,
    pub offset: u64,
    pub size: u64,
    /// Index into `ImageArena::chunks`
    pub chunk: usize,
}

/// One block of device memory shared by many images
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryChunk {
    pub memory: MemoryHandle,
    pub capacity: u64,
    pub used: u64,
    pub memory_type: u32,
    /// Sized for a single image (dedicated or lazily allocated); never shared
    pub exclusive: bool,
}

pub struct ImageArena {
    source: &'static str,
    chunk_size: u64,
    default_chunk_size: u64,
    dedicated_allowed: bool,
    adaptive: bool,
    chunks: Vec<MemoryChunk>,
    pending: Vec<ImageRequest>,
}

impl ImageArena {
    /// Create an empty arena
    ///
    /// # Arguments
    ///
    /// * `source` - Log source for this arena instance
    /// * `chunk_size` - Size of every shared chunk; bounds the largest image
    /// * `dedicated_allowed` - Give a lone request its own dedicated allocation
    pub fn new(source: &'static str, chunk_size: u64, dedicated_allowed: bool) -> Self {
        Self {
            source,
            chunk_size,
            default_chunk_size: chunk_size,
            dedicated_allowed,
            adaptive: false,
            chunks: Vec::new(),
            pending: Vec::new(),
        }
    }

    /// Adapt the chunk size on every `release_all`
    pub fn with_adaptive_chunks(mut self) -> Self {
        self.adaptive = true;
        self
    }

    /// Queue an image for the next `flush`
    pub fn request(&mut self, request: ImageRequest) {
        self.pending.push(request);
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn chunks(&self) -> &[MemoryChunk] {
        &self.chunks
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Place, bind and view every queued image, then transition them in one submission
    ///
    /// # Errors
    ///
    /// `ChunkOverflow` if an image is larger than the chunk size and
    /// `NoCompatibleMemoryType` if no device-local type accepts it. Both are fatal.
    pub fn flush<D: GraphicsDevice>(&mut self, device: &mut D) -> StrataResult<Vec<ImagePlacement>> {
        let requests = std::mem::take(&mut self.pending);
        let memory_types = device.memory_types();
        let lone = requests.len() == 1;
        let mut placements = Vec::with_capacity(requests.len());

        for request in &requests {
            let reqs = device.image_memory_requirements(request.image)?;
            if reqs.size > self.chunk_size {
                engine_error!(
                    self.source,
                    "Image of {} bytes does not fit in a {} byte chunk",
                    reqs.size, self.chunk_size
                );
                return Err(StrataError::ChunkOverflow { requested: reqs.size, chunk_size: self.chunk_size });
            }

            let mut exclusive_type = None;
            let mut dedicated = None;
            if request.lazy {
                exclusive_type = find_memory_type(
                    &memory_types,
                    reqs.type_bits,
                    MemoryProperties::DEVICE_LOCAL | MemoryProperties::LAZILY_ALLOCATED,
                );
            }
            if exclusive_type.is_none() && lone && self.dedicated_allowed {
                exclusive_type = find_memory_type(&memory_types, reqs.type_bits, MemoryProperties::DEVICE_LOCAL);
                dedicated = Some(request.image);
            }

            let (chunk, offset) = match exclusive_type {
                Some(memory_type) => {
                    let memory = device.allocate_memory(reqs.size, memory_type, dedicated)?;
                    self.chunks.push(MemoryChunk {
                        memory,
                        capacity: reqs.size,
                        used: reqs.size,
                        memory_type,
                        exclusive: true,
                    });
                    (self.chunks.len() - 1, 0)
                }
                None => self.place_shared(device, &memory_types, reqs.size, reqs.alignment, reqs.type_bits)?,
            };

            let memory = self.chunks[chunk].memory;
            device.bind_image_memory(request.image, memory, offset)?;
            let view = device.create_image_view(request.image, &request.view)?;
            placements.push(ImagePlacement {
                image: request.image,
                view,
                memory,
                offset,
                size: reqs.size,
                chunk,
            });
        }

        let transitions: Vec<ImageTransition> = requests
            .iter()
            .filter(|r| r.target_layout != ImageLayout::Undefined)
            .map(|r| ImageTransition {
                image: r.image,
                aspect: if r.view.aspect.is_empty() { ImageAspect::COLOR } else { r.view.aspect },
                mip_levels: r.view.mip_levels,
                old_layout: ImageLayout::Undefined,
                new_layout: r.target_layout,
            })
            .collect();

        if !transitions.is_empty() {
            submit_one_shot(device, |device, cb| device.cmd_transition_images(cb, &transitions))?;
        }

        Ok(placements)
    }

    /// First-fit placement into a shared chunk, growing the chunk list if needed
    fn place_shared<D: GraphicsDevice>(
        &mut self,
        device: &mut D,
        memory_types: &[MemoryProperties],
        size: u64,
        alignment: u64,
        type_bits: u32,
    ) -> StrataResult<(usize, u64)> {
        for (index, chunk) in self.chunks.iter_mut().enumerate() {
            if chunk.exclusive || type_bits & (1 << chunk.memory_type) == 0 {
                continue;
            }
            let offset = align_up(chunk.used, alignment);
            if offset + size <= chunk.capacity {
                chunk.used = offset + size;
                return Ok((index, offset));
            }
        }

        let memory_type = find_memory_type(memory_types, type_bits, MemoryProperties::DEVICE_LOCAL)
            .ok_or_else(|| {
                engine_error!(self.source, "No device-local memory type for mask {:#x}", type_bits);
                StrataError::NoCompatibleMemoryType {
                    type_bits,
                    properties: MemoryProperties::DEVICE_LOCAL.bits(),
                }
            })?;
        let memory = device.allocate_memory(self.chunk_size, memory_type, None)?;
        self.chunks.push(MemoryChunk {
            memory,
            capacity: self.chunk_size,
            used: size,
            memory_type,
            exclusive: false,
        });
        engine_debug!(
            self.source,
            "Allocated image chunk {} ({} bytes, type {})",
            self.chunks.len() - 1, self.chunk_size, memory_type
        );
        Ok((self.chunks.len() - 1, 0))
    }

    /// Free every chunk
    ///
    /// An adaptive arena then sizes chunks for the next lifetime: more than
    /// one shared chunk doubles the size, and a single shared chunk under
    /// 90% full restores the configured default. Other arenas keep the
    /// configured size.
    pub fn release_all<D: GraphicsDevice>(&mut self, device: &mut D) {
        let shared: Vec<&MemoryChunk> = self.chunks.iter().filter(|c| !c.exclusive).collect();
        let next_size = match shared.as_slice() {
            _ if !self.adaptive => self.chunk_size,
            [] => self.chunk_size,
            [only] if only.used * 10 < only.capacity * 9 => self.default_chunk_size,
            [_] => self.chunk_size,
            _ => self.chunk_size * 2,
        };

        for chunk in self.chunks.drain(..) {
            device.free_memory(chunk.memory);
        }
        self.pending.clear();

        if next_size != self.chunk_size {
            engine_info!(self.source, "Image chunk size {} -> {} bytes", self.chunk_size, next_size);
            self.chunk_size = next_size;
        }
    }
}

#[cfg(test)]
#[path = "image_arena_tests.rs"]
mod tests;
