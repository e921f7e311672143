/// Buffer usage flags and buffer/image copy descriptors

use bitflags::bitflags;

bitflags! {
    /// Buffer usage flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const TRANSFER_SRC = 0x01;
        const TRANSFER_DST = 0x02;
        const UNIFORM = 0x10;
        const STORAGE = 0x20;
        const INDEX = 0x40;
        const VERTEX = 0x80;
    }
}

/// Index element type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    U16,
    U32,
}

impl IndexType {
    pub fn size_bytes(&self) -> u64 {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}

/// Kind of buffer-backed descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferDescriptorKind {
    /// Dynamic uniform buffer
    Uniform,
    /// Dynamic storage buffer
    Storage,
}

/// One buffer-to-image copy region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferImageCopy {
    /// Byte offset of the region's first texel in the source buffer
    pub buffer_offset: u64,
    pub mip_level: u32,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}
