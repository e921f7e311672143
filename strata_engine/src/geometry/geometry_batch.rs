//! CPU-side geometry of one draw.
//!
//! A `GeometryBatch` holds parallel per-vertex attribute streams plus an
//! index list. Streams are copied into the geometry ring attribute by
//! attribute; each attribute has a fixed vertex-input binding.

use bitflags::bitflags;
use glam::{Vec2, Vec3};

bitflags! {
    /// Streams a draw reads
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TessFlags: u32 {
        const IDX = 0x01;
        const XYZ = 0x02;
        const RGBA = 0x04;
        const ST0 = 0x08;
        const ST1 = 0x10;
        const NNN = 0x20;
    }
}

/// Per-vertex attribute stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexAttribute {
    Position,
    Color,
    TexCoord0,
    TexCoord1,
    Normal,
}

impl VertexAttribute {
    pub const COUNT: usize = 5;

    /// Binding order; also the order streams are appended in
    pub const ALL: [VertexAttribute; VertexAttribute::COUNT] = [
        VertexAttribute::Position,
        VertexAttribute::Color,
        VertexAttribute::TexCoord0,
        VertexAttribute::TexCoord1,
        VertexAttribute::Normal,
    ];

    /// Vertex-input binding index
    pub fn binding(&self) -> u32 {
        *self as u32
    }

    pub fn flag(&self) -> TessFlags {
        match self {
            VertexAttribute::Position => TessFlags::XYZ,
            VertexAttribute::Color => TessFlags::RGBA,
            VertexAttribute::TexCoord0 => TessFlags::ST0,
            VertexAttribute::TexCoord1 => TessFlags::ST1,
            VertexAttribute::Normal => TessFlags::NNN,
        }
    }

    /// Bytes per element
    pub fn element_size(&self) -> u64 {
        match self {
            VertexAttribute::Position | VertexAttribute::Normal => 12,
            VertexAttribute::Color => 4,
            VertexAttribute::TexCoord0 | VertexAttribute::TexCoord1 => 8,
        }
    }
}

/// Vertex and index data of one draw
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeometryBatch {
    pub xyz: Vec<Vec3>,
    pub rgba: Vec<[u8; 4]>,
    pub st0: Vec<Vec2>,
    pub st1: Vec<Vec2>,
    pub normals: Vec<Vec3>,
    pub indexes: Vec<u32>,
}

impl GeometryBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of vertices (length of the position stream)
    pub fn vertex_count(&self) -> u32 {
        self.xyz.len() as u32
    }

    pub fn index_count(&self) -> u32 {
        self.indexes.len() as u32
    }

    /// Raw bytes of one attribute stream
    pub fn attribute_bytes(&self, attribute: VertexAttribute) -> &[u8] {
        match attribute {
            VertexAttribute::Position => bytemuck::cast_slice(&self.xyz),
            VertexAttribute::Color => bytemuck::cast_slice(&self.rgba),
            VertexAttribute::TexCoord0 => bytemuck::cast_slice(&self.st0),
            VertexAttribute::TexCoord1 => bytemuck::cast_slice(&self.st1),
            VertexAttribute::Normal => bytemuck::cast_slice(&self.normals),
        }
    }

    /// Number of elements in one attribute stream
    pub fn attribute_len(&self, attribute: VertexAttribute) -> usize {
        match attribute {
            VertexAttribute::Position => self.xyz.len(),
            VertexAttribute::Color => self.rgba.len(),
            VertexAttribute::TexCoord0 => self.st0.len(),
            VertexAttribute::TexCoord1 => self.st1.len(),
            VertexAttribute::Normal => self.normals.len(),
        }
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indexes)
    }

    /// Empty every stream, keeping allocations
    pub fn clear(&mut self) {
        self.xyz.clear();
        self.rgba.clear();
        self.st0.clear();
        self.st1.clear();
        self.normals.clear();
        self.indexes.clear();
    }
}
