/// Ready-made draw payloads for the global buffer manager

use bytemuck::Pod;
use glam::Vec3;

use crate::engine_bail;
use crate::error::Result;
use crate::memory::{RenderPayloadDescriptor, StagingWriter};
use crate::vertex::vertex_format::{self, VertexFormat};

/// Index buffer element type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    /// 16-bit indices (max 65535 vertices)
    U16,
    /// 32-bit indices
    U32,
}

impl IndexType {
    /// Size in bytes of one index element
    pub fn size_bytes(&self) -> u32 {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}

// ===== VERTEX PAYLOAD =====

/// Interleaved vertex bytes in a known format
#[derive(Debug, Clone, PartialEq)]
pub struct VertexPayload {
    format: VertexFormat,
    bytes: Vec<u8>,
}

impl VertexPayload {
    /// Wrap raw interleaved bytes
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the format has a zero stride or `bytes` is not a
    /// whole number of vertices.
    pub fn new(format: VertexFormat, bytes: Vec<u8>) -> Result<Self> {
        let stride = format.stride() as usize;
        if stride == 0 {
            engine_bail!(InvalidArgument => "ember::vertex", "Vertex format has no elements");
        }
        if bytes.len() % stride != 0 {
            engine_bail!(InvalidArgument => "ember::vertex",
                "{} bytes is not a multiple of the {} byte vertex stride", bytes.len(), stride);
        }
        Ok(Self { format, bytes })
    }

    /// Copy a slice of vertex structs; `T` must be exactly one vertex
    pub fn from_pod<T: Pod>(format: VertexFormat, vertices: &[T]) -> Result<Self> {
        if std::mem::size_of::<T>() != format.stride() as usize {
            engine_bail!(InvalidArgument => "ember::vertex",
                "Vertex type is {} bytes but the format stride is {}",
                std::mem::size_of::<T>(), format.stride());
        }
        Self::new(format, bytemuck::cast_slice(vertices).to_vec())
    }

    /// Position-only vertices
    pub fn from_positions(positions: &[Vec3]) -> Self {
        Self {
            format: vertex_format::POSITION,
            bytes: bytemuck::cast_slice(positions).to_vec(),
        }
    }

    pub fn format(&self) -> &VertexFormat {
        &self.format
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn vertex_count(&self) -> usize {
        self.bytes.len() / self.format.stride() as usize
    }
}

impl RenderPayloadDescriptor for VertexPayload {
    fn element_stride(&self) -> u64 {
        self.format.stride() as u64
    }

    fn element_count(&self) -> u64 {
        self.vertex_count() as u64
    }

    fn write_bytes(&self, writer: &mut StagingWriter<'_>) -> Result<()> {
        writer.write(&self.bytes)
    }
}

// ===== INDEX PAYLOAD =====

/// Index data for one draw
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPayload {
    index_type: IndexType,
    bytes: Vec<u8>,
}

impl IndexPayload {
    pub fn from_u16(indices: &[u16]) -> Self {
        Self { index_type: IndexType::U16, bytes: bytemuck::cast_slice(indices).to_vec() }
    }

    pub fn from_u32(indices: &[u32]) -> Self {
        Self { index_type: IndexType::U32, bytes: bytemuck::cast_slice(indices).to_vec() }
    }

    pub fn index_type(&self) -> IndexType {
        self.index_type
    }

    pub fn index_count(&self) -> usize {
        self.bytes.len() / self.index_type.size_bytes() as usize
    }
}

impl RenderPayloadDescriptor for IndexPayload {
    fn element_stride(&self) -> u64 {
        self.index_type.size_bytes() as u64
    }

    fn element_count(&self) -> u64 {
        self.index_count() as u64
    }

    fn write_bytes(&self, writer: &mut StagingWriter<'_>) -> Result<()> {
        writer.write(&self.bytes)
    }
}

#[cfg(test)]
#[path = "payload_tests.rs"]
mod tests;
