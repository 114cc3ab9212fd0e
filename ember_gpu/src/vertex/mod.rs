/// Vertex module - vertex formats and draw payloads

pub mod vertex_format;
pub mod payload;

pub use vertex_format::{VertexElement, VertexFormat};
pub use payload::{IndexPayload, IndexType, VertexPayload};
