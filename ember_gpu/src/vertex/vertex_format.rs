/// Vertex element and vertex format definitions

use std::borrow::Cow;

/// One attribute of an interleaved vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexElement {
    /// 3 x f32
    Position,
    /// 3 x f32
    Color,
    /// 4 x u8, normalized
    Color4,
    /// 2 x f32 texture coordinates
    UvF32,
    /// 2 x i16 texture coordinates
    UvI16,
    /// 2 x i16 block/sky light
    Light,
    /// 3 x i8 normalized + 1 byte padding
    Normal,
}

impl VertexElement {
    /// Size in bytes
    pub const fn size_bytes(&self) -> u32 {
        match self {
            VertexElement::Position => 12,
            VertexElement::Color => 12,
            VertexElement::Color4 => 4,
            VertexElement::UvF32 => 8,
            VertexElement::UvI16 => 4,
            VertexElement::Light => 4,
            VertexElement::Normal => 4,
        }
    }
}

/// Ordered list of vertex elements; element `i` is bound at shader location `i`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexFormat {
    elements: Cow<'static, [VertexElement]>,
}

impl VertexFormat {
    /// Format over a static element list (usable in constants)
    pub const fn from_static(elements: &'static [VertexElement]) -> Self {
        Self { elements: Cow::Borrowed(elements) }
    }

    pub fn new(elements: Vec<VertexElement>) -> Self {
        Self { elements: Cow::Owned(elements) }
    }

    pub fn elements(&self) -> &[VertexElement] {
        &self.elements
    }

    /// Size of one vertex in bytes
    pub fn stride(&self) -> u32 {
        self.elements.iter().map(VertexElement::size_bytes).sum()
    }

    /// Byte offset of the element at `location`
    pub fn offset_of(&self, location: usize) -> Option<u32> {
        if location >= self.elements.len() {
            return None;
        }
        Some(self.elements[..location].iter().map(VertexElement::size_bytes).sum())
    }
}

use VertexElement::*;

pub const POSITION: VertexFormat = VertexFormat::from_static(&[Position]);
pub const POSITION_COLOR: VertexFormat = VertexFormat::from_static(&[Position, Color]);
pub const POSITION_UV: VertexFormat = VertexFormat::from_static(&[Position, UvF32]);
pub const POSITION_COLOR_UV: VertexFormat = VertexFormat::from_static(&[Position, Color, UvF32]);
pub const POSITION_UV_COLOR: VertexFormat = VertexFormat::from_static(&[Position, UvF32, Color]);
pub const POSITION_COLOR4: VertexFormat = VertexFormat::from_static(&[Position, Color4]);
pub const POSITION_COLOR4_UV: VertexFormat = VertexFormat::from_static(&[Position, Color4, UvF32]);
pub const POSITION_UV_COLOR4: VertexFormat = VertexFormat::from_static(&[Position, UvF32, Color4]);
pub const POSITION_COLOR_NORMAL: VertexFormat = VertexFormat::from_static(&[Position, Color4, Normal]);
pub const POSITION_COLOR4_UV0_UV: VertexFormat = VertexFormat::from_static(&[Position, Color4, UvF32, UvI16]);
pub const POSITION_UV_COLOR4_NORMAL: VertexFormat = VertexFormat::from_static(&[Position, UvF32, Color4, Normal]);
pub const POSITION_UV_COLOR4_LIGHT: VertexFormat = VertexFormat::from_static(&[Position, UvF32, Color4, Light]);
pub const POSITION_COLOR4_UV_LIGHT: VertexFormat = VertexFormat::from_static(&[Position, Color4, UvF32, Light]);
pub const POSITION_COLOR4_UV_LIGHT_NORMAL: VertexFormat =
    VertexFormat::from_static(&[Position, Color4, UvF32, Light, Normal]);
pub const POSITION_COLOR4_UV_UV0_LIGHT_NORMAL: VertexFormat =
    VertexFormat::from_static(&[Position, Color4, UvF32, UvI16, Light, Normal]);

#[cfg(test)]
#[path = "vertex_format_tests.rs"]
mod tests;
