/// Per-vertex component layout of the staging stream.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum VertexLayout {
    /// xyz
    #[default]
    Position,
    /// xyz + rgb
    PositionColor,
}

/// One attribute inside a vertex, in float components.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct AttributeSpec {
    pub name: &'static str,
    pub components: u32,
    pub offset_components: u32,
}

const POSITION: AttributeSpec = AttributeSpec {
    name: "position",
    components: 3,
    offset_components: 0,
};

const COLOR: AttributeSpec = AttributeSpec {
    name: "color",
    components: 3,
    offset_components: 3,
};

impl VertexLayout {
    /// Float components per vertex.
    #[inline]
    pub const fn components(self) -> usize {
        match self {
            VertexLayout::Position => 3,
            VertexLayout::PositionColor => 6,
        }
    }

    #[inline]
    pub const fn stride_bytes(self) -> u64 {
        (self.components() * std::mem::size_of::<f32>()) as u64
    }

    /// Attributes in the order they appear inside a vertex.
    pub fn attributes(self) -> &'static [AttributeSpec] {
        match self {
            VertexLayout::Position => &[POSITION],
            VertexLayout::PositionColor => &[POSITION, COLOR],
        }
    }

    /// Parses `position` / `position-color` (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "position" | "pos" => Some(VertexLayout::Position),
            "position-color" | "position_color" | "color" => Some(VertexLayout::PositionColor),
            _ => None,
        }
    }
}
