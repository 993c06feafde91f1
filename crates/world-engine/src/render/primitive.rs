//! Primitive descriptors.
//!
//! A primitive reports its vertex count and writes its vertices, laid out per
//! [`VertexLayout`], into a region of the staging stream handed to it by the
//! batch renderer. Geometry is emitted as a triangle list in model space.

use glam::Vec3;

use super::layout::VertexLayout;

/// Something the batch renderer can emit.
pub trait Primitive {
    /// Number of vertices written by `write_vertices`.
    fn vertex_count(&self) -> usize;

    /// Writes exactly `vertex_count() * layout.components()` floats into `out`.
    fn write_vertices(&self, layout: VertexLayout, out: &mut [f32]);

    /// Staging footprint in float components.
    #[inline]
    fn components(&self, layout: VertexLayout) -> usize {
        self.vertex_count() * layout.components()
    }
}

/// Unit cube corners, 12 triangles, counter-clockwise when viewed from outside.
const CUBE_POSITIONS: [[f32; 3]; 36] = [
    [-0.5, -0.5, -0.5], [-0.5, -0.5, 0.5], [-0.5, 0.5, 0.5],
    [0.5, 0.5, -0.5], [-0.5, -0.5, -0.5], [-0.5, 0.5, -0.5],
    [0.5, -0.5, 0.5], [-0.5, -0.5, -0.5], [0.5, -0.5, -0.5],
    [0.5, 0.5, -0.5], [0.5, -0.5, -0.5], [-0.5, -0.5, -0.5],
    [-0.5, -0.5, -0.5], [-0.5, 0.5, 0.5], [-0.5, 0.5, -0.5],
    [0.5, -0.5, 0.5], [-0.5, -0.5, 0.5], [-0.5, -0.5, -0.5],
    [-0.5, 0.5, 0.5], [-0.5, -0.5, 0.5], [0.5, -0.5, 0.5],
    [0.5, 0.5, 0.5], [0.5, -0.5, -0.5], [0.5, 0.5, -0.5],
    [0.5, -0.5, -0.5], [0.5, 0.5, 0.5], [0.5, -0.5, 0.5],
    [0.5, 0.5, 0.5], [0.5, 0.5, -0.5], [-0.5, 0.5, -0.5],
    [0.5, 0.5, 0.5], [-0.5, 0.5, -0.5], [-0.5, 0.5, 0.5],
    [0.5, 0.5, 0.5], [-0.5, 0.5, 0.5], [0.5, -0.5, 0.5],
];

/// Counter-clockwise when viewed from -Z, where the default camera sits.
const QUAD_POSITIONS: [[f32; 3]; 6] = [
    [-0.5, -0.5, 0.0], [-0.5, 0.5, 0.0], [0.5, 0.5, 0.0],
    [-0.5, -0.5, 0.0], [0.5, 0.5, 0.0], [0.5, -0.5, 0.0],
];

/// Axis-aligned cube of edge `size` centered on `center`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Cube {
    pub center: Vec3,
    pub size: f32,
    pub color: [f32; 3],
}

impl Cube {
    /// Unit cube at the origin.
    pub const fn unit() -> Self {
        Self {
            center: Vec3::ZERO,
            size: 1.0,
            color: [1.0, 1.0, 1.0],
        }
    }

    pub fn at(center: Vec3) -> Self {
        Self { center, ..Self::unit() }
    }

    pub fn with_size(mut self, size: f32) -> Self {
        self.size = size;
        self
    }

    pub fn with_color(mut self, color: [f32; 3]) -> Self {
        self.color = color;
        self
    }
}

impl Default for Cube {
    fn default() -> Self {
        Self::unit()
    }
}

impl Primitive for Cube {
    fn vertex_count(&self) -> usize {
        CUBE_POSITIONS.len()
    }

    fn write_vertices(&self, layout: VertexLayout, out: &mut [f32]) {
        write_positions(&CUBE_POSITIONS, self.center, self.size, self.color, layout, out);
    }
}

/// Square of edge `size` in the XY plane, facing -Z.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Quad {
    pub center: Vec3,
    pub size: f32,
    pub color: [f32; 3],
}

impl Quad {
    pub const fn unit() -> Self {
        Self {
            center: Vec3::ZERO,
            size: 1.0,
            color: [1.0, 1.0, 1.0],
        }
    }
}

impl Default for Quad {
    fn default() -> Self {
        Self::unit()
    }
}

impl Primitive for Quad {
    fn vertex_count(&self) -> usize {
        QUAD_POSITIONS.len()
    }

    fn write_vertices(&self, layout: VertexLayout, out: &mut [f32]) {
        write_positions(&QUAD_POSITIONS, self.center, self.size, self.color, layout, out);
    }
}

fn write_positions(
    positions: &[[f32; 3]],
    center: Vec3,
    size: f32,
    color: [f32; 3],
    layout: VertexLayout,
    out: &mut [f32],
) {
    let stride = layout.components();
    debug_assert_eq!(out.len(), positions.len() * stride);

    for (p, v) in positions.iter().zip(out.chunks_exact_mut(stride)) {
        let p = center + Vec3::from_array(*p) * size;
        v[..3].copy_from_slice(&p.to_array());
        if layout == VertexLayout::PositionColor {
            v[3..6].copy_from_slice(&color);
        }
    }
}
