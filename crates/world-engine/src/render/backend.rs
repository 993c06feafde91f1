use glam::Mat4;

use crate::error::Result;

/// Transform slots exposed by the batch shader's uniform block.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Transform {
    Model,
    View,
    Projection,
}

impl Transform {
    pub const ALL: [Transform; 3] = [Transform::Model, Transform::View, Transform::Projection];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Uniform member name in the shader.
    pub const fn uniform_name(self) -> &'static str {
        match self {
            Transform::Model => "model",
            Transform::View => "view",
            Transform::Projection => "projection",
        }
    }
}

/// GPU side of the batch renderer.
///
/// The renderer owns all batching policy; a backend only knows how to clear
/// the frame, upload a staging range and draw it. Implementations own the GPU
/// buffer and the shader program, and release both in `release`.
pub trait DrawBackend {
    /// Frame target the backend draws into (a surface texture for wgpu).
    type Frame;

    /// Makes `frame` the target of subsequent clears and draws.
    fn bind_frame(&mut self, frame: &Self::Frame);

    /// Drops any reference to the current frame target.
    fn unbind_frame(&mut self);

    /// Clears color and depth of the current frame target.
    fn clear(&mut self) -> Result<()>;

    /// Uploads `components` into the vertex buffer at offset zero.
    fn upload(&mut self, components: &[f32]) -> Result<()>;

    /// Draws `vertex_count` vertices from the start of the vertex buffer.
    fn draw(&mut self, vertex_count: u32) -> Result<()>;

    /// Writes a transform into the program's uniform state.
    fn set_transform(&mut self, slot: Transform, matrix: &Mat4);

    /// Deletes the vertex buffer, then the shader program.
    fn release(&mut self);
}
