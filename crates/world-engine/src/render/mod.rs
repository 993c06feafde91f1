//! Batched geometry rendering.
//!
//! Primitives are written into a CPU staging stream between `begin` and `end`
//! and drained to the GPU as one upload plus one draw whenever the stream
//! would overflow, and once more at `end`.
//!
//! Convention:
//! - geometry is emitted as triangle lists in model space
//! - the shader program reads `model`, `view` and `projection` from one uniform block

mod backend;
mod batch;
mod buffer;
mod camera;
mod config;
mod layout;
mod primitive;
mod shader;
pub mod shaders;
mod stream;
mod wgpu_backend;

pub use backend::{DrawBackend, Transform};
pub use batch::{BatchRenderer, BatchStats, DrawState};
pub use buffer::{BufferContents, BufferId, BufferTarget, BufferUsage, GpuBuffer};
pub use camera::{Camera, Projection};
pub use config::BatchConfig;
pub use layout::{AttributeSpec, VertexLayout};
pub use primitive::{Cube, Primitive, Quad};
pub use shader::{
    AttributeLocation, PipelineTarget, ProgramBuilder, Shader, ShaderProgram, ShaderSource,
    UniformLocation,
};
pub use stream::VertexStream;
pub use wgpu_backend::WgpuBackend;

/// Batch renderer drawing through wgpu.
pub type WgpuBatchRenderer = BatchRenderer<WgpuBackend>;

#[cfg(test)]
pub(crate) use batch::tests::{Call, RecordingBackend};
