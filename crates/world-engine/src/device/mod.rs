//! GPU device + surface management.
//!
//! Creates the wgpu instance/adapter/device/queue for a window, configures
//! the surface and acquires frames for the render thread.

mod error;
mod frame;
mod gpu;
mod init;
mod surface;

pub use error::SurfaceErrorAction;
pub use frame::SurfaceFrame;
pub use gpu::{Gpu, GpuContext, DEPTH_FORMAT};
pub use init::GpuInit;
pub use surface::present_mode_for;
