//! WorldEngine core.
//!
//! A batched immediate-mode renderer on wgpu, driven from a dedicated render
//! thread while the calling thread runs the winit event loop.

pub mod core;
pub mod device;
pub mod error;
pub mod input;
pub mod logging;
pub mod render;
pub mod time;
pub mod window;

pub use error::{RenderError, Result};
