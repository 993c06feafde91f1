//! Window, event loop and render-thread coordination.
//!
//! The event thread owns the winit loop and the window; the render thread
//! owns the GPU context. [`WindowCoordinator`] is the only state they share.

mod config;
mod coordinator;
mod render_loop;
mod runtime;
mod surface;

pub use config::WindowConfig;
pub use coordinator::{PresentTarget, WindowCoordinator};
pub use render_loop::run_render_loop;
pub use runtime::Runtime;
pub use surface::WindowSurface;
