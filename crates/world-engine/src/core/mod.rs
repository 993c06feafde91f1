//! Contract between the render loop and the code that draws each frame.

mod app;
mod ctx;

pub use app::{AppControl, Scene};
pub use ctx::FrameCtx;
