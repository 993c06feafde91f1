use crate::error::Result;
use crate::render::{BatchRenderer, DrawBackend};

use super::ctx::FrameCtx;

/// Control directive returned by scene callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Per-frame drawing contract, run on the render thread.
///
/// The render loop binds and clears the frame before `on_frame` and flushes
/// any batch still open afterwards, then presents.
pub trait Scene<B: DrawBackend> {
    /// Called once after the renderer is initialized.
    fn on_start(&mut self, renderer: &mut BatchRenderer<B>) -> Result<()> {
        let _ = renderer;
        Ok(())
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, B>) -> Result<AppControl>;
}
