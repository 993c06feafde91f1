use crate::input::InputState;
use crate::render::{BatchRenderer, DrawBackend};
use crate::time::FrameTime;

/// Per-frame context passed to [`Scene::on_frame`](super::Scene::on_frame).
pub struct FrameCtx<'a, B: DrawBackend> {
    pub renderer: &'a mut BatchRenderer<B>,
    /// Input snapshot taken at the start of the frame.
    pub input: &'a InputState,
    pub time: FrameTime,
    /// Framebuffer size in physical pixels; never 0x0 during a frame.
    pub framebuffer: (u32, u32),
}

impl<B: DrawBackend> FrameCtx<'_, B> {
    pub fn aspect(&self) -> f32 {
        crate::render::Projection::aspect(self.framebuffer.0, self.framebuffer.1)
    }
}
