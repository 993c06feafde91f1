use std::sync::Arc;

use winit::event_loop::ActiveEventLoop;
use winit::window::{Window, WindowId};

use crate::device::{Gpu, GpuContext, GpuInit, SurfaceFrame};
use crate::error::{RenderError, Result};

use super::config::WindowConfig;
use super::coordinator::{PresentTarget, WindowCoordinator};

/// winit window plus the wgpu surface and device presenting to it.
///
/// The window is created on the event thread; the GPU side is created later
/// by [`PresentTarget::make_current`] on the render thread.
pub struct WindowSurface {
    window: Option<Arc<Window>>,
    gpu_init: GpuInit,
    gpu: Option<Gpu>,
}

impl WindowSurface {
    pub fn new(window: Arc<Window>, gpu_init: GpuInit) -> Self {
        Self {
            window: Some(window),
            gpu_init,
            gpu: None,
        }
    }

    pub fn window(&self) -> Option<&Arc<Window>> {
        self.window.as_ref()
    }
}

impl PresentTarget for WindowSurface {
    type Context = GpuContext;
    type Frame = SurfaceFrame;

    fn make_current(&mut self) -> Result<GpuContext> {
        if self.gpu.is_some() {
            return Err(RenderError::InvalidState("GPU context already created"));
        }
        let window = self
            .window
            .clone()
            .ok_or(RenderError::InvalidState("window already released"))?;

        let gpu = pollster::block_on(Gpu::new(window, self.gpu_init.clone()))?;
        let context = gpu.context();
        self.gpu = Some(gpu);
        Ok(context)
    }

    fn resize(&mut self, width: u32, height: u32) {
        if let Some(gpu) = self.gpu.as_mut() {
            gpu.resize(width, height);
        }
    }

    fn acquire(&mut self) -> Result<Option<SurfaceFrame>> {
        self.gpu
            .as_mut()
            .ok_or(RenderError::InvalidState("frame acquired before the context was made current"))?
            .acquire()
    }

    fn present(&mut self, frame: SurfaceFrame) {
        if let Some(window) = &self.window {
            window.pre_present_notify();
        }
        frame.present();
    }

    fn release(&mut self) {
        // Surface first: it holds a reference to the window.
        self.gpu = None;
        self.window = None;
    }
}

impl WindowCoordinator<WindowSurface> {
    /// Creates the window described by `config` and wraps it.
    ///
    /// Must run on the event thread, inside the event loop.
    pub fn create(event_loop: &ActiveEventLoop, config: &WindowConfig) -> Result<Self> {
        let window = event_loop
            .create_window(config.attributes())
            .map_err(|e| RenderError::WindowCreation(e.to_string()))?;
        let size = window.inner_size();

        log::info!(
            "window `{}` created at {}x{} (vsync: {}, msaa: {}, fullscreen: {})",
            config.title,
            size.width,
            size.height,
            config.vsync,
            config.msaa_samples,
            config.fullscreen
        );

        let surface = WindowSurface::new(Arc::new(window), config.gpu_init());
        Ok(Self::new(surface, (size.width, size.height)))
    }

    /// Id of the managed window, if it has not been destroyed.
    pub fn window_id(&self) -> Option<WindowId> {
        self.with_target(|t| t.window().map(|w| w.id())).flatten()
    }
}
