use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Context, Result};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop, EventLoopProxy};
use winit::window::WindowId;

use crate::core::Scene;
use crate::input::translate_window_event;
use crate::render::{BatchConfig, WgpuBackend};

use super::config::WindowConfig;
use super::coordinator::{PresentTarget, WindowCoordinator};
use super::render_loop::run_render_loop;
use super::surface::WindowSurface;

/// Wakes the event loop from the render thread.
#[derive(Debug, Copy, Clone)]
struct Wake;

type Coordinator = Arc<WindowCoordinator<WindowSurface>>;
type RenderHandle = JoinHandle<crate::error::Result<()>>;

/// Entry point: event loop on the calling thread, rendering on a `render` thread.
pub struct Runtime;

impl Runtime {
    /// Runs until the window is closed.
    ///
    /// `make_scene` runs on the render thread. Fails if the window cannot be
    /// created or the render thread ended with an error.
    pub fn run<S, F>(window: WindowConfig, batch: BatchConfig, make_scene: F) -> Result<()>
    where
        S: Scene<WgpuBackend>,
        F: FnOnce() -> S + Send + 'static,
    {
        let event_loop = EventLoop::<Wake>::with_user_event()
            .build()
            .context("failed to create winit EventLoop")?;

        let mut state = AppState::new(window, batch, make_scene, event_loop.create_proxy());
        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        match state.failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

type SpawnFn = Box<dyn FnOnce(Coordinator, BatchConfig) -> Result<RenderHandle>>;

struct AppState {
    window_config: WindowConfig,
    batch_config: BatchConfig,
    spawn: Option<SpawnFn>,
    proxy: EventLoopProxy<Wake>,

    coordinator: Option<Coordinator>,
    window_id: Option<WindowId>,
    render_thread: Option<RenderHandle>,
    failure: Option<anyhow::Error>,
}

impl AppState {
    fn new<S, F>(
        window_config: WindowConfig,
        batch_config: BatchConfig,
        make_scene: F,
        proxy: EventLoopProxy<Wake>,
    ) -> Self
    where
        S: Scene<WgpuBackend>,
        F: FnOnce() -> S + Send + 'static,
    {
        let spawn: SpawnFn = Box::new(move |coordinator, batch| {
            thread::Builder::new()
                .name("render".into())
                .spawn(move || {
                    let mut scene = make_scene();
                    let result = run_render_loop(
                        &*coordinator,
                        &batch,
                        |ctx| WgpuBackend::new(ctx, &batch),
                        &mut scene,
                    );
                    if let Err(e) = &result {
                        log::error!("render thread failed: {e}");
                        coordinator.request_close();
                    }
                    result
                })
                .context("failed to spawn render thread")
        });

        Self {
            window_config,
            batch_config,
            spawn: Some(spawn),
            proxy,
            coordinator: None,
            window_id: None,
            render_thread: None,
            failure: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        self.failure.get_or_insert(err);
        event_loop.exit();
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let proxy = self.proxy.clone();
        let coordinator = WindowCoordinator::create(event_loop, &self.window_config)
            .context("failed to create window")?
            .with_waker(move || {
                // Fails only once the loop is gone.
                let _ = proxy.send_event(Wake);
            });
        let coordinator = Arc::new(coordinator);

        let spawn = self
            .spawn
            .take()
            .ok_or_else(|| anyhow!("render thread already started"))?;
        let handle = spawn(Arc::clone(&coordinator), self.batch_config.clone())?;

        self.window_id = coordinator.window_id();
        self.coordinator = Some(coordinator);
        self.render_thread = Some(handle);
        log::debug!("render thread started");
        Ok(())
    }

    fn shutdown(&mut self) {
        let Some(coordinator) = self.coordinator.take() else {
            return;
        };
        if let Err(e) = stop_render_thread(&coordinator, self.render_thread.take()) {
            self.failure.get_or_insert(e);
        }
    }
}

/// Stops the render thread, then releases the window.
///
/// The surface outlives every frame the render thread may still hold, and is
/// dropped on the calling thread only after the join.
fn stop_render_thread<T: PresentTarget>(
    coordinator: &WindowCoordinator<T>,
    handle: Option<RenderHandle>,
) -> Result<()> {
    coordinator.mark_destroyed();
    let joined = match handle.map(JoinHandle::join) {
        None => Ok(()),
        Some(Ok(Ok(()))) => {
            log::info!("render thread joined");
            Ok(())
        }
        Some(Ok(Err(e))) => Err(anyhow::Error::new(e).context("render thread failed")),
        Some(Err(_)) => Err(anyhow!("render thread panicked")),
    };
    coordinator.destroy();
    joined
}

impl ApplicationHandler<Wake> for AppState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.coordinator.is_some() {
            return;
        }
        if let Err(e) = self.start(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, _: Wake) {
        if self
            .coordinator
            .as_ref()
            .is_some_and(|c| c.is_close_requested())
        {
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let Some(coordinator) = self.coordinator.as_ref() else {
            return;
        };
        if self.window_id != Some(window_id) {
            return;
        }

        if let Some(input) = translate_window_event(&event, coordinator.framebuffer_size()) {
            if input.requests_close() {
                coordinator.request_close();
            }
            coordinator.dispatch_input(&input);
        }

        match event {
            WindowEvent::CloseRequested => coordinator.request_close(),
            WindowEvent::Resized(size) => coordinator.notify_resize(size.width, size.height),
            _ => {}
        }

        if coordinator.is_close_requested() {
            event_loop.exit();
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Wait);
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.shutdown();
    }
}
