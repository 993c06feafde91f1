use std::time::Duration;

use crate::core::{AppControl, FrameCtx, Scene};
use crate::error::Result;
use crate::render::{BatchConfig, BatchRenderer, DrawBackend, DrawState};
use crate::time::FrameClock;

use super::coordinator::{PresentTarget, WindowCoordinator};

/// Longest park between frame attempts while no frame can be acquired.
const NO_FRAME_WAIT: Duration = Duration::from_millis(10);

/// Render-thread body.
///
/// Makes the context current, builds the renderer through `make_backend`,
/// then renders frames until the window is destroyed or the scene exits.
/// The renderer is torn down on every path out of the frame loop.
pub fn run_render_loop<T, B, S, F>(
    coordinator: &WindowCoordinator<T>,
    config: &BatchConfig,
    make_backend: F,
    scene: &mut S,
) -> Result<()>
where
    T: PresentTarget,
    B: DrawBackend<Frame = T::Frame>,
    F: FnOnce(T::Context) -> Result<B>,
    S: Scene<B>,
{
    let context = coordinator.make_current_on_calling_thread()?;
    let backend = make_backend(context)?;
    let mut renderer = BatchRenderer::init(backend, config)?;
    log::info!(
        "renderer ready: {} vertices per batch",
        renderer.capacity_vertices()
    );

    let result = frame_loop(coordinator, &mut renderer, scene);

    let stats = renderer.stats();
    let teardown = renderer.teardown();
    log::info!(
        "render loop finished: {} draw calls, {} vertices",
        stats.draw_calls,
        stats.vertices
    );
    result.and(teardown)
}

fn frame_loop<T, B, S>(
    coordinator: &WindowCoordinator<T>,
    renderer: &mut BatchRenderer<B>,
    scene: &mut S,
) -> Result<()>
where
    T: PresentTarget,
    B: DrawBackend<Frame = T::Frame>,
    S: Scene<B>,
{
    scene.on_start(renderer)?;

    let mut clock = FrameClock::new();
    let mut skipped = false;

    while !coordinator.is_destroyed() {
        let Some(frame) = coordinator.acquire_frame()? else {
            // Minimized or surface not ready.
            skipped = true;
            coordinator.wait_for_frame(NO_FRAME_WAIT);
            continue;
        };
        if skipped {
            clock.reset();
            skipped = false;
        }

        let time = clock.tick();
        let input = coordinator.input();

        renderer.bind_frame(&frame);
        renderer.clear()?;

        let control = {
            let mut ctx = FrameCtx {
                renderer: &mut *renderer,
                input: &input,
                time,
                framebuffer: coordinator.framebuffer_size(),
            };
            scene.on_frame(&mut ctx)
        };

        if renderer.state() == DrawState::Drawing {
            log::warn!("frame ended with an open batch; closing it");
            renderer.end()?;
        }
        renderer.unbind_frame();
        let control = control?;

        coordinator.try_swap_buffers(frame);

        if control == AppControl::Exit {
            coordinator.request_close();
            break;
        }
    }
    Ok(())
}
