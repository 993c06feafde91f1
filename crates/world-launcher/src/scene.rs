use glam::{Mat4, Vec3};

use world_engine::core::{AppControl, FrameCtx, Scene};
use world_engine::render::{BatchRenderer, Camera, Cube, DrawBackend, Projection};
use world_engine::Result;

/// A slowly rotating grid of cubes.
///
/// The grid is larger than one staging batch, so each frame exercises an
/// overflow flush as well as the final flush at `end`.
pub struct CubeField {
    cubes: Vec<Cube>,
    camera: Camera,
    projection: Projection,
    /// Radians per second around Y.
    spin: f32,
    last_report: f32,
}

impl CubeField {
    pub fn new(side: usize) -> Self {
        let spacing = 1.5;
        let offset = (side.saturating_sub(1)) as f32 * spacing / 2.0;
        let step = 1.0 / side.max(1) as f32;

        let mut cubes = Vec::with_capacity(side * side);
        for row in 0..side {
            for col in 0..side {
                let center = Vec3::new(
                    col as f32 * spacing - offset,
                    row as f32 * spacing - offset,
                    0.0,
                );
                let color = [col as f32 * step, row as f32 * step, 0.6];
                cubes.push(Cube::at(center).with_size(0.8).with_color(color));
            }
        }

        Self {
            cubes,
            camera: Camera {
                eye: Vec3::new(0.0, 0.0, -4.0 * side.max(1) as f32),
                ..Camera::default()
            },
            projection: Projection::default(),
            spin: 0.6,
            last_report: 0.0,
        }
    }
}

impl<B: DrawBackend> Scene<B> for CubeField {
    fn on_start(&mut self, renderer: &mut BatchRenderer<B>) -> Result<()> {
        renderer.update_view_matrix(&self.camera.view());
        log::info!(
            "drawing {} cubes, {} vertices per batch",
            self.cubes.len(),
            renderer.capacity_vertices()
        );
        Ok(())
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, B>) -> Result<AppControl> {
        let (width, height) = ctx.framebuffer;
        let angle = ctx.time.elapsed * self.spin;

        let renderer = &mut *ctx.renderer;
        renderer.update_projection_matrix(&self.projection.matrix(width, height));
        renderer.update_model_matrix(&Mat4::from_rotation_y(angle));

        renderer.begin()?;
        for cube in &self.cubes {
            renderer.draw_primitive(cube)?;
        }
        renderer.end()?;

        if ctx.time.elapsed - self.last_report >= 5.0 {
            self.last_report = ctx.time.elapsed;
            let stats = renderer.stats();
            log::debug!(
                "frame {}: {:.1} fps, {} draw calls so far",
                ctx.time.frame_index,
                1.0 / ctx.time.dt,
                stats.draw_calls
            );
        }
        Ok(AppControl::Continue)
    }
}
