use glam::Mat4;

use crate::error::{RenderError, Result};

use super::backend::{DrawBackend, Transform};
use super::config::BatchConfig;
use super::layout::VertexLayout;
use super::primitive::Primitive;
use super::stream::VertexStream;

/// Renderer draw state.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum DrawState {
    #[default]
    Idle,
    Drawing,
}

/// Running totals since the renderer was created.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct BatchStats {
    pub draw_calls: u64,
    pub vertices: u64,
    pub components_uploaded: u64,
}

/// Immediate-mode batch renderer.
///
/// Primitives submitted between [`begin`](Self::begin) and [`end`](Self::end)
/// accumulate in a fixed-capacity [`VertexStream`]. The stream is drained to the
/// backend as one upload plus one draw when the next primitive would not fit,
/// and unconditionally at `end`.
pub struct BatchRenderer<B: DrawBackend> {
    backend: B,
    stream: VertexStream,
    layout: VertexLayout,
    state: DrawState,
    vertex_count: usize,
    stats: BatchStats,
}

impl<B: DrawBackend> BatchRenderer<B> {
    /// Builds a renderer around an initialized backend.
    pub fn init(backend: B, config: &BatchConfig) -> Result<Self> {
        let layout = config.layout;
        if config.staging_capacity < layout.components() {
            return Err(RenderError::init(format!(
                "staging capacity of {} components cannot hold one {:?} vertex",
                config.staging_capacity, layout
            )));
        }

        log::debug!(
            "batch renderer: {} staging components, {:?} layout",
            config.staging_capacity,
            layout
        );

        Ok(Self {
            backend,
            stream: VertexStream::with_capacity(config.staging_capacity),
            layout,
            state: DrawState::Idle,
            vertex_count: 0,
            stats: BatchStats::default(),
        })
    }

    #[inline]
    pub fn state(&self) -> DrawState {
        self.state
    }

    #[inline]
    pub fn layout(&self) -> VertexLayout {
        self.layout
    }

    /// Vertices written since the last flush.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    #[inline]
    pub fn stats(&self) -> BatchStats {
        self.stats
    }

    /// Staging capacity in whole vertices.
    #[inline]
    pub fn capacity_vertices(&self) -> usize {
        self.stream.capacity() / self.layout.components()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Hands the frame target to the backend. Call once per frame before drawing.
    pub fn bind_frame(&mut self, frame: &B::Frame) {
        self.backend.bind_frame(frame);
    }

    /// Releases the frame target. Call before presenting.
    pub fn unbind_frame(&mut self) {
        self.backend.unbind_frame();
    }

    /// Clears color and depth of the bound frame.
    pub fn clear(&mut self) -> Result<()> {
        self.backend.clear()
    }

    pub fn begin(&mut self) -> Result<()> {
        if self.state == DrawState::Drawing {
            return Err(RenderError::InvalidState("renderer is already drawing"));
        }
        self.state = DrawState::Drawing;
        self.stream.clear();
        self.vertex_count = 0;
        Ok(())
    }

    pub fn end(&mut self) -> Result<()> {
        if self.state != DrawState::Drawing {
            return Err(RenderError::InvalidState("renderer is not drawing"));
        }
        self.state = DrawState::Idle;
        self.flush()
    }

    /// Appends a primitive, flushing first if it would overflow the stream.
    pub fn draw_primitive<P: Primitive + ?Sized>(&mut self, primitive: &P) -> Result<()> {
        if self.state != DrawState::Drawing {
            return Err(RenderError::InvalidState("draw_primitive called outside begin/end"));
        }

        let components = primitive.components(self.layout);
        if components > self.stream.capacity() {
            return Err(RenderError::InvalidState(
                "primitive is larger than the staging buffer",
            ));
        }

        if self.stream.remaining() < components {
            self.flush()?;
        }

        let layout = self.layout;
        let region = self
            .stream
            .reserve(components)
            .ok_or(RenderError::InvalidState("staging buffer overflow"))?;
        primitive.write_vertices(layout, region);

        self.vertex_count += primitive.vertex_count();
        Ok(())
    }

    /// Uploads the written range and issues one draw. No-op when nothing is pending.
    ///
    /// The pending vertices are discarded even when the backend fails, so a
    /// failed flush is never replayed by the next one.
    pub fn flush(&mut self) -> Result<()> {
        if self.vertex_count == 0 {
            return Ok(());
        }

        let result = self.submit();
        self.stream.clear();
        self.vertex_count = 0;
        result
    }

    fn submit(&mut self) -> Result<()> {
        let written = self.stream.written();
        let components = written.len() as u64;
        self.backend.upload(written)?;
        self.backend.draw(self.vertex_count as u32)?;

        self.stats.draw_calls += 1;
        self.stats.vertices += self.vertex_count as u64;
        self.stats.components_uploaded += components;
        Ok(())
    }

    pub fn update_model_matrix(&mut self, model: &Mat4) {
        self.backend.set_transform(Transform::Model, model);
    }

    pub fn update_view_matrix(&mut self, view: &Mat4) {
        self.backend.set_transform(Transform::View, view);
    }

    pub fn update_projection_matrix(&mut self, projection: &Mat4) {
        self.backend.set_transform(Transform::Projection, projection);
    }

    /// Releases the staging stream, the GPU buffer and the shader program.
    ///
    /// Must be called from `Idle`. Tearing down mid-batch discards the pending
    /// vertices, still releases everything, and reports the violation.
    pub fn teardown(self) -> Result<()> {
        let Self {
            mut backend,
            stream,
            state,
            vertex_count,
            ..
        } = self;

        drop(stream);
        backend.unbind_frame();
        backend.release();

        if state == DrawState::Drawing {
            log::warn!("renderer torn down while drawing; {vertex_count} vertices discarded");
            return Err(RenderError::InvalidState("teardown called while drawing"));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::render::primitive::{Cube, Quad};

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Call {
        BindFrame(u32),
        UnbindFrame,
        Clear,
        Upload(Vec<f32>),
        Draw(u32),
        Transform(Transform, Mat4),
        Release,
    }

    /// Backend that records every call into a log shared with the test.
    ///
    /// Uploads, draws and clears can be made to fail; a failed call is not logged.
    #[derive(Debug, Default, Clone)]
    pub(crate) struct RecordingBackend {
        log: Arc<Mutex<Vec<Call>>>,
        failing_uploads: Arc<AtomicUsize>,
        failing_draws: Arc<AtomicUsize>,
        failing_clears: Arc<AtomicUsize>,
    }

    fn take_failure(counter: &AtomicUsize) -> Result<()> {
        match counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)) {
            Ok(_) => Err(RenderError::init("device lost")),
            Err(_) => Ok(()),
        }
    }

    impl RecordingBackend {
        pub fn fail_next_uploads(&self, n: usize) {
            self.failing_uploads.store(n, Ordering::SeqCst);
        }

        pub fn fail_next_draws(&self, n: usize) {
            self.failing_draws.store(n, Ordering::SeqCst);
        }

        pub fn fail_next_clears(&self, n: usize) {
            self.failing_clears.store(n, Ordering::SeqCst);
        }

        pub fn calls(&self) -> Vec<Call> {
            self.log.lock().unwrap().clone()
        }

        pub fn draws(&self) -> Vec<u32> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Draw(n) => Some(n),
                    _ => None,
                })
                .collect()
        }

        pub fn uploads(&self) -> Vec<usize> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Upload(data) => Some(data.len()),
                    _ => None,
                })
                .collect()
        }

        fn push(&self, call: Call) {
            self.log.lock().unwrap().push(call);
        }
    }

    impl DrawBackend for RecordingBackend {
        type Frame = u32;

        fn bind_frame(&mut self, frame: &u32) {
            self.push(Call::BindFrame(*frame));
        }

        fn unbind_frame(&mut self) {
            self.push(Call::UnbindFrame);
        }

        fn clear(&mut self) -> Result<()> {
            take_failure(&self.failing_clears)?;
            self.push(Call::Clear);
            Ok(())
        }

        fn upload(&mut self, components: &[f32]) -> Result<()> {
            take_failure(&self.failing_uploads)?;
            self.push(Call::Upload(components.to_vec()));
            Ok(())
        }

        fn draw(&mut self, vertex_count: u32) -> Result<()> {
            take_failure(&self.failing_draws)?;
            self.push(Call::Draw(vertex_count));
            Ok(())
        }

        fn set_transform(&mut self, slot: Transform, matrix: &Mat4) {
            self.push(Call::Transform(slot, *matrix));
        }

        fn release(&mut self) {
            self.push(Call::Release);
        }
    }

    fn renderer() -> BatchRenderer<RecordingBackend> {
        BatchRenderer::init(RecordingBackend::default(), &BatchConfig::default()).unwrap()
    }

    fn draw_cubes(r: &mut BatchRenderer<RecordingBackend>, n: usize) {
        r.begin().unwrap();
        for _ in 0..n {
            r.draw_primitive(&Cube::unit()).unwrap();
        }
        r.end().unwrap();
    }

    #[test]
    fn forty_cubes_flush_once_early_and_once_at_end() {
        let mut r = renderer();
        draw_cubes(&mut r, 40);

        assert_eq!(r.backend().draws(), vec![37 * 36, 3 * 36]);
        assert_eq!(r.backend().draws().iter().sum::<u32>(), 1440);
        assert_eq!(r.vertex_count(), 0);
    }

    #[test]
    fn draw_count_matches_batches_for_any_cube_count() {
        let cubes_per_flush = 4096 / 108;
        for n in 0..200usize {
            let mut r = renderer();
            draw_cubes(&mut r, n);

            let draws = r.backend().draws();
            assert_eq!(draws.len(), n.div_ceil(cubes_per_flush), "n = {n}");
            assert_eq!(draws.iter().map(|&d| d as usize).sum::<usize>(), n * 36);
        }
    }

    #[test]
    fn mixed_primitives_conserve_vertices() {
        let mut r = renderer();
        r.begin().unwrap();
        for i in 0..100 {
            if i % 3 == 0 {
                r.draw_primitive(&Quad::unit()).unwrap();
            } else {
                r.draw_primitive(&Cube::unit()).unwrap();
            }
        }
        r.end().unwrap();

        let total: u32 = r.backend().draws().iter().sum();
        assert_eq!(total, 34 * 6 + 66 * 36);
        assert!(r.backend().draws().iter().all(|&d| d as usize <= r.capacity_vertices()));
    }

    #[test]
    fn uploads_match_exactly_what_was_drawn() {
        let mut r = renderer();
        draw_cubes(&mut r, 75);

        let uploads = r.backend().uploads();
        let draws = r.backend().draws();
        assert_eq!(uploads.len(), draws.len());
        for (components, vertices) in uploads.iter().zip(&draws) {
            assert_eq!(*components, *vertices as usize * 3);
        }
        assert_eq!(r.stats().components_uploaded, 75 * 108);
    }

    #[test]
    fn second_batch_does_not_resend_stale_data() {
        let mut r = renderer();
        draw_cubes(&mut r, 2);
        draw_cubes(&mut r, 1);
        assert_eq!(r.backend().uploads(), vec![216, 108]);
    }

    #[test]
    fn empty_batch_issues_no_draw() {
        let mut r = renderer();
        r.begin().unwrap();
        r.end().unwrap();
        assert!(r.backend().draws().is_empty());
        assert!(r.backend().uploads().is_empty());
    }

    #[test]
    fn flush_on_empty_state_is_noop() {
        let mut r = renderer();
        r.flush().unwrap();
        assert!(r.backend().calls().is_empty());
    }

    #[test]
    fn draw_before_begin_is_invalid() {
        let mut r = renderer();
        let err = r.draw_primitive(&Cube::unit()).unwrap_err();
        assert!(matches!(err, RenderError::InvalidState(_)));
    }

    #[test]
    fn begin_twice_is_invalid() {
        let mut r = renderer();
        r.begin().unwrap();
        assert!(matches!(r.begin(), Err(RenderError::InvalidState(_))));
        assert_eq!(r.state(), DrawState::Drawing);
    }

    #[test]
    fn end_without_begin_is_invalid() {
        let mut r = renderer();
        assert!(matches!(r.end(), Err(RenderError::InvalidState(_))));
        assert_eq!(r.state(), DrawState::Idle);
    }

    #[test]
    fn oversized_primitive_is_rejected() {
        let config = BatchConfig {
            staging_capacity: 100,
            ..BatchConfig::default()
        };
        let mut r = BatchRenderer::init(RecordingBackend::default(), &config).unwrap();
        r.begin().unwrap();
        assert!(matches!(
            r.draw_primitive(&Cube::unit()),
            Err(RenderError::InvalidState(_))
        ));
        r.draw_primitive(&Quad::unit()).unwrap();
        r.end().unwrap();
        assert_eq!(r.backend().draws(), vec![6]);
    }

    #[test]
    fn color_layout_doubles_the_footprint() {
        let config = BatchConfig {
            layout: VertexLayout::PositionColor,
            ..BatchConfig::default()
        };
        let mut r = BatchRenderer::init(RecordingBackend::default(), &config).unwrap();
        draw_cubes(&mut r, 20);
        // 4096 / 216 = 18 cubes per flush
        assert_eq!(r.backend().draws(), vec![18 * 36, 2 * 36]);
        assert_eq!(r.backend().uploads(), vec![18 * 216, 2 * 216]);
    }

    #[test]
    fn capacity_below_one_vertex_fails_init() {
        let config = BatchConfig {
            staging_capacity: 2,
            ..BatchConfig::default()
        };
        let err = BatchRenderer::init(RecordingBackend::default(), &config).err();
        assert!(matches!(err, Some(RenderError::Initialization(_))));
    }

    #[test]
    fn transforms_are_forwarded_in_order() {
        let mut r = renderer();
        let m = Mat4::from_translation(glam::Vec3::X);
        r.update_model_matrix(&m);
        r.update_view_matrix(&Mat4::IDENTITY);
        r.update_projection_matrix(&m);
        assert_eq!(
            r.backend().calls(),
            vec![
                Call::Transform(Transform::Model, m),
                Call::Transform(Transform::View, Mat4::IDENTITY),
                Call::Transform(Transform::Projection, m),
            ]
        );
    }

    #[test]
    fn clear_and_frame_binding_pass_through() {
        let mut r = renderer();
        r.bind_frame(&7);
        r.clear().unwrap();
        r.unbind_frame();
        assert_eq!(
            r.backend().calls(),
            vec![Call::BindFrame(7), Call::Clear, Call::UnbindFrame]
        );
    }

    #[test]
    fn failed_end_does_not_resend_its_vertices() {
        let mut r = renderer();
        r.backend().fail_next_uploads(1);

        r.begin().unwrap();
        r.draw_primitive(&Cube::unit()).unwrap();
        r.draw_primitive(&Cube::unit()).unwrap();
        assert!(matches!(r.end(), Err(RenderError::Initialization(_))));
        assert_eq!(r.state(), DrawState::Idle);
        assert_eq!(r.vertex_count(), 0);

        draw_cubes(&mut r, 1);
        assert_eq!(r.backend().uploads(), vec![108]);
        assert_eq!(r.backend().draws(), vec![36]);
        assert_eq!(r.stats().draw_calls, 1);
        assert_eq!(r.stats().components_uploaded, 108);
    }

    #[test]
    fn failed_overflow_flush_keeps_the_batch_open() {
        let mut r = renderer();
        r.begin().unwrap();
        for _ in 0..37 {
            r.draw_primitive(&Cube::unit()).unwrap();
        }
        r.backend().fail_next_uploads(1);
        assert!(r.draw_primitive(&Cube::unit()).is_err());
        assert_eq!(r.state(), DrawState::Drawing);
        assert_eq!(r.vertex_count(), 0);

        r.draw_primitive(&Cube::unit()).unwrap();
        r.end().unwrap();
        assert_eq!(r.backend().uploads(), vec![108]);
        assert_eq!(r.backend().draws(), vec![36]);
    }

    #[test]
    fn failed_draw_is_reported_and_not_counted() {
        let mut r = renderer();
        r.backend().fail_next_draws(1);

        r.begin().unwrap();
        r.draw_primitive(&Cube::unit()).unwrap();
        assert!(r.end().is_err());
        assert_eq!(r.stats(), BatchStats::default());
        assert!(r.backend().draws().is_empty());

        draw_cubes(&mut r, 2);
        assert_eq!(r.backend().uploads(), vec![108, 216]);
        assert_eq!(r.backend().draws(), vec![72]);
        assert_eq!(r.stats().draw_calls, 1);
    }

    #[test]
    fn failed_clear_is_reported() {
        let mut r = renderer();
        r.backend().fail_next_clears(1);
        r.bind_frame(&1);
        assert!(matches!(r.clear(), Err(RenderError::Initialization(_))));
        r.clear().unwrap();
        assert_eq!(r.backend().calls(), vec![Call::BindFrame(1), Call::Clear]);
    }

    #[test]
    fn teardown_from_idle_releases_once() {
        let backend = RecordingBackend::default();
        let mut r = BatchRenderer::init(backend.clone(), &BatchConfig::default()).unwrap();
        draw_cubes(&mut r, 1);
        assert!(r.teardown().is_ok());

        let calls = backend.calls();
        assert_eq!(calls.iter().filter(|c| **c == Call::Release).count(), 1);
        assert_eq!(calls.last(), Some(&Call::Release));
    }

    #[test]
    fn teardown_while_drawing_reports_violation_and_discards() {
        let backend = RecordingBackend::default();
        let mut r = BatchRenderer::init(backend.clone(), &BatchConfig::default()).unwrap();
        r.begin().unwrap();
        r.draw_primitive(&Cube::unit()).unwrap();
        assert!(matches!(r.teardown(), Err(RenderError::InvalidState(_))));
        assert!(backend.draws().is_empty());
        assert_eq!(backend.calls().last(), Some(&Call::Release));
    }
}
