//! Window/thread coordination.
//!
//! The event thread and the render thread share one [`WindowCoordinator`].
//! Presenting a frame and destroying the window are serialised by a single
//! mutex around the present target; the destroyed flag is set under that
//! mutex and never cleared, so once `destroy` returns no frame can reach the
//! released surface.
//!
//! Shutdown is two-phase: [`WindowCoordinator::mark_destroyed`] stops the
//! render thread while the surface is still alive, and
//! [`WindowCoordinator::destroy`] releases it once that thread has been joined.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::{self, ThreadId};
use std::time::Duration;

use crate::error::{RenderError, Result};
use crate::input::{InputEvent, InputState};

/// Presentable window plus the GPU context bound to it.
pub trait PresentTarget: Send {
    /// Device handles handed to the render thread.
    type Context;
    /// One acquired frame.
    type Frame;

    /// Creates the GPU context. Called once, on the render thread.
    fn make_current(&mut self) -> Result<Self::Context>;

    /// Applies a new framebuffer size. Both dimensions are non-zero.
    fn resize(&mut self, width: u32, height: u32);

    /// Acquires the next frame; `Ok(None)` skips this frame.
    fn acquire(&mut self) -> Result<Option<Self::Frame>>;

    fn present(&mut self, frame: Self::Frame);

    /// Releases the GPU surface, then the window.
    fn release(&mut self);
}

type Waker = Box<dyn Fn() + Send + Sync>;

/// Shared state between the event thread and the render thread.
pub struct WindowCoordinator<T: PresentTarget> {
    target: Mutex<Option<T>>,
    destroyed: AtomicBool,
    close_requested: AtomicBool,
    context_thread: OnceLock<ThreadId>,
    /// `width << 32 | height`, physical pixels.
    framebuffer: AtomicU64,
    resize_pending: AtomicBool,
    input: Mutex<InputState>,
    waker: Option<Waker>,
    /// Generation bumped on resize and destroy; wakes a render thread with no frame to draw.
    frame_signal: (Mutex<u64>, Condvar),
}

fn pack(width: u32, height: u32) -> u64 {
    (u64::from(width) << 32) | u64::from(height)
}

fn unpack(v: u64) -> (u32, u32) {
    ((v >> 32) as u32, v as u32)
}

impl<T: PresentTarget> WindowCoordinator<T> {
    pub fn new(target: T, framebuffer: (u32, u32)) -> Self {
        Self {
            target: Mutex::new(Some(target)),
            destroyed: AtomicBool::new(false),
            close_requested: AtomicBool::new(false),
            context_thread: OnceLock::new(),
            framebuffer: AtomicU64::new(pack(framebuffer.0, framebuffer.1)),
            resize_pending: AtomicBool::new(false),
            input: Mutex::new(InputState::default()),
            waker: None,
            frame_signal: (Mutex::new(0), Condvar::new()),
        }
    }

    /// Installs a callback that wakes the event loop after `request_close`.
    pub fn with_waker(mut self, waker: impl Fn() + Send + Sync + 'static) -> Self {
        self.waker = Some(Box::new(waker));
        self
    }

    fn lock_target(&self) -> MutexGuard<'_, Option<T>> {
        // The guarded state stays consistent even if a holder panicked.
        self.target.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` on the live target under the lock.
    pub(crate) fn with_target<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.lock_target().as_ref().map(f)
    }

    fn on_context_thread(&self) -> bool {
        self.context_thread.get() == Some(&thread::current().id())
    }

    /// Creates the GPU context and binds it to the calling thread.
    ///
    /// Only one thread may ever own the context, and only once.
    pub fn make_current_on_calling_thread(&self) -> Result<T::Context> {
        let me = thread::current();
        if self.context_thread.set(me.id()).is_err() {
            return Err(RenderError::InvalidState(
                "GPU context is already current on a thread",
            ));
        }

        let mut guard = self.lock_target();
        if self.is_destroyed() {
            return Err(RenderError::InvalidState("window already destroyed"));
        }
        let target = guard
            .as_mut()
            .ok_or(RenderError::InvalidState("window already destroyed"))?;
        let context = target.make_current()?;

        log::info!(
            "GPU context current on thread `{}`",
            me.name().unwrap_or("unnamed")
        );
        Ok(context)
    }

    /// Records an input event. Event thread only.
    pub fn dispatch_input(&self, event: &InputEvent) {
        debug_assert!(!self.on_context_thread(), "input dispatched on the render thread");
        self.input
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .apply_event(event);
    }

    /// Records a framebuffer resize; applied by the next `acquire_frame`. Event thread only.
    pub fn notify_resize(&self, width: u32, height: u32) {
        debug_assert!(!self.on_context_thread(), "resize dispatched on the render thread");
        self.framebuffer.store(pack(width, height), Ordering::Release);
        self.resize_pending.store(true, Ordering::Release);
        self.signal_frame();
        log::debug!("framebuffer resized to {width}x{height}");
    }

    fn signal_frame(&self) {
        let mut generation = self.frame_signal.0.lock().unwrap_or_else(PoisonError::into_inner);
        *generation = generation.wrapping_add(1);
        self.frame_signal.1.notify_all();
    }

    /// Parks the calling thread until the framebuffer is resized, the window
    /// is destroyed, or `timeout` elapses. Used by the render thread after
    /// `acquire_frame` returned no frame.
    pub fn wait_for_frame(&self, timeout: Duration) {
        let guard = self.frame_signal.0.lock().unwrap_or_else(PoisonError::into_inner);
        let seen = *guard;
        let _ = self
            .frame_signal
            .1
            .wait_timeout_while(guard, timeout, |generation| {
                *generation == seen && !self.is_destroyed()
            })
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Acquires the next frame. Render thread only.
    ///
    /// `Ok(None)` when destroyed, while the framebuffer is 0x0, or when the
    /// surface asked to skip the frame.
    pub fn acquire_frame(&self) -> Result<Option<T::Frame>> {
        debug_assert!(self.on_context_thread(), "frame acquired off the render thread");
        let mut guard = self.lock_target();
        if self.is_destroyed() {
            return Ok(None);
        }
        let Some(target) = guard.as_mut() else {
            return Ok(None);
        };

        let (width, height) = self.framebuffer_size();
        if width == 0 || height == 0 {
            return Ok(None);
        }
        if self.resize_pending.swap(false, Ordering::AcqRel) {
            target.resize(width, height);
        }
        target.acquire()
    }

    /// Presents `frame` unless the window was destroyed, in which case the
    /// frame is dropped. Returns whether it was presented. Render thread only.
    pub fn try_swap_buffers(&self, frame: T::Frame) -> bool {
        let mut guard = self.lock_target();
        if self.is_destroyed() {
            log::trace!("swap after destroy ignored");
            return false;
        }
        match guard.as_mut() {
            Some(target) => {
                target.present(frame);
                true
            }
            None => false,
        }
    }

    /// Asks the event loop to shut down. Destroys nothing.
    pub fn request_close(&self) {
        if !self.close_requested.swap(true, Ordering::AcqRel) {
            log::debug!("close requested");
        }
        if let Some(wake) = &self.waker {
            wake();
        }
    }

    /// Sets the destroyed flag without releasing the target.
    ///
    /// The render thread stops at its next check; a frame it still holds is
    /// dropped by `try_swap_buffers` while the surface is alive. Follow with
    /// [`destroy`](Self::destroy) once that thread has been joined.
    pub fn mark_destroyed(&self) {
        {
            let _guard = self.lock_target();
            self.destroyed.store(true, Ordering::Release);
        }
        self.signal_frame();
    }

    /// Marks the window destroyed and releases it. Idempotent.
    pub fn destroy(&self) {
        {
            let mut guard = self.lock_target();
            self.destroyed.store(true, Ordering::Release);
            if let Some(mut target) = guard.take() {
                target.release();
                log::info!("window destroyed");
            }
        }
        self.signal_frame();
    }

    #[inline]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_close_requested(&self) -> bool {
        self.close_requested.load(Ordering::Acquire)
    }

    #[inline]
    pub fn framebuffer_size(&self) -> (u32, u32) {
        unpack(self.framebuffer.load(Ordering::Acquire))
    }

    /// Snapshot of the last known input state.
    pub fn input(&self) -> InputState {
        self.input
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::input::{ButtonState, Key};

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum TargetEvent {
        MakeCurrent,
        Resize(u32, u32),
        Acquire(u32),
        Present(u32),
        Release,
    }

    /// Present target that logs every call and panics on use after release.
    #[derive(Debug, Default, Clone)]
    pub(crate) struct MockTarget {
        log: Arc<Mutex<Vec<TargetEvent>>>,
        released: Arc<AtomicBool>,
        next_frame: u32,
    }

    impl MockTarget {
        pub fn events(&self) -> Vec<TargetEvent> {
            self.log.lock().unwrap().clone()
        }

        pub fn presents(&self) -> usize {
            self.events()
                .iter()
                .filter(|e| matches!(e, TargetEvent::Present(_)))
                .count()
        }

        fn push(&self, e: TargetEvent) {
            assert!(
                !self.released.load(Ordering::SeqCst),
                "{e:?} after release"
            );
            self.log.lock().unwrap().push(e);
        }
    }

    impl PresentTarget for MockTarget {
        type Context = ();
        type Frame = u32;

        fn make_current(&mut self) -> Result<()> {
            self.push(TargetEvent::MakeCurrent);
            Ok(())
        }

        fn resize(&mut self, width: u32, height: u32) {
            self.push(TargetEvent::Resize(width, height));
        }

        fn acquire(&mut self) -> Result<Option<u32>> {
            self.next_frame += 1;
            self.push(TargetEvent::Acquire(self.next_frame));
            Ok(Some(self.next_frame))
        }

        fn present(&mut self, frame: u32) {
            self.push(TargetEvent::Present(frame));
        }

        fn release(&mut self) {
            self.push(TargetEvent::Release);
            self.released.store(true, Ordering::SeqCst);
        }
    }

    pub(crate) fn coordinator() -> (Arc<WindowCoordinator<MockTarget>>, MockTarget) {
        let target = MockTarget::default();
        let coord = Arc::new(WindowCoordinator::new(target.clone(), (640, 480)));
        (coord, target)
    }

    #[test]
    fn context_can_be_made_current_once() {
        let (c, target) = coordinator();
        c.make_current_on_calling_thread().unwrap();
        assert!(matches!(
            c.make_current_on_calling_thread(),
            Err(RenderError::InvalidState(_))
        ));
        assert_eq!(target.events(), vec![TargetEvent::MakeCurrent]);
    }

    #[test]
    fn second_thread_cannot_take_the_context() {
        let (c, _) = coordinator();
        c.make_current_on_calling_thread().unwrap();
        let c2 = Arc::clone(&c);
        let err = thread::spawn(move || c2.make_current_on_calling_thread().is_err())
            .join()
            .unwrap();
        assert!(err);
    }

    #[test]
    fn make_current_after_destroy_fails() {
        let (c, _) = coordinator();
        c.destroy();
        assert!(c.make_current_on_calling_thread().is_err());
    }

    #[test]
    fn swap_presents_until_destroyed() {
        let (c, target) = coordinator();
        c.make_current_on_calling_thread().unwrap();

        let frame = c.acquire_frame().unwrap().unwrap();
        assert!(c.try_swap_buffers(frame));

        c.destroy();
        assert!(c.acquire_frame().unwrap().is_none());
        assert!(!c.try_swap_buffers(99));
        assert_eq!(target.presents(), 1);
        assert_eq!(target.events().last(), Some(&TargetEvent::Release));
    }

    #[test]
    fn frame_held_across_destroy_is_not_presented() {
        let (c, target) = coordinator();
        c.make_current_on_calling_thread().unwrap();
        let frame = c.acquire_frame().unwrap().unwrap();

        c.destroy();
        assert!(!c.try_swap_buffers(frame));
        assert_eq!(target.presents(), 0);
    }

    #[test]
    fn destroy_is_idempotent() {
        let (c, target) = coordinator();
        c.destroy();
        c.destroy();
        assert!(c.is_destroyed());
        let releases = target
            .events()
            .iter()
            .filter(|e| **e == TargetEvent::Release)
            .count();
        assert_eq!(releases, 1);
    }

    #[test]
    fn concurrent_destroy_never_races_a_present() {
        for _ in 0..20 {
            let (c, target) = coordinator();
            let presented = Arc::new(AtomicUsize::new(0));

            let render = {
                let c = Arc::clone(&c);
                let presented = Arc::clone(&presented);
                thread::Builder::new()
                    .name("render".into())
                    .spawn(move || {
                        c.make_current_on_calling_thread().unwrap();
                        while !c.is_destroyed() {
                            if let Some(frame) = c.acquire_frame().unwrap() {
                                if c.try_swap_buffers(frame) {
                                    presented.fetch_add(1, Ordering::Relaxed);
                                }
                            }
                        }
                        // Any late swap must be swallowed.
                        assert!(!c.try_swap_buffers(u32::MAX));
                    })
                    .unwrap()
            };

            thread::sleep(Duration::from_millis(2));
            c.destroy();
            render.join().unwrap();

            let events = target.events();
            let release = events.iter().position(|e| *e == TargetEvent::Release).unwrap();
            assert_eq!(release, events.len() - 1);
            assert_eq!(target.presents(), presented.load(Ordering::Relaxed));
        }
    }

    #[test]
    fn resize_is_applied_on_next_acquire() {
        let (c, target) = coordinator();
        c.make_current_on_calling_thread().unwrap();

        // Dispatch happens on the event thread.
        let c2 = Arc::clone(&c);
        thread::spawn(move || c2.notify_resize(800, 600)).join().unwrap();
        assert_eq!(c.framebuffer_size(), (800, 600));

        c.acquire_frame().unwrap();
        c.acquire_frame().unwrap();
        let resizes: Vec<_> = target
            .events()
            .into_iter()
            .filter(|e| matches!(e, TargetEvent::Resize(..)))
            .collect();
        assert_eq!(resizes, vec![TargetEvent::Resize(800, 600)]);
    }

    #[test]
    fn zero_sized_framebuffer_skips_frames() {
        let (c, target) = coordinator();
        c.make_current_on_calling_thread().unwrap();

        let c2 = Arc::clone(&c);
        thread::spawn(move || c2.notify_resize(0, 0)).join().unwrap();
        assert!(c.acquire_frame().unwrap().is_none());
        assert!(!target.events().iter().any(|e| matches!(e, TargetEvent::Acquire(_) | TargetEvent::Resize(..))));
    }

    #[test]
    fn request_close_sets_flag_and_wakes() {
        let woken = Arc::new(AtomicUsize::new(0));
        let w = Arc::clone(&woken);
        let c = WindowCoordinator::new(MockTarget::default(), (1, 1))
            .with_waker(move || {
                w.fetch_add(1, Ordering::Relaxed);
            });

        assert!(!c.is_close_requested());
        c.request_close();
        assert!(c.is_close_requested());
        assert!(!c.is_destroyed());
        assert_eq!(woken.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn input_snapshot_reflects_dispatched_events() {
        let (c, _) = coordinator();
        c.dispatch_input(&InputEvent::Key {
            key: Key::A,
            state: ButtonState::Pressed,
            repeat: false,
        });
        let snapshot = c.input();
        c.dispatch_input(&InputEvent::Key {
            key: Key::A,
            state: ButtonState::Released,
            repeat: false,
        });

        assert!(snapshot.key_down(Key::A));
        assert!(!c.input().key_down(Key::A));
    }

    #[test]
    fn mark_destroyed_stops_presents_but_keeps_the_target() {
        let (c, target) = coordinator();
        c.make_current_on_calling_thread().unwrap();
        let frame = c.acquire_frame().unwrap().unwrap();

        c.mark_destroyed();
        assert!(c.is_destroyed());
        assert!(c.acquire_frame().unwrap().is_none());
        assert!(!c.try_swap_buffers(frame));
        assert!(!target.events().contains(&TargetEvent::Release));

        c.destroy();
        c.destroy();
        let releases = target
            .events()
            .iter()
            .filter(|e| **e == TargetEvent::Release)
            .count();
        assert_eq!(releases, 1);
    }

    #[test]
    fn wait_for_frame_times_out_without_a_signal() {
        let (c, _) = coordinator();
        let start = std::time::Instant::now();
        c.wait_for_frame(Duration::from_millis(20));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn wait_for_frame_returns_at_once_after_destroy() {
        let (c, _) = coordinator();
        c.mark_destroyed();
        let start = std::time::Instant::now();
        c.wait_for_frame(Duration::from_secs(10));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn resize_wakes_a_waiting_render_thread() {
        let (c, _) = coordinator();
        let done = Arc::new(AtomicBool::new(false));

        let events = {
            let c = Arc::clone(&c);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                while !done.load(Ordering::SeqCst) {
                    c.notify_resize(800, 600);
                    thread::sleep(Duration::from_millis(1));
                }
            })
        };

        let start = std::time::Instant::now();
        c.wait_for_frame(Duration::from_secs(10));
        let elapsed = start.elapsed();
        done.store(true, Ordering::SeqCst);
        events.join().unwrap();

        assert!(elapsed < Duration::from_secs(5));
    }

    #[test]
    fn framebuffer_size_packs_full_range() {
        assert_eq!(unpack(pack(u32::MAX, 7)), (u32::MAX, 7));
    }
}
