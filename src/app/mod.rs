//! Frame Driver
//!
//! Window creation and event polling belong to the host; this module only
//! drives the single-threaded loop around it:
//!
//! ```text
//! poll host ─▶ resize? ─▶ tick timer ─▶ update callback ─▶ render ─▶ present
//! ```
//!
//! The loop stops as soon as the host reports termination.

use glam::UVec2;

use crate::errors::Result;
use crate::renderer::Renderer;
use crate::scene::{NodeHandle, SceneTree};
use crate::utils::Timer;

/// The window/context provider.
pub trait SurfaceHost {
    /// Current drawable size in pixels.
    fn drawable_size(&self) -> UVec2;

    /// Pumps pending events. Returns `true` once the host wants to close.
    fn should_close(&mut self) -> bool;
}

/// Whatever turns a scene into a presented frame.
pub trait FrameTarget {
    /// Returns `Ok(false)` when the frame was skipped.
    fn render_frame(&mut self, scene: &mut SceneTree, camera: NodeHandle, dt: f32) -> Result<bool>;

    fn resize(&mut self, size: UVec2) -> Result<()>;
}

impl FrameTarget for Renderer {
    fn render_frame(&mut self, scene: &mut SceneTree, camera: NodeHandle, dt: f32) -> Result<bool> {
        Renderer::render_frame(self, scene, camera, dt)
    }

    fn resize(&mut self, size: UVec2) -> Result<()> {
        Renderer::resize(self, size)
    }
}

/// Per-frame callback: may mutate the tree and the target's registrations.
/// Receives the frame delta and total elapsed time in seconds.
pub type UpdateFn<T> = Box<dyn FnMut(&mut SceneTree, &mut T, f32, f32)>;

pub struct FrameDriver<H, T> {
    host: H,
    target: T,
    timer: Timer,
    size: UVec2,
    update_fn: Option<UpdateFn<T>>,
    presented: u64,
}

impl<H: SurfaceHost, T: FrameTarget> FrameDriver<H, T> {
    pub fn new(host: H, target: T) -> Self {
        let size = host.drawable_size();
        Self {
            host,
            target,
            timer: Timer::new(),
            size,
            update_fn: None,
            presented: 0,
        }
    }

    pub fn with_update<F>(mut self, f: F) -> Self
    where
        F: FnMut(&mut SceneTree, &mut T, f32, f32) + 'static,
    {
        self.update_fn = Some(Box::new(f));
        self
    }

    /// Runs one iteration. Returns `false` once the host asked to close,
    /// in which case nothing was rendered.
    pub fn step(&mut self, scene: &mut SceneTree, camera: NodeHandle) -> Result<bool> {
        if self.host.should_close() {
            return Ok(false);
        }

        let size = self.host.drawable_size();
        if size != self.size {
            self.target.resize(size)?;
            self.size = size;
        }

        let dt = self.timer.tick();
        if let Some(update) = &mut self.update_fn {
            update(scene, &mut self.target, dt, self.timer.elapsed_seconds());
        }

        if self.target.render_frame(scene, camera, dt)? {
            self.presented += 1;
        }
        Ok(true)
    }

    /// Runs until the host asks to close or a frame fails.
    pub fn run(&mut self, scene: &mut SceneTree, camera: NodeHandle) -> Result<()> {
        log::info!("Frame loop started at {}x{}", self.size.x, self.size.y);
        loop {
            match self.step(scene, camera) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    log::error!("Frame {} failed: {e}", self.timer.frame_count);
                    return Err(e);
                }
            }
        }
        log::info!(
            "Frame loop finished after {} frames ({} presented)",
            self.timer.frame_count,
            self.presented
        );
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn presented_frames(&self) -> u64 {
        self.presented
    }

    #[inline]
    #[must_use]
    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    #[inline]
    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    #[inline]
    #[must_use]
    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn into_parts(self) -> (H, T) {
        (self.host, self.target)
    }
}
