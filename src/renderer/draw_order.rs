//! Draw-Order Registry
//!
//! Holds every registered drawable in one of two sequences, scene and
//! overlay, each kept non-decreasing by the program the drawable resolved to.
//! Walking a sequence in that order means consecutive draws share a program
//! and pipeline switches happen once per variant instead of once per draw.
//!
//! The registry only orders and dispatches: drawables resolve their own
//! shading variant and record their own commands through the recorder `R`.
//! Keeping the recorder generic lets the ordering logic run without a GPU.
//!
//! ```text
//! draw_frame
//!   ├─ Scene pass    clear color + depth, view_proj = proj · view
//!   └─ Overlay pass  clear depth only,    view_proj = proj
//! ```

use glam::Mat4;

use crate::errors::Result;
use crate::renderer::pipeline::ProgramId;
use crate::scene::{LightContext, SceneTree};

/// Which of the two frame passes a draw belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    Scene,
    Overlay,
}

/// Receives pass boundaries. Drawables record into the same recorder.
pub trait PassRecorder {
    /// Starts a new pass. Every draw recorded until the next call belongs to it.
    fn begin_pass(&mut self, pass: PassKind);
}

/// Per-pass state handed to each drawable.
pub struct FrameContext<'a> {
    pub scene: &'a mut SceneTree,
    pub view_proj: Mat4,
    pub lights: &'a LightContext,
    pub pass: PassKind,
}

/// Something the registry can order and draw.
pub trait Drawable<R> {
    /// Program this drawable currently resolves to. Unresolved drawables
    /// report [`ProgramId::UNRESOLVED`] and sort first.
    fn program_id(&self) -> ProgramId;

    fn draw(&mut self, recorder: &mut R, frame: &mut FrameContext<'_>) -> Result<()>;
}

/// Handle returned by [`DrawOrderRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DrawableId(u64);

struct Entry<R> {
    id: DrawableId,
    program: ProgramId,
    drawable: Box<dyn Drawable<R>>,
}

pub struct DrawOrderRegistry<R> {
    scene: Vec<Entry<R>>,
    overlay: Vec<Entry<R>>,
    next_id: u64,
}

impl<R> Default for DrawOrderRegistry<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> DrawOrderRegistry<R> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            scene: Vec::new(),
            overlay: Vec::new(),
            next_id: 0,
        }
    }

    /// Inserts `drawable` after every entry whose program is less than or
    /// equal to its current one, so ties keep registration order.
    pub fn register(&mut self, drawable: Box<dyn Drawable<R>>, overlay: bool) -> DrawableId {
        let id = DrawableId(self.next_id);
        self.next_id += 1;

        let program = drawable.program_id();
        let sequence = if overlay { &mut self.overlay } else { &mut self.scene };
        let index = sequence.partition_point(|entry| entry.program <= program);
        sequence.insert(index, Entry { id, program, drawable });
        id
    }

    /// Removes the entry from whichever sequence holds it. Unknown ids are a no-op.
    pub fn unregister(&mut self, id: DrawableId) -> Option<Box<dyn Drawable<R>>> {
        for sequence in [&mut self.scene, &mut self.overlay] {
            if let Some(index) = sequence.iter().position(|entry| entry.id == id) {
                return Some(sequence.remove(index).drawable);
            }
        }
        None
    }

    #[must_use]
    pub fn contains(&self, id: DrawableId) -> bool {
        self.scene.iter().chain(&self.overlay).any(|entry| entry.id == id)
    }

    /// `Some(true)` if `id` is in the overlay sequence, `None` if unknown.
    #[must_use]
    pub fn is_overlay(&self, id: DrawableId) -> Option<bool> {
        if self.scene.iter().any(|entry| entry.id == id) {
            Some(false)
        } else if self.overlay.iter().any(|entry| entry.id == id) {
            Some(true)
        } else {
            None
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.scene.len() + self.overlay.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scene.is_empty() && self.overlay.is_empty()
    }

    /// Program ids of one sequence, in draw order.
    #[must_use]
    pub fn program_order(&self, overlay: bool) -> Vec<ProgramId> {
        let sequence = if overlay { &self.overlay } else { &self.scene };
        sequence.iter().map(|entry| entry.program).collect()
    }

    /// Drawable ids of one sequence, in draw order.
    #[must_use]
    pub fn draw_order(&self, overlay: bool) -> Vec<DrawableId> {
        let sequence = if overlay { &self.overlay } else { &self.scene };
        sequence.iter().map(|entry| entry.id).collect()
    }
}

impl<R: PassRecorder> DrawOrderRegistry<R> {
    /// Records both passes of one frame.
    ///
    /// Fills each light's overlay position from `view` before anything is
    /// drawn. The first failing draw aborts the frame; the sequences are
    /// re-sorted either way.
    pub fn draw_frame(
        &mut self,
        recorder: &mut R,
        scene: &mut SceneTree,
        view: Mat4,
        proj: Mat4,
        lights: &mut LightContext,
    ) -> Result<()> {
        lights.update_overlay_positions(&view);
        let lights = &*lights;

        recorder.begin_pass(PassKind::Scene);
        let mut frame = FrameContext {
            scene: &mut *scene,
            view_proj: proj * view,
            lights,
            pass: PassKind::Scene,
        };
        draw_sequence(&mut self.scene, recorder, &mut frame)?;

        recorder.begin_pass(PassKind::Overlay);
        let mut frame = FrameContext {
            scene,
            view_proj: proj,
            lights,
            pass: PassKind::Overlay,
        };
        draw_sequence(&mut self.overlay, recorder, &mut frame)
    }
}

fn draw_sequence<R>(sequence: &mut Vec<Entry<R>>, recorder: &mut R, frame: &mut FrameContext<'_>) -> Result<()> {
    let mut result = Ok(());
    let mut reordered = false;

    for entry in sequence.iter_mut() {
        result = entry.drawable.draw(recorder, frame);

        let program = entry.drawable.program_id();
        if program != entry.program {
            entry.program = program;
            reordered = true;
        }
        if result.is_err() {
            break;
        }
    }

    if reordered {
        // Stable: entries sharing a program keep their relative order.
        sequence.sort_by_key(|entry| entry.program);
    }
    result
}
