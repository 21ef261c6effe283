//! Draw-Order Registry Tests
//!
//! Tests for:
//! - Sequences stay sorted by program id across register / unregister
//! - Scene pass before overlay pass, with the right view-projection
//! - Overlay light positions precomputed from the view matrix
//! - Stable re-sort after a drawable changes program

use std::cell::RefCell;
use std::rc::Rc;

use glam::{Mat4, Vec3};

use ember::errors::{RenderError, Result};
use ember::renderer::{DrawOrderRegistry, Drawable, FrameContext, PassKind, PassRecorder};
use ember::renderer::pipeline::ProgramId;
use ember::scene::{LightContext, LightSample, SceneTree};

const EPSILON: f32 = 1e-5;

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Begin(PassKind),
    Draw { name: &'static str, program: u32, pass: PassKind, view_proj: Mat4 },
}

#[derive(Default)]
struct Recorder {
    events: Vec<Event>,
}

impl PassRecorder for Recorder {
    fn begin_pass(&mut self, pass: PassKind) {
        self.events.push(Event::Begin(pass));
    }
}

impl Recorder {
    fn drawn(&self) -> Vec<&'static str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Draw { name, .. } => Some(*name),
                Event::Begin(_) => None,
            })
            .collect()
    }
}

/// Drawable whose program id can be changed from the test after registration.
struct Probe {
    name: &'static str,
    program: Rc<RefCell<u32>>,
    next_program: Option<u32>,
    fail: bool,
}

impl Probe {
    fn boxed(name: &'static str, program: u32) -> Box<dyn Drawable<Recorder>> {
        Box::new(Self {
            name,
            program: Rc::new(RefCell::new(program)),
            next_program: None,
            fail: false,
        })
    }
}

impl Drawable<Recorder> for Probe {
    fn program_id(&self) -> ProgramId {
        ProgramId::new(*self.program.borrow())
    }

    fn draw(&mut self, recorder: &mut Recorder, frame: &mut FrameContext<'_>) -> Result<()> {
        if self.fail {
            return Err(RenderError::NodeNotFound(self.name.to_string()));
        }
        recorder.events.push(Event::Draw {
            name: self.name,
            program: *self.program.borrow(),
            pass: frame.pass,
            view_proj: frame.view_proj,
        });
        if let Some(next) = self.next_program.take() {
            *self.program.borrow_mut() = next;
        }
        Ok(())
    }
}

fn ids(values: &[u32]) -> Vec<ProgramId> {
    values.iter().map(|&v| ProgramId::new(v)).collect()
}

fn draw(registry: &mut DrawOrderRegistry<Recorder>, view: Mat4, proj: Mat4, lights: &mut LightContext) -> Recorder {
    let mut recorder = Recorder::default();
    let mut scene = SceneTree::new();
    registry
        .draw_frame(&mut recorder, &mut scene, view, proj, lights)
        .unwrap();
    recorder
}

// ============================================================================
// Ordering
// ============================================================================

#[test]
fn register_then_unregister_keeps_order() {
    let mut registry = DrawOrderRegistry::<Recorder>::new();
    let five = registry.register(Probe::boxed("five", 5), false);
    registry.register(Probe::boxed("two", 2), false);
    assert_eq!(registry.program_order(false), ids(&[2, 5]));

    assert!(registry.unregister(five).is_some());
    assert_eq!(registry.program_order(false), ids(&[2]));

    let recorder = draw(&mut registry, Mat4::IDENTITY, Mat4::IDENTITY, &mut LightContext::new());
    assert_eq!(recorder.drawn(), vec!["two"]);
}

#[test]
fn sequences_are_independent() {
    let mut registry = DrawOrderRegistry::<Recorder>::new();
    let hud = registry.register(Probe::boxed("hud", 1), true);
    let world = registry.register(Probe::boxed("world", 3), false);

    assert_eq!(registry.program_order(false), ids(&[3]));
    assert_eq!(registry.program_order(true), ids(&[1]));
    assert_eq!(registry.is_overlay(hud), Some(true));
    assert_eq!(registry.is_overlay(world), Some(false));
    assert_eq!(registry.len(), 2);
}

#[test]
fn unregister_unknown_is_noop() {
    let mut registry = DrawOrderRegistry::<Recorder>::new();
    let id = registry.register(Probe::boxed("a", 1), false);
    registry.unregister(id);
    assert!(registry.unregister(id).is_none());
    assert!(!registry.contains(id));
    assert!(registry.is_empty());
}

#[test]
fn unresolved_drawables_sort_first() {
    let mut registry = DrawOrderRegistry::<Recorder>::new();
    registry.register(Probe::boxed("resolved", 4), false);
    registry.register(Probe::boxed("fresh", ProgramId::UNRESOLVED.raw()), false);
    assert_eq!(registry.program_order(false), ids(&[0, 4]));
}

// ============================================================================
// Frame Passes
// ============================================================================

#[test]
fn scene_then_overlay_with_their_view_projections() {
    let mut registry = DrawOrderRegistry::<Recorder>::new();
    registry.register(Probe::boxed("hud", 1), true);
    registry.register(Probe::boxed("world", 2), false);

    let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -3.0));
    let proj = Mat4::perspective_rh(1.0, 1.5, 0.1, 100.0);
    let recorder = draw(&mut registry, view, proj, &mut LightContext::new());

    assert_eq!(
        recorder.events,
        vec![
            Event::Begin(PassKind::Scene),
            Event::Draw { name: "world", program: 2, pass: PassKind::Scene, view_proj: proj * view },
            Event::Begin(PassKind::Overlay),
            Event::Draw { name: "hud", program: 1, pass: PassKind::Overlay, view_proj: proj },
        ]
    );
}

#[test]
fn overlay_light_positions_follow_the_view() {
    let mut registry = DrawOrderRegistry::<Recorder>::new();
    let mut lights = LightContext::new();
    lights.point_lights.push(LightSample::new(Vec3::new(1.0, 2.0, 3.0), Vec3::ONE));

    let view = Mat4::from_translation(Vec3::new(-1.0, 0.0, -5.0));
    draw(&mut registry, view, Mat4::IDENTITY, &mut lights);

    let overlay = lights.point_lights[0].overlay_position;
    assert!((overlay - Vec3::new(0.0, 2.0, -2.0)).abs().max_element() < EPSILON);
    assert_eq!(lights.point_lights[0].position, Vec3::new(1.0, 2.0, 3.0));
}

// ============================================================================
// Re-sorting
// ============================================================================

#[test]
fn program_change_resorts_for_next_frame() {
    let mut registry = DrawOrderRegistry::<Recorder>::new();
    registry.register(Probe::boxed("a", 1), false);
    registry.register(
        Box::new(Probe {
            name: "b",
            program: Rc::new(RefCell::new(2)),
            next_program: Some(7),
            fail: false,
        }),
        false,
    );
    registry.register(Probe::boxed("c", 3), false);

    let first = draw(&mut registry, Mat4::IDENTITY, Mat4::IDENTITY, &mut LightContext::new());
    assert_eq!(first.drawn(), vec!["a", "b", "c"]);
    assert_eq!(registry.program_order(false), ids(&[1, 3, 7]));

    let second = draw(&mut registry, Mat4::IDENTITY, Mat4::IDENTITY, &mut LightContext::new());
    assert_eq!(second.drawn(), vec!["a", "c", "b"]);
}

#[test]
fn resort_is_stable_for_equal_programs() {
    let mut registry = DrawOrderRegistry::<Recorder>::new();
    registry.register(Probe::boxed("x", 4), false);
    registry.register(
        Box::new(Probe {
            name: "mover",
            program: Rc::new(RefCell::new(5)),
            next_program: Some(1),
            fail: false,
        }),
        false,
    );
    registry.register(Probe::boxed("y", 4), false);

    draw(&mut registry, Mat4::IDENTITY, Mat4::IDENTITY, &mut LightContext::new());
    let second = draw(&mut registry, Mat4::IDENTITY, Mat4::IDENTITY, &mut LightContext::new());
    assert_eq!(second.drawn(), vec!["mover", "x", "y"]);
}

#[test]
fn failing_draw_aborts_the_frame() {
    let mut registry = DrawOrderRegistry::<Recorder>::new();
    registry.register(
        Box::new(Probe {
            name: "broken",
            program: Rc::new(RefCell::new(1)),
            next_program: None,
            fail: true,
        }),
        false,
    );
    registry.register(Probe::boxed("hud", 1), true);

    let mut recorder = Recorder::default();
    let mut scene = SceneTree::new();
    let result = registry.draw_frame(
        &mut recorder,
        &mut scene,
        Mat4::IDENTITY,
        Mat4::IDENTITY,
        &mut LightContext::new(),
    );
    assert!(result.is_err());
    assert_eq!(recorder.events, vec![Event::Begin(PassKind::Scene)]);
}
