//! Post-process & Frame Loop Tests
//!
//! Tests for:
//! - Mip chain level counts and sizes
//! - Exposure adaptation toward the key value
//! - Bloom stage counts and blur steps
//! - Composite binding defines, settings parsing and validation
//! - Post shaders compile through the loader
//! - Frame driver: resize forwarding, skipped frames, termination

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use glam::{UVec2, Vec2, Vec3};

use ember::errors::{RenderError, Result};
use ember::renderer::pipeline::ShaderLoader;
use ember::renderer::post::bloom::{blur_step, stage_count};
use ember::renderer::post::composite::binding_defines;
use ember::renderer::post::{
    AutoExposure, CompositeParams, is_readable_format, luminance, mip_level_count, mip_sizes,
};
use ember::renderer::{PostProcessSettings, RendererSettings};
use ember::scene::{NodeHandle, SceneTree};
use ember::{FrameDriver, FrameTarget, Node, NodeKind, SurfaceHost};

const EPSILON: f32 = 1e-5;

// ============================================================================
// Mip Chain
// ============================================================================

#[test]
fn square_power_of_two_chain() {
    assert_eq!(mip_level_count(UVec2::new(1024, 1024)), 11);
    let sizes = mip_sizes(UVec2::new(1024, 1024));
    assert_eq!(sizes[1], UVec2::new(512, 512));
    assert_eq!(*sizes.last().unwrap(), UVec2::ONE);
}

#[test]
fn non_square_chain_halves_each_axis_down_to_one() {
    let sizes = mip_sizes(UVec2::new(300, 200));
    assert_eq!(sizes.len(), 9);
    assert_eq!(
        &sizes[..4],
        &[
            UVec2::new(300, 200),
            UVec2::new(150, 100),
            UVec2::new(75, 50),
            UVec2::new(37, 25),
        ]
    );
    assert_eq!(sizes[8], UVec2::ONE);
}

#[test]
fn single_pixel_has_one_level() {
    assert_eq!(mip_level_count(UVec2::ONE), 1);
    assert_eq!(mip_sizes(UVec2::ONE), vec![UVec2::ONE]);
}

// ============================================================================
// Exposure
// ============================================================================

#[test]
fn target_maps_average_to_key_value() {
    let exposure = AutoExposure::default();
    let grey = Vec3::splat(0.5);
    assert!((exposure.target(grey) * luminance(grey) - 0.18).abs() < EPSILON);
}

#[test]
fn black_frame_is_clamped_by_min_luminance() {
    let exposure = AutoExposure::default();
    assert!((exposure.target(Vec3::ZERO) - 0.18 / 1e-4).abs() < 1e-2);
}

#[test]
fn exposure_converges_exponentially() {
    let mut exposure = AutoExposure::default();
    let average = Vec3::splat(0.36);
    let target = exposure.target(average);
    let initial_error = (exposure.exposure() - target).abs();

    let dt = 1.0 / 60.0;
    for _ in 0..120 {
        exposure.update(average, dt);
    }
    let expected = initial_error * (-120.0 * dt * 0.75_f32).exp();
    let error = (exposure.exposure() - target).abs();
    assert!((error - expected).abs() < 1e-3, "error {error}, expected {expected}");
}

/// Steps a fresh exposure toward `average` and checks every frame closes
/// the gap without crossing the target.
fn assert_monotonic_approach(average: Vec3) {
    let mut exposure = AutoExposure::default();
    let target = exposure.target(average);
    let rising = exposure.exposure() < target;
    let mut error = (exposure.exposure() - target).abs();

    for frame in 0..600 {
        let value = exposure.update(average, 1.0 / 60.0);
        let next = (value - target).abs();
        assert!(next < error, "frame {frame}: error grew from {error} to {next}");
        if rising {
            assert!(value <= target, "frame {frame}: overshot {target} with {value}");
        } else {
            assert!(value >= target, "frame {frame}: undershot {target} with {value}");
        }
        error = next;
    }
}

#[test]
fn exposure_rises_monotonically_toward_a_higher_target() {
    // Dim frame: target 0.18 / 0.09 = 2.0, above the initial 1.0.
    assert!(AutoExposure::default().target(Vec3::splat(0.09)) > 1.0);
    assert_monotonic_approach(Vec3::splat(0.09));
}

#[test]
fn exposure_falls_monotonically_toward_a_lower_target() {
    // Bright frame: target 0.18 / 0.72 = 0.25, below the initial 1.0.
    assert!(AutoExposure::default().target(Vec3::splat(0.72)) < 1.0);
    assert_monotonic_approach(Vec3::splat(0.72));
}

#[test]
fn zero_dt_keeps_exposure() {
    let mut exposure = AutoExposure::default();
    exposure.update(Vec3::splat(10.0), 0.0);
    assert_eq!(exposure.exposure(), 1.0);
}

// ============================================================================
// Bloom
// ============================================================================

#[test]
fn stages_are_capped_by_available_levels() {
    assert_eq!(stage_count(4, 11), 4);
    assert_eq!(stage_count(4, 3), 2);
    assert_eq!(stage_count(4, 1), 0);
    assert_eq!(stage_count(0, 11), 0);
}

#[test]
fn blur_step_doubles_per_level() {
    let size = UVec2::new(64, 64);
    assert_eq!(blur_step(0.01, 1, size, false), Vec2::new(0.01, 0.0));
    assert_eq!(blur_step(0.01, 2, size, false), Vec2::new(0.02, 0.0));
    assert_eq!(blur_step(0.01, 3, size, false), Vec2::new(0.04, 0.0));
}

#[test]
fn vertical_step_is_aspect_corrected() {
    let step = blur_step(0.01, 1, UVec2::new(200, 100), true);
    assert_eq!(step.x, 0.0);
    assert!((step.y - 0.02).abs() < EPSILON);
}

// ============================================================================
// Composite & Settings
// ============================================================================

#[test]
fn composite_defines_follow_settings() {
    let settings = PostProcessSettings {
        main_image_binding: 2,
        bloom_image_binding: 0,
        ..Default::default()
    };
    assert_eq!(
        binding_defines(&settings),
        ["MAIN_IMAGE_BINDING 2", "BLOOM_IMAGE_BINDING 0"]
    );
}

#[test]
fn composite_params_are_one_vec4() {
    assert_eq!(std::mem::size_of::<CompositeParams>(), 16);
    let params = CompositeParams::new(0.5, 2.0);
    assert_eq!(params.exposure, 0.5);
    assert_eq!(params.bloom_strength, 2.0);
}

#[test]
fn settings_parse_partial_json() {
    let settings = RendererSettings::from_json(
        r#"{ "vsync": false, "post": { "bloom_enabled": false, "bloom_strength": 0.5 } }"#,
    )
    .unwrap();
    assert!(!settings.vsync);
    assert!(!settings.post.bloom_enabled);
    assert_eq!(settings.post.bloom_strength, 0.5);
    assert_eq!(settings.post.bloom_image_stages, 4);
    assert_eq!(settings.hdr_format, wgpu::TextureFormat::Rgba16Float);
}

#[test]
fn shared_image_binding_is_rejected() {
    let err = RendererSettings::from_json(
        r#"{ "post": { "main_image_binding": 1, "bloom_image_binding": 1 } }"#,
    )
    .unwrap_err();
    assert!(matches!(err, RenderError::InvalidSettings(_)));
}

#[test]
fn hdr_format_must_be_readable_for_exposure() {
    assert!(is_readable_format(wgpu::TextureFormat::Rgba16Float));
    assert!(!is_readable_format(wgpu::TextureFormat::Rg11b10Ufloat));

    let settings = RendererSettings {
        hdr_format: wgpu::TextureFormat::Rg11b10Ufloat,
        ..Default::default()
    };
    assert!(matches!(settings.validate(), Err(RenderError::InvalidSettings(_))));
    assert!(RendererSettings::default().validate().is_ok());
}

#[test]
fn non_positive_min_luminance_is_rejected() {
    let settings = PostProcessSettings {
        min_luminance: 0.0,
        ..Default::default()
    };
    assert!(settings.validate().is_err());
}

// ============================================================================
// Post Shaders
// ============================================================================

fn compiles(fragment: &str, defines: &[String]) {
    ShaderLoader::embedded()
        .load_program(Path::new("fullscreen.vert"), Path::new(fragment), defines)
        .unwrap_or_else(|e| panic!("{fragment}: {e}"));
}

#[test]
fn post_shaders_compile() {
    compiles("downsample.frag", &[]);
    compiles("blur.frag", &[]);
    compiles("bloom_combine.frag", &[]);
    compiles("composite.frag", &binding_defines(&PostProcessSettings::default()));
}

#[test]
fn composite_compiles_with_swapped_bindings() {
    let settings = PostProcessSettings {
        main_image_binding: 1,
        bloom_image_binding: 0,
        ..Default::default()
    };
    compiles("composite.frag", &binding_defines(&settings));
}

// ============================================================================
// Frame Driver
// ============================================================================

struct ScriptedHost {
    sizes: Vec<UVec2>,
    polls: usize,
}

impl SurfaceHost for ScriptedHost {
    fn drawable_size(&self) -> UVec2 {
        let index = self.polls.min(self.sizes.len() - 1);
        self.sizes[index]
    }

    fn should_close(&mut self) -> bool {
        self.polls += 1;
        self.polls > self.sizes.len()
    }
}

#[derive(Default)]
struct Log {
    resizes: Vec<UVec2>,
    frames: u32,
}

struct FakeTarget {
    log: Rc<RefCell<Log>>,
    skip_every_other: bool,
    fail_on: Option<u32>,
}

impl FrameTarget for FakeTarget {
    fn render_frame(&mut self, _: &mut SceneTree, _: NodeHandle, _: f32) -> Result<bool> {
        let mut log = self.log.borrow_mut();
        log.frames += 1;
        if self.fail_on == Some(log.frames) {
            return Err(RenderError::NodeNotFound("camera".to_string()));
        }
        Ok(!(self.skip_every_other && log.frames % 2 == 0))
    }

    fn resize(&mut self, size: UVec2) -> Result<()> {
        self.log.borrow_mut().resizes.push(size);
        Ok(())
    }
}

fn scene() -> (SceneTree, NodeHandle) {
    let mut tree = SceneTree::new();
    let camera = tree.add_root(Node::new(NodeKind::Camera(ember::Camera::default())));
    (tree, camera)
}

fn target(log: &Rc<RefCell<Log>>) -> FakeTarget {
    FakeTarget {
        log: Rc::clone(log),
        skip_every_other: false,
        fail_on: None,
    }
}

#[test]
fn driver_forwards_size_changes_once() {
    let log = Rc::new(RefCell::new(Log::default()));
    let host = ScriptedHost {
        sizes: vec![UVec2::new(800, 600), UVec2::new(800, 600), UVec2::new(1024, 768)],
        polls: 0,
    };
    let (mut tree, camera) = scene();
    let mut driver = FrameDriver::new(host, target(&log));
    driver.run(&mut tree, camera).unwrap();

    let log = log.borrow();
    assert_eq!(log.frames, 3);
    assert_eq!(log.resizes, vec![UVec2::new(1024, 768)]);
    assert_eq!(driver.presented_frames(), 3);
}

#[test]
fn skipped_frames_are_not_counted_as_presented() {
    let log = Rc::new(RefCell::new(Log::default()));
    let host = ScriptedHost {
        sizes: vec![UVec2::new(64, 64); 4],
        polls: 0,
    };
    let (mut tree, camera) = scene();
    let mut target = target(&log);
    target.skip_every_other = true;

    let mut driver = FrameDriver::new(host, target);
    driver.run(&mut tree, camera).unwrap();
    assert_eq!(log.borrow().frames, 4);
    assert_eq!(driver.presented_frames(), 2);
}

#[test]
fn update_runs_before_each_render() {
    let log = Rc::new(RefCell::new(Log::default()));
    let host = ScriptedHost {
        sizes: vec![UVec2::new(64, 64); 3],
        polls: 0,
    };
    let (mut tree, camera) = scene();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let seen_in_update = Rc::clone(&seen);

    let mut driver = FrameDriver::new(host, target(&log)).with_update(move |tree, target, _dt, _t| {
        // The target has not rendered this frame yet.
        seen_in_update.borrow_mut().push(target.log.borrow().frames);
        tree.translate(camera, Vec3::Z).unwrap();
    });
    driver.run(&mut tree, camera).unwrap();

    assert_eq!(*seen.borrow(), vec![0, 1, 2]);
    let z = tree.get(camera).unwrap().transform().translation().z;
    assert!((z - 3.0).abs() < EPSILON);
}

#[test]
fn failing_frame_stops_the_loop() {
    let log = Rc::new(RefCell::new(Log::default()));
    let host = ScriptedHost {
        sizes: vec![UVec2::new(64, 64); 5],
        polls: 0,
    };
    let (mut tree, camera) = scene();
    let mut target = target(&log);
    target.fail_on = Some(2);

    let mut driver = FrameDriver::new(host, target);
    assert!(driver.run(&mut tree, camera).is_err());
    assert_eq!(log.borrow().frames, 2);
    assert_eq!(driver.presented_frames(), 1);
}

#[test]
fn closed_host_renders_nothing() {
    let log = Rc::new(RefCell::new(Log::default()));
    let host = ScriptedHost {
        sizes: vec![UVec2::new(64, 64)],
        polls: 1,
    };
    let (mut tree, camera) = scene();
    let mut driver = FrameDriver::new(host, target(&log));
    assert!(!driver.step(&mut tree, camera).unwrap());
    assert_eq!(log.borrow().frames, 0);
}
