//! Shader Variant Cache Tests
//!
//! Tests for:
//! - Flag derivation from material + lights
//! - Cache uniqueness and id assignment
//! - Uniform location resolution against the real GLSL sources
//! - Uploads: absent uniforms skipped, lights in context order
//! - Read / compile / link failures are reported and never cached

use std::path::{Path, PathBuf};

use glam::{Mat4, Vec2, Vec3, Vec4};

use ember::errors::{RenderError, Result};
use ember::renderer::PassKind;
use ember::renderer::pipeline::{
    AMBIENT, CompiledProgram, ProgramFactory, ShaderLoader, ShaderStage, ShaderVariantCache, UniformBlock,
    VariantFlags, VariantKey, VariantProgram, VariantUniforms, flags_for, key_for,
};
use ember::resources::{Material, TextureHandle, TextureSlot};
use ember::scene::{LightContext, LightSample};

const EPSILON: f32 = 1e-5;

// ============================================================================
// Fake backend
// ============================================================================

#[derive(Default)]
struct RecordingProgram {
    uploads: Vec<UniformBlock>,
}

impl VariantProgram for RecordingProgram {
    fn upload(&mut self, block: &UniformBlock) -> u32 {
        self.uploads.push(block.clone());
        (self.uploads.len() as u32 - 1) * 256
    }
}

#[derive(Default)]
struct CountingFactory {
    builds: usize,
}

impl ProgramFactory for CountingFactory {
    type Program = RecordingProgram;

    fn build(&mut self, _: &VariantKey, _: &CompiledProgram, _: &VariantUniforms) -> Result<RecordingProgram> {
        self.builds += 1;
        Ok(RecordingProgram::default())
    }
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn cache() -> ShaderVariantCache<CountingFactory> {
    init_logging();
    ShaderVariantCache::new(ShaderLoader::embedded(), CountingFactory::default())
}

fn lights(points: usize, spots: usize) -> LightContext {
    let mut context = LightContext::new();
    for i in 0..points {
        context
            .point_lights
            .push(LightSample::new(Vec3::new(i as f32, 1.0, 0.0), Vec3::new(1.0, 0.5, 0.25)));
    }
    for i in 0..spots {
        context
            .spot_lights
            .push(LightSample::new(Vec3::new(0.0, 0.0, i as f32), Vec3::ONE));
    }
    context
}

fn slot() -> TextureSlot {
    TextureSlot::new(TextureHandle::default())
}

// ============================================================================
// Flag derivation
// ============================================================================

#[test]
fn base_color_texture_implies_uv() {
    let material = Material::new().with_base_color_texture(slot());
    let flags = flags_for(&material, &LightContext::new());
    assert_eq!(flags, VariantFlags::USING_BASE_COLOR_TEXTURE | VariantFlags::USING_UV);
}

#[test]
fn factor_flag_only_when_not_white() {
    let white = Material::new().with_base_color_factor(Vec4::ONE);
    assert!(flags_for(&white, &LightContext::new()).is_empty());

    let tinted = Material::new().with_base_color_factor(Vec4::new(1.0, 0.0, 0.0, 1.0));
    assert_eq!(flags_for(&tinted, &LightContext::new()), VariantFlags::USING_BASE_COLOR_FACTOR);
}

#[test]
fn normal_map_needs_lights() {
    let material = Material::new().with_normal_map(slot(), 0.5);
    assert!(flags_for(&material, &LightContext::new()).is_empty());

    let lit = flags_for(&material, &lights(1, 0));
    assert_eq!(
        lit,
        VariantFlags::USING_VERTEX_NORMALS
            | VariantFlags::USING_NORMAL_TEXTURE
            | VariantFlags::USING_NORMAL_MAP_SCALE
            | VariantFlags::USING_UV
    );
}

#[test]
fn unit_normal_scale_has_no_scale_flag() {
    let material = Material::new().with_normal_map(slot(), 1.0);
    let flags = flags_for(&material, &lights(0, 1));
    assert!(flags.contains(VariantFlags::USING_NORMAL_TEXTURE));
    assert!(!flags.contains(VariantFlags::USING_NORMAL_MAP_SCALE));
}

#[test]
fn identical_uv_transforms_use_general_flag() {
    let transformed = slot().with_uv_transform(Vec2::new(0.5, 0.0), Vec2::splat(2.0));
    let material = Material::new()
        .with_base_color_texture(transformed)
        .with_normal_map(transformed, 1.0);
    let flags = flags_for(&material, &lights(1, 0));
    assert!(flags.contains(VariantFlags::USING_GENERAL_UV_TRANSFORM));
    assert!(!flags.intersects(VariantFlags::USING_BASE_UV_TRANSFORM | VariantFlags::USING_NORMAL_UV_TRANSFORM));
}

#[test]
fn different_uv_transforms_split() {
    let material = Material::new()
        .with_base_color_texture(slot().with_uv_transform(Vec2::ZERO, Vec2::splat(2.0)))
        .with_normal_map(slot(), 1.0);
    let flags = flags_for(&material, &lights(1, 0));
    assert!(flags.contains(VariantFlags::USING_BASE_UV_TRANSFORM | VariantFlags::USING_NORMAL_UV_TRANSFORM));
    assert!(!flags.contains(VariantFlags::USING_GENERAL_UV_TRANSFORM));
}

#[test]
fn key_carries_light_counts() {
    let key = key_for(&Material::new(), &lights(3, 2));
    assert_eq!(key, VariantKey::new(VariantFlags::USING_VERTEX_NORMALS, 3, 2));
}

// ============================================================================
// Cache uniqueness
// ============================================================================

#[test]
fn same_key_compiles_once() {
    let mut cache = cache();
    let key = VariantKey::new(VariantFlags::USING_BASE_COLOR_FACTOR, 0, 0);

    let first = cache.get_or_compile(&key).unwrap().id();
    let second = cache.get_or_compile(&key).unwrap().id();
    assert_eq!(first, second);
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.factory().builds, 1);
}

#[test]
fn distinct_keys_get_distinct_ids() {
    let mut cache = cache();
    let a = cache.get_or_compile(&VariantKey::default()).unwrap().id();
    let b = cache
        .get_or_compile(&VariantKey::new(VariantFlags::empty(), 1, 0))
        .unwrap()
        .id();
    let c = cache
        .get_or_compile(&VariantKey::new(VariantFlags::empty(), 0, 1))
        .unwrap()
        .id();

    assert_eq!(a.raw(), 1);
    assert_eq!(b.raw(), 2);
    assert_eq!(c.raw(), 3);
    assert!(cache.get(b).is_some());
    assert!(cache.contains(&VariantKey::new(VariantFlags::empty(), 0, 1)));
    assert_eq!(cache.factory().builds, 3);
}

#[test]
fn every_feature_combination_compiles() {
    let mut cache = cache();
    let all = VariantFlags::all() - VariantFlags::USING_GENERAL_UV_TRANSFORM;
    let keys = [
        VariantKey::new(VariantFlags::empty(), 0, 0),
        VariantKey::new(VariantFlags::USING_BASE_COLOR_TEXTURE | VariantFlags::USING_UV, 0, 0),
        VariantKey::new(all, 2, 2),
        VariantKey::new(
            VariantFlags::USING_BASE_COLOR_TEXTURE
                | VariantFlags::USING_UV
                | VariantFlags::USING_GENERAL_UV_TRANSFORM
                | VariantFlags::USING_VERTEX_NORMALS,
            1,
            0,
        ),
    ];
    for key in &keys {
        cache.get_or_compile(key).unwrap();
    }
    assert_eq!(cache.len(), keys.len());
}

// ============================================================================
// Uniform locations & uploads
// ============================================================================

#[test]
fn compiled_out_members_are_absent() {
    let mut cache = cache();
    let variant = cache.get_or_compile(&VariantKey::default()).unwrap();
    let uniforms = variant.uniforms();

    assert!(uniforms.mvp.is_present());
    assert!(uniforms.model_matrix.is_present());
    assert!(uniforms.ambient.is_present());
    assert!(!uniforms.normal_matrix.is_present());
    assert!(!uniforms.base_color_factor.is_present());
    assert!(!uniforms.uv_offset.is_present());
    assert!(uniforms.point_lights.is_empty());
}

#[test]
fn light_slots_resolved_up_to_counts() {
    let mut cache = cache();
    let key = VariantKey::new(VariantFlags::USING_VERTEX_NORMALS, 2, 1);
    let variant = cache.get_or_compile(&key).unwrap();
    let uniforms = variant.uniforms();

    assert_eq!(uniforms.point_lights.len(), 2);
    assert_eq!(uniforms.spot_lights.len(), 1);
    assert!(uniforms.point_lights.iter().all(|s| s.position.is_present() && s.color.is_present()));
    assert!(uniforms.normal_matrix.is_present());

    let first = uniforms.point_lights[0].position.offset().unwrap();
    let second = uniforms.point_lights[1].position.offset().unwrap();
    assert!(second > first);
}

#[test]
fn use_program_uploads_matrices_ambient_and_lights() {
    let mut cache = cache();
    let context = lights(2, 0);
    let material = Material::new().with_base_color_factor(Vec4::new(0.5, 0.5, 1.0, 1.0));
    let key = key_for(&material, &context);

    let model = Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0));
    let mvp = Mat4::from_translation(Vec3::Z) * model;

    let variant = cache.get_or_compile(&key).unwrap();
    let offset = variant.use_program(&material, &context, PassKind::Scene, &mvp, &model);
    assert_eq!(offset, 0);

    let uniforms = variant.uniforms().clone();
    let block = &variant.program().uploads[0];
    assert_eq!(block.len(), uniforms.block_size as usize);
    assert_eq!(block.read::<Mat4>(uniforms.mvp), Some(mvp));
    assert_eq!(block.read::<Mat4>(uniforms.model_matrix), Some(model));
    assert_eq!(block.read::<Vec4>(uniforms.ambient), Some(AMBIENT));
    assert_eq!(
        block.read::<Vec4>(uniforms.base_color_factor),
        Some(Vec4::new(0.5, 0.5, 1.0, 1.0))
    );

    let normal = block.read::<Mat4>(uniforms.normal_matrix).unwrap();
    assert!(normal.abs_diff_eq(model.inverse().transpose(), EPSILON));

    for (i, slots) in uniforms.point_lights.iter().enumerate() {
        let position = block.read::<Vec4>(slots.position).unwrap();
        assert_eq!(position, context.point_lights[i].position.extend(1.0));
        let color = block.read::<Vec4>(slots.color).unwrap();
        assert_eq!(color.truncate(), context.point_lights[i].color);
    }
}

#[test]
fn overlay_pass_uploads_camera_relative_lights() {
    let mut cache = cache();
    let mut context = lights(1, 0);
    context.update_overlay_positions(&Mat4::from_translation(Vec3::new(0.0, 0.0, -10.0)));
    let material = Material::new();
    let key = key_for(&material, &context);

    let variant = cache.get_or_compile(&key).unwrap();
    variant.use_program(&material, &context, PassKind::Overlay, &Mat4::IDENTITY, &Mat4::IDENTITY);

    let slot = variant.uniforms().point_lights[0].position;
    let position = variant.program().uploads[0].read::<Vec4>(slot).unwrap();
    assert_eq!(position.truncate(), context.point_lights[0].overlay_position);
    assert!((position.z - -10.0).abs() < EPSILON);
}

// ============================================================================
// Failures
// ============================================================================

const MIN_VERT: &str = "#version 450\nlayout(location = 0) in vec3 a_position;\nvoid main() {\n    gl_Position = vec4(a_position, 1.0);\n}\n";
const MIN_FRAG: &str = "#version 450\nlayout(location = 0) out vec4 out_color;\nvoid main() {\n    out_color = vec4(1.0);\n}\n";

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("ember-{name}-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn write(dir: &Path, file: &str, source: &str) {
    std::fs::write(dir.join(file), source).unwrap();
}

fn cache_for(dir: PathBuf, vertex: &str, fragment: &str) -> ShaderVariantCache<CountingFactory> {
    init_logging();
    ShaderVariantCache::with_sources(
        ShaderLoader::new(Some(dir)),
        CountingFactory::default(),
        PathBuf::from(vertex),
        PathBuf::from(fragment),
    )
}

#[test]
fn minimal_sources_from_shader_root_compile() -> anyhow::Result<()> {
    let dir = scratch_dir("minimal");
    std::fs::write(dir.join("min.vert"), MIN_VERT)?;
    std::fs::write(dir.join("min.frag"), MIN_FRAG)?;

    let mut cache = cache_for(dir, "min.vert", "min.frag");
    let variant = cache.get_or_compile(&VariantKey::default())?;
    // No uniform block: every slot is absent and uploads are empty blocks.
    assert_eq!(variant.uniforms().block_size, 0);
    assert!(!variant.uniforms().mvp.is_present());
    Ok(())
}

#[test]
fn compile_error_reports_path_and_is_not_cached() {
    let dir = scratch_dir("compile");
    write(&dir, "min.vert", MIN_VERT);
    write(&dir, "broken.frag", "#version 450\nlayout(location = 0) out vec4 out_color;\nvoid main() {\n    out_color = undefined_function();\n}\n");

    let mut cache = cache_for(dir, "min.vert", "broken.frag");
    for _ in 0..2 {
        let err = cache.get_or_compile(&VariantKey::default()).err().unwrap();
        match err {
            RenderError::ShaderCompile { stage, path, log } => {
                assert_eq!(stage, "fragment");
                assert_eq!(path, Path::new("broken.frag"));
                assert!(!log.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
    }
    assert!(cache.is_empty());
    assert_eq!(cache.factory().builds, 0);
}

#[test]
fn missing_version_is_fatal() {
    let dir = scratch_dir("version");
    write(&dir, "noversion.vert", "void main() { gl_Position = vec4(0.0); }\n");
    write(&dir, "min.frag", MIN_FRAG);

    let mut cache = cache_for(dir, "noversion.vert", "min.frag");
    let err = cache.get_or_compile(&VariantKey::default()).err().unwrap();
    assert!(matches!(err, RenderError::MissingVersionDirective { .. }));
    assert!(err.to_string().contains("noversion.vert"));
}

#[test]
fn missing_version_is_fatal_without_defines() {
    let dir = scratch_dir("version-plain");
    write(&dir, "noversion.frag", "layout(location = 0) out vec4 c;\nvoid main() {\n    c = vec4(1.0);\n}\n");

    let loader = ShaderLoader::new(Some(dir));
    let err = loader
        .compile_stage(ShaderStage::Fragment, Path::new("noversion.frag"), &[])
        .err()
        .unwrap();
    assert!(matches!(err, RenderError::MissingVersionDirective { ref path } if path == Path::new("noversion.frag")));
}

#[test]
fn unlinked_fragment_input_is_a_link_error() {
    let dir = scratch_dir("link");
    write(&dir, "min.vert", MIN_VERT);
    write(
        &dir,
        "needs_input.frag",
        "#version 450\nlayout(location = 3) in vec2 v_extra;\nlayout(location = 0) out vec4 out_color;\nvoid main() {\n    out_color = vec4(v_extra, 0.0, 1.0);\n}\n",
    );

    let mut cache = cache_for(dir, "min.vert", "needs_input.frag");
    let err = cache.get_or_compile(&VariantKey::default()).err().unwrap();
    match err {
        RenderError::ProgramLink { vertex_path, fragment_path, log } => {
            assert_eq!(vertex_path, Path::new("min.vert"));
            assert_eq!(fragment_path, Path::new("needs_input.frag"));
            assert!(log.contains('3'));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(cache.is_empty());
}

#[test]
fn missing_source_is_a_read_error() {
    let mut cache = ShaderVariantCache::with_sources(
        ShaderLoader::embedded(),
        CountingFactory::default(),
        PathBuf::from("nope.vert"),
        PathBuf::from("textured.frag"),
    );
    let err = cache.get_or_compile(&VariantKey::default()).err().unwrap();
    assert!(matches!(err, RenderError::ShaderRead { .. }));
}
