//! Skybox & Cubemap Tests
//!
//! Tests for:
//! - Skybox and panorama-baking shaders compile and link
//! - Cube face sampling directions against the panorama mapping
//! - Cubemap-only and 2D-only operations reject the wrong texture kind

use std::path::Path;

use glam::{Mat4, Vec2, Vec3};

use ember::errors::RenderError;
use ember::renderer::pipeline::ShaderLoader;
use ember::renderer::skybox::{
    CubeFace, EQUIRECT_TO_CUBE_SHADER, SKYBOX_FRAGMENT_SHADER, SKYBOX_VERTEX_SHADER, equirect_uv, skybox_ray,
};
use ember::resources::TextureKind;

const EPSILON: f32 = 1e-4;

// ============================================================================
// Shaders
// ============================================================================

#[test]
fn skybox_shaders_compile() {
    ShaderLoader::embedded()
        .load_program(Path::new(SKYBOX_VERTEX_SHADER), Path::new(SKYBOX_FRAGMENT_SHADER), &[])
        .unwrap_or_else(|e| panic!("skybox: {e}"));
}

#[test]
fn panorama_baking_shader_compiles() {
    ShaderLoader::embedded()
        .load_program(Path::new("fullscreen.vert"), Path::new(EQUIRECT_TO_CUBE_SHADER), &[])
        .unwrap_or_else(|e| panic!("equirect_to_cube: {e}"));
}

// ============================================================================
// Face Directions
// ============================================================================

#[test]
fn vertical_faces_sample_the_panorama_poles() {
    let top = equirect_uv(CubeFace::PositiveY.direction(Vec2::splat(0.5)));
    let bottom = equirect_uv(CubeFace::NegativeY.direction(Vec2::splat(0.5)));
    assert!(top.y.abs() < EPSILON);
    assert!((bottom.y - 1.0).abs() < EPSILON);
}

#[test]
fn side_faces_sample_the_horizon_a_quarter_turn_apart() {
    let u_of = |face: CubeFace| equirect_uv(face.direction(Vec2::splat(0.5)));
    let neg_z = u_of(CubeFace::NegativeZ);
    let pos_x = u_of(CubeFace::PositiveX);
    let pos_z = u_of(CubeFace::PositiveZ);

    for uv in [neg_z, pos_x, pos_z] {
        assert!((uv.y - 0.5).abs() < EPSILON);
    }
    assert!((pos_x.x - neg_z.x - 0.25).abs() < EPSILON);
    assert!((pos_z.x - pos_x.x - 0.25).abs() < EPSILON);
}

#[test]
fn upper_texel_rows_look_up_on_side_faces() {
    for face in [CubeFace::PositiveX, CubeFace::NegativeX, CubeFace::PositiveZ, CubeFace::NegativeZ] {
        let upper = face.direction(Vec2::new(0.5, 0.1));
        let lower = face.direction(Vec2::new(0.5, 0.9));
        assert!(upper.y > 0.0 && lower.y < 0.0, "{face:?}");
    }
}

#[test]
fn camera_looking_down_sees_the_bottom_face() {
    let projection = Mat4::perspective_rh(70f32.to_radians(), 1.0, 0.1, 100.0);
    let view = Mat4::look_to_rh(Vec3::new(0.0, 10.0, 0.0), Vec3::NEG_Y, Vec3::Z);
    let ray = skybox_ray((projection * view).inverse(), Vec2::ZERO);
    assert_eq!(CubeFace::from_direction(ray), CubeFace::NegativeY);
}

// ============================================================================
// Texture Kinds
// ============================================================================

#[test]
fn skybox_needs_a_cube_texture() {
    let err = TextureKind::D2.require_cubemap("use a texture as a cubemap").unwrap_err();
    assert!(matches!(err, RenderError::NotACubemap { .. }));
    assert!(err.to_string().contains("not a cubemap"));
}

#[test]
fn panorama_must_not_be_a_cube_texture() {
    let err = TextureKind::Cube
        .require_2d("convert a panorama into a cubemap")
        .unwrap_err();
    assert!(matches!(err, RenderError::IsACubemap { .. }));
    assert!(TextureKind::D2.require_2d("convert a panorama into a cubemap").is_ok());
}
