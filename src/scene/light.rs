use glam::{Mat4, Vec3};

#[derive(Debug, Clone)]
pub struct PointLight {
    pub color: Vec3,
}

#[derive(Debug, Clone)]
pub struct SpotLight {
    pub color: Vec3,
}

impl PointLight {
    #[must_use]
    pub fn new(color: Vec3) -> Self {
        Self { color }
    }
}

impl SpotLight {
    #[must_use]
    pub fn new(color: Vec3) -> Self {
        Self { color }
    }
}

/// One active light as seen by a draw call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSample {
    /// World-space position (translation of the light node's global matrix).
    pub position: Vec3,
    pub color: Vec3,
    /// Position relative to the camera, used by overlay draws whose
    /// view-projection omits the view matrix.
    pub overlay_position: Vec3,
}

impl LightSample {
    #[must_use]
    pub fn new(position: Vec3, color: Vec3) -> Self {
        Self {
            position,
            color,
            overlay_position: position,
        }
    }
}

/// Ordered collections of the active lights for one frame.
///
/// Order follows a depth-first walk of the scene tree and is the order in
/// which light slots are filled in shader uniforms.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LightContext {
    pub point_lights: Vec<LightSample>,
    pub spot_lights: Vec<LightSample>,
}

impl LightContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn point_count(&self) -> u32 {
        self.point_lights.len() as u32
    }

    #[inline]
    #[must_use]
    pub fn spot_count(&self) -> u32 {
        self.spot_lights.len() as u32
    }

    /// True when at least one light of any kind is active.
    #[inline]
    #[must_use]
    pub fn any_active(&self) -> bool {
        !self.point_lights.is_empty() || !self.spot_lights.is_empty()
    }

    /// Precomputes every light's camera-relative position for this frame.
    pub fn update_overlay_positions(&mut self, view: &Mat4) {
        for light in self.point_lights.iter_mut().chain(self.spot_lights.iter_mut()) {
            light.overlay_position = view.transform_point3(light.position);
        }
    }
}
