use glam::Mat4;

/// Perspective camera payload.
///
/// The projection is cached until a projection parameter changes. The view
/// matrix (inverse of the owning node's global matrix) is cached until the
/// tree reports a transform invalidation on the node or one of its ancestors.
#[derive(Debug, Clone)]
pub struct Camera {
    // === 投影属性 ===
    fov: f32,
    aspect: f32,
    near: f32,
    far: f32,

    // 缓存的矩阵
    projection_matrix: Mat4,
    projection_valid: bool,
    pub(crate) view_matrix: Mat4,
    pub(crate) view_valid: bool,
}

impl Camera {
    pub const DEFAULT_FOV_DEGREES: f32 = 90.0;
    pub const DEFAULT_ASPECT: f32 = 1920.0 / 1080.0;

    /// `fov` is the vertical field of view in degrees.
    #[must_use]
    pub fn new_perspective(fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            fov: fov.to_radians(),
            aspect,
            near,
            far,
            projection_matrix: Mat4::IDENTITY,
            projection_valid: false,
            view_matrix: Mat4::IDENTITY,
            view_valid: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn fov(&self) -> f32 {
        self.fov
    }

    #[inline]
    #[must_use]
    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    /// Sets the vertical field of view in degrees.
    pub fn set_fov(&mut self, fov_degrees: f32) {
        self.fov = fov_degrees.to_radians();
        self.projection_valid = false;
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
        self.projection_valid = false;
    }

    pub fn set_clip_planes(&mut self, near: f32, far: f32) {
        self.near = near;
        self.far = far;
        self.projection_valid = false;
    }

    pub fn projection_matrix(&mut self) -> Mat4 {
        if !self.projection_valid {
            // glam 的 perspective_rh 默认是为了 WGPU/Vulkan 设计的 (0 to 1)
            self.projection_matrix = Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far);
            self.projection_valid = true;
        }
        self.projection_matrix
    }

    #[inline]
    pub(crate) fn invalidate_view(&mut self) {
        self.view_valid = false;
    }

    #[inline]
    #[must_use]
    pub fn is_view_cached(&self) -> bool {
        self.view_valid
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new_perspective(Self::DEFAULT_FOV_DEGREES, Self::DEFAULT_ASPECT, 0.1, 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projection_recomputed_after_aspect_change() {
        let mut cam = Camera::default();
        let a = cam.projection_matrix();
        cam.set_aspect(1.0);
        let b = cam.projection_matrix();
        assert_ne!(a, b);
        // x scale equals y scale for a square aspect
        assert!((b.x_axis.x - b.y_axis.y).abs() < 1e-6);
    }

    #[test]
    fn default_fov_is_ninety_degrees() {
        let mut cam = Camera::default();
        let proj = cam.projection_matrix();
        // cot(45°) == 1
        assert!((proj.y_axis.y - 1.0).abs() < 1e-5);
    }
}
