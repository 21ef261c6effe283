use glam::{Mat4, Quat, Vec3};

/// Transform component
///
/// Holds a node's local translation, rotation and scale (TRS) together with a
/// lazily rebuilt local matrix. The cached matrix is valid iff `dirty` is
/// clear.
///
/// Setters only touch this transform. Propagating invalidation to
/// descendants is the job of [`SceneTree`](super::SceneTree), which owns the
/// hierarchy.
#[derive(Debug, Clone)]
pub struct Transform {
    translation: Vec3,
    rotation: Quat,
    scale: Vec3,

    local_matrix: Mat4,
    dirty: bool,
}

impl Transform {
    #[must_use]
    pub fn new() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            local_matrix: Mat4::IDENTITY,
            dirty: true,
        }
    }

    #[must_use]
    pub fn from_trs(translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            translation,
            rotation,
            scale,
            local_matrix: Mat4::IDENTITY,
            dirty: true,
        }
    }

    #[inline]
    #[must_use]
    pub fn translation(&self) -> Vec3 {
        self.translation
    }

    #[inline]
    #[must_use]
    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    #[inline]
    #[must_use]
    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    #[inline]
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn set_translation(&mut self, translation: Vec3) {
        self.translation = translation;
        self.dirty = true;
    }

    pub(crate) fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
        self.dirty = true;
    }

    /// Rotations are renormalized so the cached matrix never picks up skew.
    pub(crate) fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation.normalize();
        self.dirty = true;
    }

    /// Marks the cached matrix stale without changing any parameter.
    #[inline]
    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Returns the local matrix `T · R · S`, rebuilding it first if stale.
    pub fn local_matrix(&mut self) -> Mat4 {
        if self.dirty {
            self.local_matrix =
                Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation);
            self.dirty = false;
        }
        self.local_matrix
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}
