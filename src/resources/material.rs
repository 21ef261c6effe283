use glam::{Vec2, Vec4};

use crate::resources::texture::TextureHandle;

/// A texture reference plus the UV transform applied when sampling it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureSlot {
    pub texture: TextureHandle,
    pub uv_offset: Vec2,
    pub uv_scale: Vec2,
}

impl TextureSlot {
    #[must_use]
    pub fn new(texture: TextureHandle) -> Self {
        Self {
            texture,
            uv_offset: Vec2::ZERO,
            uv_scale: Vec2::ONE,
        }
    }

    #[must_use]
    pub fn with_uv_transform(mut self, offset: Vec2, scale: Vec2) -> Self {
        self.uv_offset = offset;
        self.uv_scale = scale;
        self
    }

    /// True when the slot applies a non-identity offset or scale.
    #[inline]
    #[must_use]
    pub fn has_uv_transform(&self) -> bool {
        self.uv_offset != Vec2::ZERO || self.uv_scale != Vec2::ONE
    }

    #[inline]
    #[must_use]
    pub fn uv_offset_and_scale(&self) -> (Vec2, Vec2) {
        (self.uv_offset, self.uv_scale)
    }
}

#[derive(Debug, Clone)]
pub struct BaseColor {
    pub texture: Option<TextureSlot>,
    pub factor: Vec4,
}

impl Default for BaseColor {
    fn default() -> Self {
        Self {
            texture: None,
            factor: Vec4::ONE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NormalMap {
    pub texture: TextureSlot,
    pub scale: f32,
}

/// Material descriptor consumed by the shading variants.
#[derive(Debug, Clone, Default)]
pub struct Material {
    pub base_color: BaseColor,
    pub normal_map: Option<NormalMap>,
}

impl Material {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_base_color_texture(mut self, slot: TextureSlot) -> Self {
        self.base_color.texture = Some(slot);
        self
    }

    #[must_use]
    pub fn with_base_color_factor(mut self, factor: Vec4) -> Self {
        self.base_color.factor = factor;
        self
    }

    #[must_use]
    pub fn with_normal_map(mut self, slot: TextureSlot, scale: f32) -> Self {
        self.normal_map = Some(NormalMap { texture: slot, scale });
        self
    }

    fn texture_slots(&self) -> impl Iterator<Item = &TextureSlot> {
        self.base_color
            .texture
            .iter()
            .chain(self.normal_map.as_ref().map(|n| &n.texture))
    }

    /// True when any present texture slot carries a non-identity UV transform.
    #[must_use]
    pub fn has_uv_transforms(&self) -> bool {
        self.texture_slots().any(TextureSlot::has_uv_transform)
    }

    /// True when every present texture slot uses the same UV transform, so a
    /// single shared transform can be applied in the vertex stage.
    #[must_use]
    pub fn has_identical_uv_transforms(&self) -> bool {
        let mut slots = self.texture_slots();
        let Some(first) = slots.next() else {
            return true;
        };
        let reference = first.uv_offset_and_scale();
        slots.all(|slot| slot.uv_offset_and_scale() == reference)
    }

    /// The shared UV transform: the first present slot's, or identity.
    #[must_use]
    pub fn general_uv_offset_and_scale(&self) -> (Vec2, Vec2) {
        self.texture_slots()
            .next()
            .map_or((Vec2::ZERO, Vec2::ONE), TextureSlot::uv_offset_and_scale)
    }
}
