//! Shading variant keys
//!
//! A variant is fully described by the material's capability flags plus the
//! number of active point and spot lights. Each flag becomes one `#define`
//! of the same name when the variant is compiled.

use bitflags::bitflags;
use glam::Vec4;

use crate::resources::Material;
use crate::scene::LightContext;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
    pub struct VariantFlags: u32 {
        const USING_BASE_COLOR_TEXTURE   = 1 << 0;
        const USING_BASE_COLOR_FACTOR    = 1 << 1;
        const USING_VERTEX_NORMALS       = 1 << 2;
        const USING_NORMAL_TEXTURE       = 1 << 3;
        const USING_NORMAL_MAP_SCALE     = 1 << 4;
        const USING_UV                   = 1 << 5;
        const USING_GENERAL_UV_TRANSFORM = 1 << 6;
        const USING_BASE_UV_TRANSFORM    = 1 << 7;
        const USING_NORMAL_UV_TRANSFORM  = 1 << 8;
    }
}

impl VariantFlags {
    /// Flags that make the variant sample a texture.
    pub const SAMPLES_TEXTURE: Self =
        Self::USING_BASE_COLOR_TEXTURE.union(Self::USING_NORMAL_TEXTURE);

    /// The `#define` names for every set flag, in bit order.
    pub fn define_names(self) -> impl Iterator<Item = &'static str> {
        self.iter_names().map(|(name, _)| name)
    }
}

/// Lightweight lookup key of a shading variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct VariantKey {
    pub flags: VariantFlags,
    pub point_lights: u32,
    pub spot_lights: u32,
}

impl VariantKey {
    #[must_use]
    pub fn new(flags: VariantFlags, point_lights: u32, spot_lights: u32) -> Self {
        Self {
            flags,
            point_lights,
            spot_lights,
        }
    }

    /// Every define the variant compiles with: one per flag, then the two
    /// light counts.
    #[must_use]
    pub fn defines(&self) -> Vec<String> {
        let mut defines: Vec<String> = self.flags.define_names().map(str::to_owned).collect();
        defines.push(format!("POINT_LIGHTS_COUNT {}", self.point_lights));
        defines.push(format!("SPOT_LIGHTS_COUNT {}", self.spot_lights));
        defines
    }
}

/// Derives the capability flags of `material` under `lights`.
///
/// Evaluation order: texture presence, then UV output, then UV transform.
#[must_use]
pub fn flags_for(material: &Material, lights: &LightContext) -> VariantFlags {
    let mut flags = VariantFlags::empty();

    if material.base_color.texture.is_some() {
        flags |= VariantFlags::USING_BASE_COLOR_TEXTURE;
    }
    if material.base_color.factor != Vec4::ONE {
        flags |= VariantFlags::USING_BASE_COLOR_FACTOR;
    }
    if lights.any_active() {
        flags |= VariantFlags::USING_VERTEX_NORMALS;
        if let Some(normal_map) = &material.normal_map {
            flags |= VariantFlags::USING_NORMAL_TEXTURE;
            if normal_map.scale != 1.0 {
                flags |= VariantFlags::USING_NORMAL_MAP_SCALE;
            }
        }
    }

    if flags.intersects(VariantFlags::SAMPLES_TEXTURE) {
        flags |= VariantFlags::USING_UV;
    }

    if material.has_uv_transforms() {
        if material.has_identical_uv_transforms() {
            flags |= VariantFlags::USING_GENERAL_UV_TRANSFORM;
        } else {
            flags |= VariantFlags::USING_BASE_UV_TRANSFORM | VariantFlags::USING_NORMAL_UV_TRANSFORM;
        }
    }

    flags
}

#[must_use]
pub fn key_for(material: &Material, lights: &LightContext) -> VariantKey {
    VariantKey::new(flags_for(material, lights), lights.point_count(), lights.spot_count())
}
