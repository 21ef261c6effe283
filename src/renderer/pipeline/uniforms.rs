//! Per-variant uniform table
//!
//! Uniform "locations" are byte offsets inside the variant's uniform block,
//! resolved once at compile time. A member that the variant's defines
//! compiled out resolves to [`UniformSlot::ABSENT`]; writes to it are
//! silently skipped.

use bytemuck::Pod;
use glam::{Mat4, Vec2, Vec4};

use crate::renderer::draw_order::PassKind;
use crate::renderer::pipeline::reflect::UniformReflection;
use crate::renderer::pipeline::variant_key::VariantKey;
use crate::resources::Material;
use crate::scene::{LightContext, LightSample};

/// Ambient term uploaded to every variant.
pub const AMBIENT: Vec4 = Vec4::new(0.2, 0.2, 0.2, 1.0);

/// Byte offset of a uniform member, or absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UniformSlot(Option<u32>);

impl UniformSlot {
    pub const ABSENT: Self = Self(None);

    #[inline]
    #[must_use]
    pub fn at(offset: u32) -> Self {
        Self(Some(offset))
    }

    #[inline]
    #[must_use]
    pub fn is_present(self) -> bool {
        self.0.is_some()
    }

    #[inline]
    #[must_use]
    pub fn offset(self) -> Option<u32> {
        self.0
    }

    fn resolve(reflection: &UniformReflection, path: &str) -> Self {
        Self(reflection.member(path).map(|m| m.offset))
    }
}

/// CPU copy of one draw's uniform block.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformBlock {
    data: Vec<u8>,
}

impl UniformBlock {
    #[must_use]
    pub fn zeroed(size: u32) -> Self {
        Self {
            data: vec![0; size as usize],
        }
    }

    /// Writes `value` at `slot`. Absent slots and out-of-range writes are skipped.
    pub fn write<T: Pod>(&mut self, slot: UniformSlot, value: &T) {
        let Some(offset) = slot.offset() else {
            return;
        };
        let bytes = bytemuck::bytes_of(value);
        let start = offset as usize;
        if let Some(dst) = self.data.get_mut(start..start + bytes.len()) {
            dst.copy_from_slice(bytes);
        }
    }

    /// Reads a value back from `slot`, if present and in range.
    #[must_use]
    pub fn read<T: Pod>(&self, slot: UniformSlot) -> Option<T> {
        let start = slot.offset()? as usize;
        let bytes = self.data.get(start..start + std::mem::size_of::<T>())?;
        Some(bytemuck::pod_read_unaligned(bytes))
    }

    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Position and color slots of one light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LightSlots {
    pub position: UniformSlot,
    pub color: UniformSlot,
}

impl LightSlots {
    fn resolve(reflection: &UniformReflection, array: &str, index: u32) -> Self {
        Self {
            position: UniformSlot::resolve(reflection, &format!("{array}[{index}].position")),
            color: UniformSlot::resolve(reflection, &format!("{array}[{index}].color")),
        }
    }
}

/// Resolved uniform locations of one shading variant.
#[derive(Debug, Clone, Default)]
pub struct VariantUniforms {
    pub block_size: u32,

    pub mvp: UniformSlot,
    pub model_matrix: UniformSlot,
    pub normal_matrix: UniformSlot,
    pub ambient: UniformSlot,
    pub base_color_factor: UniformSlot,
    pub normal_map_scale: UniformSlot,

    pub uv_offset: UniformSlot,
    pub uv_scale: UniformSlot,
    pub base_uv_offset: UniformSlot,
    pub base_uv_scale: UniformSlot,
    pub normal_uv_offset: UniformSlot,
    pub normal_uv_scale: UniformSlot,

    pub point_lights: Vec<LightSlots>,
    pub spot_lights: Vec<LightSlots>,
}

impl VariantUniforms {
    /// Resolves every location the variant can use, light slots up to the key's counts.
    #[must_use]
    pub fn resolve(reflection: &UniformReflection, key: &VariantKey) -> Self {
        let slot = |name: &str| UniformSlot::resolve(reflection, name);
        Self {
            block_size: reflection.size(),

            mvp: slot("MVP"),
            model_matrix: slot("MODEL_MATRIX"),
            normal_matrix: slot("NORMAL_MATRIX"),
            ambient: slot("AMBIENT"),
            base_color_factor: slot("BASE_COLOR_FACTOR"),
            normal_map_scale: slot("NORMAL_MAP_SCALE"),

            uv_offset: slot("UV_OFFSET"),
            uv_scale: slot("UV_SCALE"),
            base_uv_offset: slot("BASE_UV_OFFSET"),
            base_uv_scale: slot("BASE_UV_SCALE"),
            normal_uv_offset: slot("NORMAL_UV_OFFSET"),
            normal_uv_scale: slot("NORMAL_UV_SCALE"),

            point_lights: (0..key.point_lights)
                .map(|i| LightSlots::resolve(reflection, "POINT_LIGHTS", i))
                .collect(),
            spot_lights: (0..key.spot_lights)
                .map(|i| LightSlots::resolve(reflection, "SPOT_LIGHTS", i))
                .collect(),
        }
    }

    /// Fills `block` for one draw.
    ///
    /// Overlay draws use the lights' camera-relative positions, since their
    /// model matrices are already expressed relative to the view.
    pub fn apply(
        &self,
        block: &mut UniformBlock,
        material: &Material,
        lights: &LightContext,
        pass: PassKind,
        mvp: &Mat4,
        model: &Mat4,
    ) {
        block.write(self.mvp, mvp);
        block.write(self.model_matrix, model);
        if self.normal_matrix.is_present() {
            block.write(self.normal_matrix, &model.inverse().transpose());
        }
        block.write(self.ambient, &AMBIENT);
        block.write(self.base_color_factor, &material.base_color.factor);
        if let Some(normal_map) = &material.normal_map {
            block.write(self.normal_map_scale, &normal_map.scale);
        }

        if self.uv_offset.is_present() || self.uv_scale.is_present() {
            let (offset, scale) = material.general_uv_offset_and_scale();
            write_uv(block, self.uv_offset, self.uv_scale, offset, scale);
        }
        if let Some(slot) = &material.base_color.texture {
            write_uv(block, self.base_uv_offset, self.base_uv_scale, slot.uv_offset, slot.uv_scale);
        }
        if let Some(normal_map) = &material.normal_map {
            let slot = &normal_map.texture;
            write_uv(block, self.normal_uv_offset, self.normal_uv_scale, slot.uv_offset, slot.uv_scale);
        }

        write_lights(block, &self.point_lights, &lights.point_lights, pass);
        write_lights(block, &self.spot_lights, &lights.spot_lights, pass);
    }
}

fn write_uv(block: &mut UniformBlock, offset_slot: UniformSlot, scale_slot: UniformSlot, offset: Vec2, scale: Vec2) {
    block.write(offset_slot, &offset);
    block.write(scale_slot, &scale);
}

fn write_lights(block: &mut UniformBlock, slots: &[LightSlots], lights: &[LightSample], pass: PassKind) {
    for (slot, light) in slots.iter().zip(lights) {
        let position = match pass {
            PassKind::Scene => light.position,
            PassKind::Overlay => light.overlay_position,
        };
        block.write(slot.position, &position.extend(1.0));
        block.write(slot.color, &light.color.extend(1.0));
    }
}
