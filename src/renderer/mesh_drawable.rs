//! Mesh Drawable
//!
//! The stock [`Drawable`]: one mesh, one material, placed by a scene node.
//! Each draw re-derives the variant key from the material and the frame's
//! lights, so adding a light or a texture moves it to another program and the
//! registry re-sorts it for the next frame.

use std::sync::Arc;

use crate::errors::Result;
use crate::renderer::draw_list::{DrawCommand, FrameRecorder};
use crate::renderer::draw_order::{Drawable, FrameContext};
use crate::renderer::pipeline::{ProgramId, key_for};
use crate::resources::{Material, Mesh};
use crate::scene::NodeHandle;

pub struct MeshDrawable {
    mesh: Arc<Mesh>,
    material: Material,
    node: NodeHandle,
    program: ProgramId,
    bind_group: Option<wgpu::BindGroup>,
}

impl MeshDrawable {
    #[must_use]
    pub fn new(mesh: Arc<Mesh>, material: Material, node: NodeHandle) -> Self {
        Self {
            mesh,
            material,
            node,
            program: ProgramId::UNRESOLVED,
            bind_group: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn material(&self) -> &Material {
        &self.material
    }

    /// Replaces the material. Its textures are rebound on the next draw.
    pub fn set_material(&mut self, material: Material) {
        self.material = material;
        self.bind_group = None;
    }

    #[inline]
    #[must_use]
    pub fn node(&self) -> NodeHandle {
        self.node
    }
}

impl Drawable<FrameRecorder> for MeshDrawable {
    fn program_id(&self) -> ProgramId {
        self.program
    }

    fn draw(&mut self, recorder: &mut FrameRecorder, frame: &mut FrameContext<'_>) -> Result<()> {
        let model = frame.scene.global_matrix(self.node)?;
        let mvp = frame.view_proj * model;

        let key = key_for(&self.material, frame.lights);
        let variant = recorder.variants.get_or_compile(&key)?;
        self.program = variant.id();
        let uniform_offset = variant.use_program(&self.material, frame.lights, frame.pass, &mvp, &model);

        let material = match &self.bind_group {
            Some(bind_group) => bind_group.clone(),
            None => {
                let bind_group = recorder
                    .materials
                    .bind_group(&recorder.device, &recorder.textures, &self.material)?;
                self.bind_group = Some(bind_group.clone());
                bind_group
            }
        };

        recorder.push(DrawCommand {
            program: self.program,
            uniform_offset,
            material,
            mesh: Arc::clone(&self.mesh),
        });
        Ok(())
    }
}
