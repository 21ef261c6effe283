//! Frame Recorder
//!
//! Prepare/execute split for the registry's two passes. During
//! [`DrawOrderRegistry::draw_frame`](crate::renderer::draw_order::DrawOrderRegistry::draw_frame)
//! drawables push [`DrawCommand`]s and per-draw uniform blocks; [`FrameRecorder::execute`]
//! then uploads every variant's uniform arena once and replays the commands
//! into one `wgpu::RenderPass` per recorded pass. Fullscreen background draws
//! ([`BackgroundCommand`]) replay in recording order next to mesh draws.
//!
//! | Pass    | Color     | Depth |
//! |---------|-----------|-------|
//! | Scene   | Clear     | Clear |
//! | Overlay | Load      | Clear |

use std::sync::Arc;

use crate::renderer::draw_order::{PassKind, PassRecorder};
use crate::renderer::pipeline::gpu_program::{GpuProgramFactory, MaterialBindings};
use crate::renderer::pipeline::{ProgramId, ShaderLoader, ShaderVariantCache};
use crate::resources::{Mesh, TextureStore};

/// One indexed draw, ready to replay.
#[derive(Debug, Clone)]
pub struct DrawCommand {
    pub program: ProgramId,
    pub uniform_offset: u32,
    pub material: wgpu::BindGroup,
    pub mesh: Arc<Mesh>,
}

/// One fullscreen triangle with its own pipeline, e.g. a skybox.
///
/// `uniform_data` is written into `uniform_buffer` before the passes are encoded.
#[derive(Debug, Clone)]
pub struct BackgroundCommand {
    pub pipeline: wgpu::RenderPipeline,
    pub bind_group: wgpu::BindGroup,
    pub uniform_buffer: wgpu::Buffer,
    pub uniform_data: Vec<u8>,
}

#[derive(Debug)]
enum PassItem {
    Mesh(DrawCommand),
    Background(BackgroundCommand),
}

#[derive(Debug)]
struct RecordedPass {
    kind: PassKind,
    commands: Vec<PassItem>,
}

/// Color and depth attachments the recorded passes render into.
pub struct PassTargets<'a> {
    pub color: &'a wgpu::TextureView,
    pub depth: &'a wgpu::TextureView,
    pub clear_color: wgpu::Color,
}

pub struct FrameRecorder {
    pub(crate) device: wgpu::Device,
    pub(crate) variants: ShaderVariantCache<GpuProgramFactory>,
    pub(crate) materials: MaterialBindings,
    pub(crate) textures: TextureStore,
    passes: Vec<RecordedPass>,
}

impl FrameRecorder {
    #[must_use]
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        loader: ShaderLoader,
        color_format: wgpu::TextureFormat,
        depth_format: wgpu::TextureFormat,
    ) -> Self {
        let materials = MaterialBindings::new(device, queue);
        let factory = GpuProgramFactory::new(
            device.clone(),
            materials.layout().clone(),
            color_format,
            depth_format,
        );
        Self {
            device: device.clone(),
            variants: ShaderVariantCache::new(loader, factory),
            materials,
            textures: TextureStore::new(),
            passes: Vec::with_capacity(2),
        }
    }

    /// Drops the previous frame's commands and uniform blocks.
    pub fn begin_frame(&mut self) {
        self.passes.clear();
        for variant in self.variants.iter_mut() {
            variant.program_mut().arena.reset();
        }
    }

    /// Appends a draw to the current pass. Draws recorded before any pass
    /// was opened are dropped.
    pub fn push(&mut self, command: DrawCommand) {
        self.push_item(PassItem::Mesh(command));
    }

    /// Appends a fullscreen background draw to the current pass.
    pub fn push_background(&mut self, command: BackgroundCommand) {
        self.push_item(PassItem::Background(command));
    }

    fn push_item(&mut self, item: PassItem) {
        match self.passes.last_mut() {
            Some(pass) => pass.commands.push(item),
            None => log::warn!("Draw recorded outside of a pass; ignoring"),
        }
    }

    #[inline]
    #[must_use]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    #[inline]
    #[must_use]
    pub fn loader(&self) -> &ShaderLoader {
        self.variants.loader()
    }

    #[inline]
    #[must_use]
    pub fn color_format(&self) -> wgpu::TextureFormat {
        self.variants.factory().color_format()
    }

    #[inline]
    #[must_use]
    pub fn depth_format(&self) -> wgpu::TextureFormat {
        self.variants.factory().depth_format()
    }

    /// Number of commands recorded for `kind` this frame.
    #[must_use]
    pub fn command_count(&self, kind: PassKind) -> usize {
        self.passes
            .iter()
            .filter(|pass| pass.kind == kind)
            .map(|pass| pass.commands.len())
            .sum()
    }

    #[inline]
    #[must_use]
    pub fn textures(&self) -> &TextureStore {
        &self.textures
    }

    #[inline]
    pub fn textures_mut(&mut self) -> &mut TextureStore {
        &mut self.textures
    }

    /// Uploads uniform arenas and encodes the recorded passes.
    pub fn execute(&mut self, queue: &wgpu::Queue, encoder: &mut wgpu::CommandEncoder, targets: &PassTargets<'_>) {
        for variant in self.variants.iter_mut() {
            variant.program_mut().arena.flush(&self.device, queue);
        }
        for item in self.passes.iter().flat_map(|pass| &pass.commands) {
            if let PassItem::Background(background) = item {
                queue.write_buffer(&background.uniform_buffer, 0, &background.uniform_data);
            }
        }

        for pass in &self.passes {
            let (color_load, label) = match pass.kind {
                PassKind::Scene => (wgpu::LoadOp::Clear(targets.clear_color), "Scene Pass"),
                PassKind::Overlay => (wgpu::LoadOp::Load, "Overlay Pass"),
            };

            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(label),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: targets.color,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: color_load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: targets.depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            let mut current = ProgramId::UNRESOLVED;
            for item in &pass.commands {
                let command = match item {
                    PassItem::Mesh(command) => command,
                    PassItem::Background(background) => {
                        rpass.set_pipeline(&background.pipeline);
                        rpass.set_bind_group(0, &background.bind_group, &[]);
                        rpass.draw(0..3, 0..1);
                        current = ProgramId::UNRESOLVED;
                        continue;
                    }
                };
                let Some(variant) = self.variants.get(command.program) else {
                    log::warn!("Draw references unknown program {:?}", command.program);
                    continue;
                };
                let program = variant.program();

                // 状态去重：同一 program 连续绘制只切换一次 pipeline
                if command.program != current {
                    rpass.set_pipeline(&program.pipeline);
                    current = command.program;
                }
                rpass.set_bind_group(0, program.arena.bind_group(), &[command.uniform_offset]);
                rpass.set_bind_group(1, &command.material, &[]);

                let mesh = &command.mesh;
                rpass.set_vertex_buffer(0, mesh.positions.slice(..));
                rpass.set_vertex_buffer(1, mesh.uvs.slice(..));
                rpass.set_vertex_buffer(2, mesh.normals.slice(..));
                rpass.set_index_buffer(mesh.indices.slice(..), wgpu::IndexFormat::Uint16);
                rpass.draw_indexed(0..mesh.index_count(), 0, 0..1);
            }
        }
    }
}

impl PassRecorder for FrameRecorder {
    fn begin_pass(&mut self, pass: PassKind) {
        self.passes.push(RecordedPass {
            kind: pass,
            commands: Vec::new(),
        });
    }
}
