//! Gaussian Bloom
//!
//! Given the HDR mip chain and a blur radius, produces a texture to add to the
//! main image.
//!
//! # Algorithm
//!
//! 1. For each stage level `L` in `1..=stages`: horizontal 9-tap gaussian of
//!    mip `L`, then vertical gaussian of that result.
//! 2. **Combine**: every blurred stage is drawn into a result texture the size
//!    of mip 1 with additive blending. Bilinear sampling upscales the coarse
//!    stages.
//!
//! `stages = min(image_stages, levels - 1)`. The blur step of stage `L` is
//! `radius · 2^(L-1)` in UV units, so coarser stages spread wider.
//!
//! Intermediate textures and bind groups depend only on the mip chain and are
//! rebuilt through [`BloomRenderer::rebuild`] whenever the chain changes.

use bytemuck::{Pod, Zeroable};
use glam::{UVec2, Vec2, Vec4};
use smallvec::SmallVec;

use crate::errors::Result;
use crate::renderer::pipeline::ShaderLoader;
use crate::renderer::post::fullscreen::{
    draw_fullscreen, fullscreen_pipeline, linear_clamp_sampler, sampler_entry, texture_entry,
    uniform_entry,
};
use crate::renderer::post::mip_chain::MipChain;

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct BlurParams {
    blur_step: Vec4,
}

/// Number of blurred stages for a chain of `level_count` levels.
#[must_use]
pub fn stage_count(image_stages: u32, level_count: u32) -> u32 {
    image_stages.min(level_count.saturating_sub(1))
}

/// UV offset between neighbouring taps of stage level `level`.
#[must_use]
pub fn blur_step(radius: f32, level: u32, size: UVec2, vertical: bool) -> Vec2 {
    let step = radius * (1u32 << level.saturating_sub(1).min(31)) as f32;
    if vertical {
        // Keep the kernel round on non-square targets.
        let aspect = size.x.max(1) as f32 / size.y.max(1) as f32;
        Vec2::new(0.0, step * aspect)
    } else {
        Vec2::new(step, 0.0)
    }
}

fn create_target(device: &wgpu::Device, label: &str, size: UVec2, format: wgpu::TextureFormat) -> wgpu::TextureView {
    device
        .create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size.x,
                height: size.y,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        })
        .create_view(&wgpu::TextureViewDescriptor::default())
}

struct BloomStage {
    level: u32,
    size: UVec2,
    horizontal: wgpu::TextureView,
    vertical: wgpu::TextureView,
    horizontal_params: wgpu::Buffer,
    vertical_params: wgpu::Buffer,
    horizontal_bind_group: wgpu::BindGroup,
    vertical_bind_group: wgpu::BindGroup,
    combine_bind_group: wgpu::BindGroup,
}

pub struct BloomRenderer {
    blur_pipeline: wgpu::RenderPipeline,
    combine_pipeline: wgpu::RenderPipeline,
    blur_layout: wgpu::BindGroupLayout,
    combine_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,

    format: wgpu::TextureFormat,
    image_stages: u32,

    stages: SmallVec<[BloomStage; 4]>,
    result: wgpu::TextureView,
    result_size: UVec2,
}

impl BloomRenderer {
    pub fn new(device: &wgpu::Device, loader: &ShaderLoader, chain: &MipChain, image_stages: u32) -> Result<Self> {
        let format = chain.format();

        let blur_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Bloom Blur Layout"),
            entries: &[texture_entry(0), sampler_entry(1), uniform_entry(2)],
        });
        let combine_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Bloom Combine Layout"),
            entries: &[texture_entry(0), sampler_entry(1)],
        });

        let blur_pipeline = fullscreen_pipeline(
            device,
            loader,
            "Bloom Blur Pipeline",
            "blur.frag",
            &[],
            &[&blur_layout],
            format,
            None,
        )?;

        let additive = wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::One,
            operation: wgpu::BlendOperation::Add,
        };
        let combine_pipeline = fullscreen_pipeline(
            device,
            loader,
            "Bloom Combine Pipeline",
            "bloom_combine.frag",
            &[],
            &[&combine_layout],
            format,
            Some(wgpu::BlendState {
                color: additive,
                alpha: additive,
            }),
        )?;

        let result_size = Self::result_size(chain);
        let mut renderer = Self {
            blur_pipeline,
            combine_pipeline,
            blur_layout,
            combine_layout,
            sampler: linear_clamp_sampler(device, "Bloom Sampler"),
            format,
            image_stages,
            stages: SmallVec::new(),
            result: create_target(device, "Bloom Result", result_size, format),
            result_size,
        };
        renderer.rebuild(device, chain);
        Ok(renderer)
    }

    fn result_size(chain: &MipChain) -> UVec2 {
        chain.level(1).map_or(chain.size(), |level| level.size())
    }

    /// Reallocates stage targets and bind groups for `chain`.
    pub fn rebuild(&mut self, device: &wgpu::Device, chain: &MipChain) {
        let count = stage_count(self.image_stages, chain.level_count());
        self.result_size = Self::result_size(chain);
        self.result = create_target(device, "Bloom Result", self.result_size, self.format);

        self.stages = (1..=count)
            .filter_map(|level| chain.level(level).map(|mip| (level, mip)))
            .map(|(level, mip)| {
                let size = mip.size();
                let horizontal = create_target(device, &format!("Bloom H {level}"), size, self.format);
                let vertical = create_target(device, &format!("Bloom V {level}"), size, self.format);
                let params = |label: &str| {
                    device.create_buffer(&wgpu::BufferDescriptor {
                        label: Some(label),
                        size: std::mem::size_of::<BlurParams>() as u64,
                        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                        mapped_at_creation: false,
                    })
                };
                let horizontal_params = params("Bloom H Params");
                let vertical_params = params("Bloom V Params");

                let blur_bind_group = |source: &wgpu::TextureView, buffer: &wgpu::Buffer| {
                    device.create_bind_group(&wgpu::BindGroupDescriptor {
                        label: Some("Bloom Blur BG"),
                        layout: &self.blur_layout,
                        entries: &[
                            wgpu::BindGroupEntry {
                                binding: 0,
                                resource: wgpu::BindingResource::TextureView(source),
                            },
                            wgpu::BindGroupEntry {
                                binding: 1,
                                resource: wgpu::BindingResource::Sampler(&self.sampler),
                            },
                            wgpu::BindGroupEntry {
                                binding: 2,
                                resource: buffer.as_entire_binding(),
                            },
                        ],
                    })
                };
                let horizontal_bind_group = blur_bind_group(mip.view(), &horizontal_params);
                let vertical_bind_group = blur_bind_group(&horizontal, &vertical_params);

                let combine_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Bloom Combine BG"),
                    layout: &self.combine_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(&vertical),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::Sampler(&self.sampler),
                        },
                    ],
                });

                BloomStage {
                    level,
                    size,
                    horizontal,
                    vertical,
                    horizontal_params,
                    vertical_params,
                    horizontal_bind_group,
                    vertical_bind_group,
                    combine_bind_group,
                }
            })
            .collect();

        log::debug!("Bloom rebuilt with {} stage(s)", self.stages.len());
    }

    #[inline]
    #[must_use]
    pub fn stage_len(&self) -> usize {
        self.stages.len()
    }

    #[inline]
    #[must_use]
    pub fn result_view(&self) -> &wgpu::TextureView {
        &self.result
    }

    /// Blurs and combines the chain's stage levels. Returns the texture to add.
    pub fn render(
        &self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        radius: f32,
    ) -> &wgpu::TextureView {
        for stage in &self.stages {
            for (buffer, vertical) in [(&stage.horizontal_params, false), (&stage.vertical_params, true)] {
                let step = blur_step(radius, stage.level, stage.size, vertical);
                let params = BlurParams {
                    blur_step: step.extend(0.0).extend(0.0),
                };
                queue.write_buffer(buffer, 0, bytemuck::bytes_of(&params));
            }

            draw_fullscreen(
                encoder,
                "Bloom Blur H",
                &stage.horizontal,
                wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                &self.blur_pipeline,
                &[&stage.horizontal_bind_group],
            );
            draw_fullscreen(
                encoder,
                "Bloom Blur V",
                &stage.vertical,
                wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                &self.blur_pipeline,
                &[&stage.vertical_bind_group],
            );
        }

        if self.stages.is_empty() {
            // Nothing to blur on a 1×1 chain; hand back black.
            encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Bloom Clear"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.result,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
        }

        for (index, stage) in self.stages.iter().enumerate() {
            let load = if index == 0 {
                wgpu::LoadOp::Clear(wgpu::Color::BLACK)
            } else {
                wgpu::LoadOp::Load
            };
            draw_fullscreen(
                encoder,
                "Bloom Combine",
                &self.result,
                load,
                &self.combine_pipeline,
                &[&stage.combine_bind_group],
            );
        }

        &self.result
    }
}
