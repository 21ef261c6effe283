//! wgpu backend for shading variants
//!
//! Each [`GpuProgram`] owns its render pipeline and a [`UniformArena`]: a
//! dynamic-offset uniform buffer that receives one block per draw during the
//! prepare phase and is uploaded in a single write before the recorded
//! passes are executed.
//!
//! Bind group layout shared by every variant:
//!
//! | Group | Binding | Resource                               |
//! |-------|---------|----------------------------------------|
//! | 0     | 0       | Per-draw uniform block (dynamic)       |
//! | 1     | 0       | Base color texture                     |
//! | 1     | 1       | Normal texture                         |
//! | 1     | 2       | Material sampler                       |

use std::num::NonZeroU64;

use crate::errors::{RenderError, Result};
use crate::renderer::pipeline::shader_loader::CompiledProgram;
use crate::renderer::pipeline::uniforms::{UniformBlock, VariantUniforms};
use crate::renderer::pipeline::variant_cache::{ProgramFactory, VariantProgram};
use crate::renderer::pipeline::variant_key::VariantKey;
use crate::resources::mesh::vertex_buffer_layouts;
use crate::resources::{Material, TextureHandle, TextureStore};

// ============================================================================
// Uniform Arena
// ============================================================================

/// 管理动态 Uniform Buffer (Group 0)
pub struct UniformArena {
    label: String,
    layout: wgpu::BindGroupLayout,

    block_size: u32,
    stride: u32,

    staging: Vec<u8>,
    buffer: wgpu::Buffer,
    capacity: u64,
    bind_group: wgpu::BindGroup,
}

impl UniformArena {
    const INITIAL_BLOCKS: u64 = 64;

    #[must_use]
    pub fn new(device: &wgpu::Device, label: &str, layout: wgpu::BindGroupLayout, block_size: u32) -> Self {
        let alignment = device.limits().min_uniform_buffer_offset_alignment;
        let block_size = block_size.max(16);
        let stride = block_size.div_ceil(alignment) * alignment;
        let capacity = u64::from(stride) * Self::INITIAL_BLOCKS;

        let buffer = Self::create_buffer(device, label, capacity);
        let bind_group = Self::create_bind_group(device, label, &layout, &buffer, block_size);

        Self {
            label: label.to_string(),
            layout,
            block_size,
            stride,
            staging: Vec::with_capacity(capacity as usize),
            buffer,
            capacity,
            bind_group,
        }
    }

    fn create_buffer(device: &wgpu::Device, label: &str, size: u64) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn create_bind_group(
        device: &wgpu::Device,
        label: &str,
        layout: &wgpu::BindGroupLayout,
        buffer: &wgpu::Buffer,
        block_size: u32,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer,
                    offset: 0,
                    size: NonZeroU64::new(u64::from(block_size)),
                }),
            }],
        })
    }

    /// Appends one block and returns its dynamic offset.
    pub fn push(&mut self, block: &UniformBlock) -> u32 {
        let offset = self.staging.len() as u32;
        let bytes = block.as_bytes();
        let len = bytes.len().min(self.block_size as usize);
        self.staging.extend_from_slice(&bytes[..len]);
        self.staging.resize(offset as usize + self.stride as usize, 0);
        offset
    }

    /// Uploads the blocks pushed this frame, growing the buffer when needed.
    pub fn flush(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        if self.staging.is_empty() {
            return;
        }
        let required = self.staging.len() as u64;
        if required > self.capacity {
            let capacity = required.next_power_of_two();
            log::debug!("Growing uniform arena '{}' to {capacity} bytes", self.label);
            self.buffer = Self::create_buffer(device, &self.label, capacity);
            self.bind_group =
                Self::create_bind_group(device, &self.label, &self.layout, &self.buffer, self.block_size);
            self.capacity = capacity;
        }
        queue.write_buffer(&self.buffer, 0, &self.staging);
    }

    /// Drops last frame's blocks.
    pub fn reset(&mut self) {
        self.staging.clear();
    }

    #[inline]
    #[must_use]
    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }
}

// ============================================================================
// Program
// ============================================================================

pub struct GpuProgram {
    pub(crate) pipeline: wgpu::RenderPipeline,
    pub(crate) arena: UniformArena,
}

impl VariantProgram for GpuProgram {
    fn upload(&mut self, block: &UniformBlock) -> u32 {
        self.arena.push(block)
    }
}

/// Builds render pipelines for compiled variants.
pub struct GpuProgramFactory {
    device: wgpu::Device,
    material_layout: wgpu::BindGroupLayout,
    color_format: wgpu::TextureFormat,
    depth_format: wgpu::TextureFormat,
}

impl GpuProgramFactory {
    #[must_use]
    pub fn new(
        device: wgpu::Device,
        material_layout: wgpu::BindGroupLayout,
        color_format: wgpu::TextureFormat,
        depth_format: wgpu::TextureFormat,
    ) -> Self {
        Self {
            device,
            material_layout,
            color_format,
            depth_format,
        }
    }

    #[inline]
    #[must_use]
    pub fn color_format(&self) -> wgpu::TextureFormat {
        self.color_format
    }

    #[inline]
    #[must_use]
    pub fn depth_format(&self) -> wgpu::TextureFormat {
        self.depth_format
    }
}

impl ProgramFactory for GpuProgramFactory {
    type Program = GpuProgram;

    fn build(
        &mut self,
        key: &VariantKey,
        compiled: &CompiledProgram,
        uniforms: &VariantUniforms,
    ) -> Result<GpuProgram> {
        let label = format!(
            "Variant {:?} P{} S{}",
            key.flags, key.point_lights, key.spot_lights
        );
        let block_size = uniforms.block_size.max(16);

        let uniform_layout = self.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Variant Uniform Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(u64::from(block_size)),
                },
                count: None,
            }],
        });

        let pipeline_layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&label),
            bind_group_layouts: &[Some(&uniform_layout), Some(&self.material_layout)],
            immediate_size: 0,
        });

        let (vs_module, fs_module) = compiled.create_modules(&self.device, &label);
        let vertex_buffers = vertex_buffer_layouts();

        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&label),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vs_module,
                entry_point: Some("main"),
                buffers: &vertex_buffers,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &fs_module,
                entry_point: Some("main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.color_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: self.depth_format,
                depth_write_enabled: Some(true),
                depth_compare: Some(wgpu::CompareFunction::Less),
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        let arena = UniformArena::new(&self.device, &label, uniform_layout, block_size);
        Ok(GpuProgram { pipeline, arena })
    }
}

// ============================================================================
// Material Bindings
// ============================================================================

/// Group 1 layout plus the fallback textures bound for absent slots.
pub struct MaterialBindings {
    layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    white: wgpu::TextureView,
    flat_normal: wgpu::TextureView,
}

impl MaterialBindings {
    #[must_use]
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Material Layout"),
            entries: &[
                texture_entry(0),
                texture_entry(1),
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Material Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Linear,
            ..Default::default()
        });

        let pixel = |label: &str, rgba: [u8; 4]| {
            let texture = crate::resources::Texture::from_rgba8(device, queue, label, glam::UVec2::ONE, &rgba);
            texture.raw().create_view(&wgpu::TextureViewDescriptor::default())
        };

        Self {
            layout,
            sampler,
            white: pixel("Fallback White", [255, 255, 255, 255]),
            flat_normal: pixel("Fallback Normal", [128, 128, 255, 255]),
        }
    }

    #[inline]
    #[must_use]
    pub fn layout(&self) -> &wgpu::BindGroupLayout {
        &self.layout
    }

    fn view<'a>(
        &'a self,
        textures: &'a TextureStore,
        handle: Option<TextureHandle>,
        fallback: &'a wgpu::TextureView,
    ) -> Result<&'a wgpu::TextureView> {
        let Some(handle) = handle else {
            return Ok(fallback);
        };
        match textures.get(handle) {
            Some(texture) => texture.view_2d("bind a material texture"),
            None => {
                log::warn!("Material references unknown texture {handle:?}; using fallback");
                Ok(fallback)
            }
        }
    }

    /// Creates the group 1 bind group of `material`.
    pub fn bind_group(
        &self,
        device: &wgpu::Device,
        textures: &TextureStore,
        material: &Material,
    ) -> Result<wgpu::BindGroup> {
        let base = self.view(textures, material.base_color.texture.map(|s| s.texture), &self.white)?;
        let normal = self.view(
            textures,
            material.normal_map.as_ref().map(|n| n.texture.texture),
            &self.flat_normal,
        )?;

        Ok(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Material Bind Group"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(base),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(normal),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        }))
    }
}

impl std::fmt::Debug for MaterialBindings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaterialBindings").finish_non_exhaustive()
    }
}

/// Fails when `format` cannot back a sampled render attachment.
pub(crate) fn require_renderable(
    device: &wgpu::Device,
    target: &'static str,
    format: wgpu::TextureFormat,
) -> Result<()> {
    let usages = format.guaranteed_format_features(device.features()).allowed_usages;
    let needed = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
    if usages.contains(needed) {
        Ok(())
    } else {
        Err(RenderError::IncompleteFramebuffer {
            target,
            reason: format!("{format:?} cannot be both rendered to and sampled"),
        })
    }
}
