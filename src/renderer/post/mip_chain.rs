//! HDR Mip Chain
//!
//! The scene renders into level 0; every other level is a separate texture
//! half the size of the previous one (floored at 1 per axis). Level 0 owns
//! the depth attachment used by both frame passes.
//!
//! ```text
//! level 0 ──downsample──▶ level 1 ──▶ ... ──▶ level N-1 (1×1, exposure readback)
//!    │                       │
//!    └── composite           └── bloom stages
//! ```

use glam::UVec2;

use crate::errors::{RenderError, Result};
use crate::renderer::pipeline::ShaderLoader;
use crate::renderer::pipeline::gpu_program::require_renderable;
use crate::renderer::post::fullscreen::{
    draw_fullscreen, fullscreen_pipeline, linear_clamp_sampler, sampler_entry, texture_entry,
};

/// `floor(log2(max(w, h))) + 1`. A zero-sized extent counts as 1×1.
#[must_use]
pub fn mip_level_count(size: UVec2) -> u32 {
    let largest = size.x.max(size.y).max(1);
    u32::BITS - largest.leading_zeros()
}

/// Extent of every level, level 0 first.
#[must_use]
pub fn mip_sizes(size: UVec2) -> Vec<UVec2> {
    (0..mip_level_count(size))
        .map(|level| UVec2::new((size.x >> level).max(1), (size.y >> level).max(1)))
        .collect()
}

#[derive(Debug)]
pub struct MipLevel {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    size: UVec2,
}

impl MipLevel {
    #[inline]
    #[must_use]
    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    #[inline]
    #[must_use]
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> UVec2 {
        self.size
    }
}

#[derive(Debug)]
pub struct MipChain {
    format: wgpu::TextureFormat,
    depth_format: wgpu::TextureFormat,
    size: UVec2,
    levels: Vec<MipLevel>,
    depth: wgpu::TextureView,
}

impl MipChain {
    pub fn new(
        device: &wgpu::Device,
        size: UVec2,
        format: wgpu::TextureFormat,
        depth_format: wgpu::TextureFormat,
    ) -> Result<Self> {
        require_renderable(device, "HDR color", format)?;
        if !depth_format.is_depth_stencil_format() {
            return Err(RenderError::IncompleteFramebuffer {
                target: "HDR depth",
                reason: format!("{depth_format:?} is not a depth format"),
            });
        }
        let (levels, depth) = Self::allocate(device, size, format, depth_format)?;
        Ok(Self {
            format,
            depth_format,
            size,
            levels,
            depth,
        })
    }

    fn allocate(
        device: &wgpu::Device,
        size: UVec2,
        format: wgpu::TextureFormat,
        depth_format: wgpu::TextureFormat,
    ) -> Result<(Vec<MipLevel>, wgpu::TextureView)> {
        if size.x == 0 || size.y == 0 {
            return Err(RenderError::IncompleteFramebuffer {
                target: "HDR mip chain",
                reason: format!("zero-sized extent {}x{}", size.x, size.y),
            });
        }
        let max = device.limits().max_texture_dimension_2d;
        if size.x > max || size.y > max {
            return Err(RenderError::IncompleteFramebuffer {
                target: "HDR mip chain",
                reason: format!("{}x{} exceeds the device limit of {max}", size.x, size.y),
            });
        }

        let levels: Vec<MipLevel> = mip_sizes(size)
            .into_iter()
            .enumerate()
            .map(|(index, level_size)| {
                let texture = device.create_texture(&wgpu::TextureDescriptor {
                    label: Some(&format!("HDR Mip {index}")),
                    size: wgpu::Extent3d {
                        width: level_size.x,
                        height: level_size.y,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                        | wgpu::TextureUsages::TEXTURE_BINDING
                        | wgpu::TextureUsages::COPY_SRC,
                    view_formats: &[],
                });
                let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
                MipLevel {
                    texture,
                    view,
                    size: level_size,
                }
            })
            .collect();

        let depth = device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some("HDR Depth"),
                size: wgpu::Extent3d {
                    width: size.x,
                    height: size.y,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: depth_format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            })
            .create_view(&wgpu::TextureViewDescriptor::default());

        log::debug!("Built HDR mip chain {}x{} with {} levels", size.x, size.y, levels.len());
        Ok((levels, depth))
    }

    /// Rebuilds the chain for `size`. Returns `false` without touching the
    /// GPU when the size is unchanged.
    pub fn resize(&mut self, device: &wgpu::Device, size: UVec2) -> Result<bool> {
        if size == self.size {
            return Ok(false);
        }
        self.rebuild(device, size)?;
        Ok(true)
    }

    /// Unconditionally reallocates every level and the depth attachment.
    pub fn rebuild(&mut self, device: &wgpu::Device, size: UVec2) -> Result<()> {
        let (levels, depth) = Self::allocate(device, size, self.format, self.depth_format)?;
        self.levels = levels;
        self.depth = depth;
        self.size = size;
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> UVec2 {
        self.size
    }

    #[inline]
    #[must_use]
    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    #[inline]
    #[must_use]
    pub fn level_count(&self) -> u32 {
        self.levels.len() as u32
    }

    #[must_use]
    pub fn level(&self, index: u32) -> Option<&MipLevel> {
        self.levels.get(index as usize)
    }

    #[must_use]
    pub fn levels(&self) -> &[MipLevel] {
        &self.levels
    }

    /// Level 0, the scene color target.
    #[must_use]
    pub fn main(&self) -> &MipLevel {
        &self.levels[0]
    }

    /// The 1×1 level holding the frame's average color.
    #[must_use]
    pub fn smallest(&self) -> &MipLevel {
        &self.levels[self.levels.len() - 1]
    }

    #[inline]
    #[must_use]
    pub fn depth_view(&self) -> &wgpu::TextureView {
        &self.depth
    }
}

/// Fills levels 1.. from level 0 with one reusable downsample program.
pub struct LodGenerator {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
}

impl LodGenerator {
    pub fn new(device: &wgpu::Device, loader: &ShaderLoader, format: wgpu::TextureFormat) -> Result<Self> {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Downsample Layout"),
            entries: &[texture_entry(0), sampler_entry(1)],
        });
        let pipeline = fullscreen_pipeline(
            device,
            loader,
            "Downsample Pipeline",
            "downsample.frag",
            &[],
            &[&layout],
            format,
            None,
        )?;
        Ok(Self {
            pipeline,
            layout,
            sampler: linear_clamp_sampler(device, "Downsample Sampler"),
        })
    }

    /// Downsamples level `L-1` into `L` for every level.
    pub fn generate(&self, device: &wgpu::Device, encoder: &mut wgpu::CommandEncoder, chain: &MipChain) {
        for pair in chain.levels().windows(2) {
            let [source, target] = pair else { continue };
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Downsample BG"),
                layout: &self.layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(source.view()),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                ],
            });
            draw_fullscreen(
                encoder,
                "Downsample Pass",
                target.view(),
                wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                &self.pipeline,
                &[&bind_group],
            );
        }
    }
}
