//! Tonemapped Composite
//!
//! Final fullscreen pass into the presentable surface:
//! `1 - exp(-(main + bloom · strength) · exposure)`.
//!
//! | Group | Binding                 | Resource          |
//! |-------|-------------------------|-------------------|
//! | 0     | `main_image_binding`    | Main HDR image    |
//! | 0     | `bloom_image_binding`   | Bloom (or black)  |
//! | 1     | 0                       | Sampler           |
//! | 1     | 1                       | `CompositeParams` |

use bytemuck::{Pod, Zeroable};
use glam::UVec2;

use crate::errors::Result;
use crate::renderer::pipeline::ShaderLoader;
use crate::renderer::post::fullscreen::{
    draw_fullscreen, fullscreen_pipeline, linear_clamp_sampler, sampler_entry, texture_entry,
    uniform_entry,
};
use crate::renderer::settings::PostProcessSettings;
use crate::resources::Texture;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct CompositeParams {
    pub exposure: f32,
    pub bloom_strength: f32,
    _pad: [f32; 2],
}

impl CompositeParams {
    #[must_use]
    pub fn new(exposure: f32, bloom_strength: f32) -> Self {
        Self {
            exposure,
            bloom_strength,
            _pad: [0.0; 2],
        }
    }
}

/// Defines that place the two images at their configured bindings.
#[must_use]
pub fn binding_defines(settings: &PostProcessSettings) -> Vec<String> {
    vec![
        format!("MAIN_IMAGE_BINDING {}", settings.main_image_binding),
        format!("BLOOM_IMAGE_BINDING {}", settings.bloom_image_binding),
    ]
}

pub struct Compositor {
    pipeline: wgpu::RenderPipeline,
    image_layout: wgpu::BindGroupLayout,
    params_buffer: wgpu::Buffer,
    params_bind_group: wgpu::BindGroup,
    black: wgpu::TextureView,

    main_binding: u32,
    bloom_binding: u32,
}

impl Compositor {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        loader: &ShaderLoader,
        settings: &PostProcessSettings,
        surface_format: wgpu::TextureFormat,
    ) -> Result<Self> {
        settings.validate()?;

        let image_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Composite Image Layout"),
            entries: &[
                texture_entry(settings.main_image_binding),
                texture_entry(settings.bloom_image_binding),
            ],
        });
        let params_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Composite Params Layout"),
            entries: &[sampler_entry(0), uniform_entry(1)],
        });

        let pipeline = fullscreen_pipeline(
            device,
            loader,
            "Composite Pipeline",
            "composite.frag",
            &binding_defines(settings),
            &[&image_layout, &params_layout],
            surface_format,
            None,
        )?;

        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Composite Params"),
            size: std::mem::size_of::<CompositeParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let sampler = linear_clamp_sampler(device, "Composite Sampler");
        let params_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Composite Params BG"),
            layout: &params_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: params_buffer.as_entire_binding(),
                },
            ],
        });

        let black = Texture::from_rgba8(device, queue, "Composite Black", UVec2::ONE, &[0, 0, 0, 255]);
        let black = black.raw().create_view(&wgpu::TextureViewDescriptor::default());

        Ok(Self {
            pipeline,
            image_layout,
            params_buffer,
            params_bind_group,
            black,
            main_binding: settings.main_image_binding,
            bloom_binding: settings.bloom_image_binding,
        })
    }

    /// Draws the tonemapped image into `target`. Without bloom a black
    /// texture is bound in its place.
    pub fn render(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        main: &wgpu::TextureView,
        bloom: Option<&wgpu::TextureView>,
        params: CompositeParams,
    ) {
        queue.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&params));

        let image_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Composite Image BG"),
            layout: &self.image_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: self.main_binding,
                    resource: wgpu::BindingResource::TextureView(main),
                },
                wgpu::BindGroupEntry {
                    binding: self.bloom_binding,
                    resource: wgpu::BindingResource::TextureView(bloom.unwrap_or(&self.black)),
                },
            ],
        });

        draw_fullscreen(
            encoder,
            "Composite Pass",
            target,
            wgpu::LoadOp::Clear(wgpu::Color::BLACK),
            &self.pipeline,
            &[&image_bind_group, &self.params_bind_group],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_fill_one_std140_slot() {
        assert_eq!(std::mem::size_of::<CompositeParams>(), 16);
    }

    #[test]
    fn defines_follow_settings() {
        let settings = PostProcessSettings {
            main_image_binding: 2,
            bloom_image_binding: 5,
            ..Default::default()
        };
        assert_eq!(
            binding_defines(&settings),
            vec!["MAIN_IMAGE_BINDING 2".to_string(), "BLOOM_IMAGE_BINDING 5".to_string()]
        );
    }
}
