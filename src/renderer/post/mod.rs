//! HDR Post-process Pipeline
//!
//! Runs after the frame passes have written the HDR color target (mip 0):
//!
//! ```text
//! generate_lods ─▶ estimate_exposure ─▶ readback copy ─▶ bloom? ─▶ composite ─▶ surface
//! ```
//!
//! - [`MipChain`]: separate half-size textures, rebuilt on resize and when
//!   bloom is (re)enabled
//! - [`AutoExposure`]: adapts toward the key value from the previous frames'
//!   average color
//! - [`BloomRenderer`]: gaussian bloom over mip levels `1..=stages`
//! - [`Compositor`]: tonemapped composite into the presentable surface

pub mod bloom;
pub mod composite;
pub mod exposure;
pub(crate) mod fullscreen;
pub mod mip_chain;

pub use bloom::BloomRenderer;
pub use composite::{CompositeParams, Compositor};
pub use exposure::{AutoExposure, ExposureReadback, is_readable_format, luminance};
pub use mip_chain::{LodGenerator, MipChain, mip_level_count, mip_sizes};

use glam::{UVec2, Vec3};

use crate::errors::Result;
use crate::renderer::pipeline::ShaderLoader;
use crate::renderer::settings::{PostProcessSettings, RendererSettings};

pub struct HdrPipeline {
    settings: PostProcessSettings,
    loader: ShaderLoader,

    chain: MipChain,
    lods: LodGenerator,

    exposure: AutoExposure,
    readback: ExposureReadback,
    last_average: Option<Vec3>,

    bloom: Option<BloomRenderer>,
    compositor: Compositor,
}

impl HdrPipeline {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        loader: ShaderLoader,
        settings: &RendererSettings,
        size: UVec2,
        surface_format: wgpu::TextureFormat,
    ) -> Result<Self> {
        settings.validate()?;
        let post = settings.post.clone();

        let chain = MipChain::new(device, size, settings.hdr_format, settings.depth_format)?;
        let lods = LodGenerator::new(device, &loader, settings.hdr_format)?;
        let compositor = Compositor::new(device, queue, &loader, &post, surface_format)?;
        let bloom = if post.bloom_enabled {
            Some(BloomRenderer::new(device, &loader, &chain, post.bloom_image_stages)?)
        } else {
            None
        };

        log::info!(
            "HDR pipeline ready: {}x{}, {} mip levels, bloom {}",
            size.x,
            size.y,
            chain.level_count(),
            if bloom.is_some() { "on" } else { "off" }
        );

        Ok(Self {
            exposure: AutoExposure::new(&post),
            readback: ExposureReadback::new(device, settings.hdr_format),
            last_average: None,
            settings: post,
            loader,
            chain,
            lods,
            bloom,
            compositor,
        })
    }

    /// Rebuilds the chain (and bloom targets) when `size` differs from the
    /// current one.
    pub fn resize(&mut self, device: &wgpu::Device, size: UVec2) -> Result<()> {
        if self.chain.resize(device, size)?
            && let Some(bloom) = &mut self.bloom
        {
            bloom.rebuild(device, &self.chain);
        }
        Ok(())
    }

    /// Enabling bloom rebuilds the chain and creates the bloom targets;
    /// disabling drops them.
    pub fn set_bloom_enabled(&mut self, device: &wgpu::Device, enabled: bool) -> Result<()> {
        self.settings.bloom_enabled = enabled;
        if !enabled {
            self.bloom = None;
            return Ok(());
        }
        if self.bloom.is_some() {
            return Ok(());
        }
        self.chain.rebuild(device, self.chain.size())?;
        self.bloom = Some(BloomRenderer::new(
            device,
            &self.loader,
            &self.chain,
            self.settings.bloom_image_stages,
        )?);
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn bloom_enabled(&self) -> bool {
        self.bloom.is_some()
    }

    #[inline]
    #[must_use]
    pub fn chain(&self) -> &MipChain {
        &self.chain
    }

    #[inline]
    #[must_use]
    pub fn color_view(&self) -> &wgpu::TextureView {
        self.chain.main().view()
    }

    #[inline]
    #[must_use]
    pub fn depth_view(&self) -> &wgpu::TextureView {
        self.chain.depth_view()
    }

    #[inline]
    #[must_use]
    pub fn exposure(&self) -> f32 {
        self.exposure.exposure()
    }

    /// Downsamples mip 0 into every other level.
    pub fn generate_lods(&self, device: &wgpu::Device, encoder: &mut wgpu::CommandEncoder) {
        self.lods.generate(device, encoder, &self.chain);
    }

    /// Folds in any completed readback, then advances the exposure by `dt`.
    /// Until the first readback lands the exposure stays at its initial value.
    pub fn estimate_exposure(&mut self, device: &wgpu::Device, dt: f32) -> f32 {
        match self.readback.try_take(device) {
            Ok(Some(average)) => self.last_average = Some(average),
            Ok(None) => {}
            Err(e) => log::warn!("Exposure readback skipped: {e}"),
        }
        if let Some(average) = self.last_average {
            self.exposure.update(average, dt);
        }
        self.exposure.exposure()
    }

    /// Encodes the whole post chain, writing the final image into `target`.
    pub fn run(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        dt: f32,
    ) {
        self.generate_lods(device, encoder);
        let exposure = self.estimate_exposure(device, dt);
        self.readback.encode_copy(encoder, &self.chain);

        let bloom = self
            .bloom
            .as_ref()
            .map(|bloom| bloom.render(queue, encoder, self.settings.bloom_radius));

        let params = CompositeParams::new(exposure, self.settings.bloom_strength);
        self.compositor
            .render(device, queue, encoder, target, self.chain.main().view(), bloom, params);
    }

    /// Call once the frame's command buffer has been submitted.
    pub fn after_submit(&mut self) {
        self.readback.after_submit();
    }
}
