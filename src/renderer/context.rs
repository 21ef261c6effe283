//! Presentation Context
//!
//! [`WgpuContext`] owns the device/queue pair and the window surface the
//! composite pass draws into. A surface that reports itself lost or outdated
//! is reconfigured in place and the frame is skipped.

use glam::UVec2;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::errors::{RenderError, Result};
use crate::renderer::settings::RendererSettings;

/// Device, queue and presentable surface.
pub struct WgpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub surface: wgpu::Surface<'static>,
    /// Current surface format, size and present mode
    pub config: wgpu::SurfaceConfiguration,
}

impl WgpuContext {
    pub async fn new<W>(window: W, settings: &RendererSettings, size: UVec2) -> Result<Self>
    where
        W: HasWindowHandle + HasDisplayHandle + Send + Sync + 'static,
    {
        let instance = wgpu::Instance::default();
        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: settings.power_preference.into(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| RenderError::AdapterRequestFailed(e.to_string()))?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::Performance,
                ..Default::default()
            })
            .await?;

        let mut config = surface
            .get_default_config(&adapter, size.x.max(1), size.y.max(1))
            .ok_or_else(|| {
                RenderError::AdapterRequestFailed("Surface not supported by adapter".to_string())
            })?;
        config.present_mode = settings.present_mode();
        surface.configure(&device, &config);

        log::info!(
            "GPU context ready: {} ({:?}), surface {:?} {}x{}",
            adapter.get_info().name,
            adapter.get_info().backend,
            config.format,
            config.width,
            config.height
        );

        Ok(Self {
            device,
            queue,
            surface,
            config,
        })
    }

    /// Reconfigures the surface. Zero-sized requests are ignored.
    pub fn resize(&mut self, size: UVec2) {
        if size.x > 0 && size.y > 0 {
            self.config.width = size.x;
            self.config.height = size.y;
            self.surface.configure(&self.device, &self.config);
        }
    }

    /// Acquires the next surface texture.
    ///
    /// A lost or outdated surface is reconfigured and `None` is returned so
    /// the caller skips the frame.
    pub fn acquire(&mut self) -> Result<Option<wgpu::SurfaceTexture>> {
        match self.surface.get_current_texture() {
            wgpu::CurrentSurfaceTexture::Success(output) | wgpu::CurrentSurfaceTexture::Suboptimal(output) => {
                Ok(Some(output))
            }
            wgpu::CurrentSurfaceTexture::Lost | wgpu::CurrentSurfaceTexture::Outdated => {
                log::warn!("Surface lost; reconfiguring and skipping the frame");
                self.surface.configure(&self.device, &self.config);
                Ok(None)
            }
            wgpu::CurrentSurfaceTexture::Timeout => {
                log::warn!("Surface acquire timed out; skipping the frame");
                Ok(None)
            }
            e => Err(RenderError::Surface(format!("{e:?}"))),
        }
    }

    /// Format the composite pass must target.
    #[inline]
    #[must_use]
    pub fn color_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> UVec2 {
        UVec2::new(self.config.width, self.config.height)
    }
}
