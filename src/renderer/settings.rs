//! Renderer Settings
//!
//! Configuration consumed once when the [`Renderer`](crate::renderer::Renderer)
//! is created. Every field has a default, so a settings file only needs the
//! keys it overrides.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use ember::renderer::{RendererSettings, PostProcessSettings};
//!
//! let settings = RendererSettings {
//!     vsync: false,
//!     post: PostProcessSettings {
//!         bloom_enabled: false,
//!         ..Default::default()
//!     },
//!     ..Default::default()
//! };
//!
//! // Or from JSON:
//! let settings = RendererSettings::from_json(r#"{ "post": { "bloom_radius": 0.005 } }"#)?;
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::errors::{RenderError, Result};
use crate::renderer::post::exposure::is_readable_format;

/// Main color target format. Floating point so the post chain sees HDR values.
pub const HDR_TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// GPU adapter selection preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerPreference {
    LowPower,
    #[default]
    HighPerformance,
}

impl From<PowerPreference> for wgpu::PowerPreference {
    fn from(value: PowerPreference) -> Self {
        match value {
            PowerPreference::LowPower => wgpu::PowerPreference::LowPower,
            PowerPreference::HighPerformance => wgpu::PowerPreference::HighPerformance,
        }
    }
}

// ---------------------------------------------------------------------------
// PostProcessSettings
// ---------------------------------------------------------------------------

/// HDR post-process configuration.
///
/// | Field                 | Default   |
/// |-----------------------|-----------|
/// | `bloom_enabled`       | `true`    |
/// | `bloom_radius`        | `0.00375` |
/// | `bloom_image_stages`  | `4`       |
/// | `bloom_strength`      | `1.0`     |
/// | `exposure_key_value`  | `0.18`    |
/// | `exposure_decay_rate` | `0.75`    |
/// | `min_luminance`       | `1e-4`    |
/// | `initial_exposure`    | `1.0`     |
/// | `main_image_binding`  | `0`       |
/// | `bloom_image_binding` | `1`       |
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PostProcessSettings {
    pub bloom_enabled: bool,
    /// Blur step in UV units at mip level 0.
    pub bloom_radius: f32,
    /// How many mip levels (starting at 1) are blurred and summed.
    pub bloom_image_stages: u32,
    pub bloom_strength: f32,

    /// Target average luminance after exposure.
    pub exposure_key_value: f32,
    /// Adaptation speed, per second.
    pub exposure_decay_rate: f32,
    /// Floor applied to the measured luminance before dividing by it.
    pub min_luminance: f32,
    pub initial_exposure: f32,

    /// Composite texture bindings for the main and bloom images.
    pub main_image_binding: u32,
    pub bloom_image_binding: u32,
}

impl Default for PostProcessSettings {
    fn default() -> Self {
        Self {
            bloom_enabled: true,
            bloom_radius: 0.00375,
            bloom_image_stages: 4,
            bloom_strength: 1.0,
            exposure_key_value: 0.18,
            exposure_decay_rate: 0.75,
            min_luminance: 1e-4,
            initial_exposure: 1.0,
            main_image_binding: 0,
            bloom_image_binding: 1,
        }
    }
}

impl PostProcessSettings {
    /// Rejects configurations the post chain cannot be built from.
    pub fn validate(&self) -> Result<()> {
        if self.main_image_binding == self.bloom_image_binding {
            return Err(RenderError::InvalidSettings(format!(
                "main and bloom images share binding {}",
                self.main_image_binding
            )));
        }
        if self.min_luminance <= 0.0 {
            return Err(RenderError::InvalidSettings(
                "min_luminance must be positive".to_string(),
            ));
        }
        if self.exposure_decay_rate < 0.0 {
            return Err(RenderError::InvalidSettings(
                "exposure_decay_rate must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RendererSettings
// ---------------------------------------------------------------------------

/// Global configuration for renderer initialization.
///
/// | Field              | Description                          | Default            |
/// |--------------------|--------------------------------------|--------------------|
/// | `vsync`            | Vertical sync enabled                | `true`             |
/// | `power_preference` | GPU adapter selection strategy       | `HighPerformance`  |
/// | `clear_color`      | Scene pass clear color (linear RGBA) | Black (0,0,0,1)    |
/// | `shader_root`      | Directory searched before the embedded shaders | `None`   |
/// | `hdr_format`       | Main color / mip chain format        | `Rgba16Float`      |
/// | `depth_format`     | Depth attachment format              | `Depth32Float`     |
/// | `post`             | [`PostProcessSettings`]              |                    |
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    /// When `true`, the frame rate is capped to the display refresh rate.
    pub vsync: bool,

    pub power_preference: PowerPreference,

    pub clear_color: [f64; 4],

    /// Shader sources found here take precedence over the embedded copies.
    pub shader_root: Option<PathBuf>,

    #[serde(skip)]
    pub hdr_format: wgpu::TextureFormat,

    #[serde(skip)]
    pub depth_format: wgpu::TextureFormat,

    pub post: PostProcessSettings,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            vsync: true,
            power_preference: PowerPreference::default(),
            clear_color: [0.0, 0.0, 0.0, 1.0],
            shader_root: None,
            hdr_format: HDR_TEXTURE_FORMAT,
            depth_format: wgpu::TextureFormat::Depth32Float,
            post: PostProcessSettings::default(),
        }
    }
}

impl RendererSettings {
    /// Parses settings from a JSON document and validates them.
    pub fn from_json(text: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks the attachment formats and the post settings.
    ///
    /// The HDR format must be one the exposure readback can decode.
    pub fn validate(&self) -> Result<()> {
        if !is_readable_format(self.hdr_format) {
            return Err(RenderError::InvalidSettings(format!(
                "hdr_format {:?} cannot be read back for exposure; use Rgba16Float or Rgba32Float",
                self.hdr_format
            )));
        }
        if !self.depth_format.is_depth_stencil_format() {
            return Err(RenderError::InvalidSettings(format!(
                "depth_format {:?} is not a depth format",
                self.depth_format
            )));
        }
        self.post.validate()
    }

    /// Reads and parses a JSON settings file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    #[must_use]
    pub fn wgpu_clear_color(&self) -> wgpu::Color {
        let [r, g, b, a] = self.clear_color;
        wgpu::Color { r, g, b, a }
    }

    #[must_use]
    pub fn present_mode(&self) -> wgpu::PresentMode {
        if self.vsync {
            wgpu::PresentMode::AutoVsync
        } else {
            wgpu::PresentMode::AutoNoVsync
        }
    }
}
