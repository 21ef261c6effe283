//! Automatic Exposure
//!
//! The 1×1 level of the mip chain is the frame's average color. It is copied
//! into a mappable buffer after the LOD pass and read back on a later frame,
//! so the CPU never waits on the GPU; exposure therefore trails the image by
//! at least one frame.
//!
//! Adaptation is exponential toward `key_value / luminance`:
//!
//! ```text
//! exposure += (target - exposure) * (1 - exp(-dt * decay_rate))
//! ```

use glam::Vec3;
use half::f16;

use crate::errors::{RenderError, Result};
use crate::renderer::post::mip_chain::MipChain;
use crate::renderer::settings::PostProcessSettings;

/// Rec. 709 relative luminance.
#[must_use]
pub fn luminance(color: Vec3) -> f32 {
    0.2126 * color.x + 0.7152 * color.y + 0.0722 * color.z
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutoExposure {
    exposure: f32,
    key_value: f32,
    decay_rate: f32,
    min_luminance: f32,
}

impl Default for AutoExposure {
    fn default() -> Self {
        Self::new(&PostProcessSettings::default())
    }
}

impl AutoExposure {
    #[must_use]
    pub fn new(settings: &PostProcessSettings) -> Self {
        Self {
            exposure: settings.initial_exposure,
            key_value: settings.exposure_key_value,
            decay_rate: settings.exposure_decay_rate,
            min_luminance: settings.min_luminance,
        }
    }

    #[inline]
    #[must_use]
    pub fn exposure(&self) -> f32 {
        self.exposure
    }

    pub fn set_exposure(&mut self, exposure: f32) {
        self.exposure = exposure;
    }

    /// Exposure that maps `average` to the key value.
    #[must_use]
    pub fn target(&self, average: Vec3) -> f32 {
        self.key_value / luminance(average).max(self.min_luminance)
    }

    /// Moves the exposure toward the target for `average` over `dt` seconds.
    pub fn update(&mut self, average: Vec3, dt: f32) -> f32 {
        let target = self.target(average);
        let blend = 1.0 - (-dt.max(0.0) * self.decay_rate).exp();
        self.exposure += (target - self.exposure) * blend;
        self.exposure
    }
}

/// Formats whose texels [`decode_texel`] can turn back into a color.
#[must_use]
pub fn is_readable_format(format: wgpu::TextureFormat) -> bool {
    matches!(
        format,
        wgpu::TextureFormat::Rgba16Float | wgpu::TextureFormat::Rgba32Float
    )
}

/// Decodes the first texel of a readback row.
#[must_use]
pub fn decode_texel(format: wgpu::TextureFormat, bytes: &[u8]) -> Option<Vec3> {
    match format {
        wgpu::TextureFormat::Rgba16Float => {
            let channel = |i: usize| {
                let raw = bytes.get(i * 2..i * 2 + 2)?;
                Some(f16::from_le_bytes([raw[0], raw[1]]).to_f32())
            };
            Some(Vec3::new(channel(0)?, channel(1)?, channel(2)?))
        }
        wgpu::TextureFormat::Rgba32Float => {
            let channel = |i: usize| {
                let raw = bytes.get(i * 4..i * 4 + 4)?;
                Some(f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
            };
            Some(Vec3::new(channel(0)?, channel(1)?, channel(2)?))
        }
        _ => None,
    }
}

enum ReadbackState {
    Idle,
    Copied,
    Mapping(flume::Receiver<std::result::Result<(), wgpu::BufferAsyncError>>),
}

/// Non-blocking copy of the smallest mip level back to the CPU.
pub struct ExposureReadback {
    buffer: wgpu::Buffer,
    format: wgpu::TextureFormat,
    state: ReadbackState,
}

impl ExposureReadback {
    #[must_use]
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Exposure Readback"),
            size: u64::from(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        Self {
            buffer,
            format,
            state: ReadbackState::Idle,
        }
    }

    /// Encodes a copy of the 1×1 level unless a previous copy is still in flight.
    pub fn encode_copy(&mut self, encoder: &mut wgpu::CommandEncoder, chain: &MipChain) {
        if !matches!(self.state, ReadbackState::Idle) {
            return;
        }
        encoder.copy_texture_to_buffer(
            chain.smallest().texture().as_image_copy(),
            wgpu::TexelCopyBufferInfo {
                buffer: &self.buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT),
                    rows_per_image: None,
                },
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
        self.state = ReadbackState::Copied;
    }

    /// Starts mapping the buffer once the copy has been submitted.
    pub fn after_submit(&mut self) {
        if !matches!(self.state, ReadbackState::Copied) {
            return;
        }
        let (sender, receiver) = flume::bounded(1);
        self.buffer.slice(..).map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.state = ReadbackState::Mapping(receiver);
    }

    /// Returns the average color if a mapping has completed since the last call.
    pub fn try_take(&mut self, device: &wgpu::Device) -> Result<Option<Vec3>> {
        let ReadbackState::Mapping(receiver) = &self.state else {
            return Ok(None);
        };
        if let Err(e) = device.poll(wgpu::PollType::Poll) {
            log::warn!("Device poll failed during exposure readback: {e}");
        }

        match receiver.try_recv() {
            Ok(Ok(())) => {
                let average = {
                    let mapped = self.buffer.slice(..).get_mapped_range();
                    decode_texel(self.format, &mapped)
                };
                self.buffer.unmap();
                self.state = ReadbackState::Idle;
                average
                    .map(Some)
                    .ok_or_else(|| RenderError::Readback(format!("unsupported format {:?}", self.format)))
            }
            Ok(Err(e)) => {
                self.state = ReadbackState::Idle;
                Err(RenderError::Readback(e.to_string()))
            }
            Err(flume::TryRecvError::Empty) => Ok(None),
            Err(flume::TryRecvError::Disconnected) => {
                self.state = ReadbackState::Idle;
                Err(RenderError::Readback("mapping callback dropped".to_string()))
            }
        }
    }
}
