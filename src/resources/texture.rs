//! GPU texture handles
//!
//! [`Texture`] owns a `wgpu::Texture` together with its default view and
//! releases both when dropped. Textures supplied by the mesh/texture
//! provider are stored in a [`TextureStore`] and referenced from materials by
//! [`TextureHandle`].

use glam::UVec2;
use slotmap::{SlotMap, new_key_type};

use crate::errors::{RenderError, Result};

new_key_type! {
    pub struct TextureHandle;
}

/// Shape of a texture resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    D2,
    Cube,
}

impl TextureKind {
    #[inline]
    #[must_use]
    pub fn is_cubemap(self) -> bool {
        matches!(self, TextureKind::Cube)
    }

    /// Fails with [`RenderError::NotACubemap`] unless this is a cubemap.
    pub fn require_cubemap(self, operation: &'static str) -> Result<()> {
        if self.is_cubemap() {
            Ok(())
        } else {
            Err(RenderError::NotACubemap { operation })
        }
    }

    /// Fails with [`RenderError::IsACubemap`] when this is a cubemap.
    pub fn require_2d(self, operation: &'static str) -> Result<()> {
        if self.is_cubemap() {
            Err(RenderError::IsACubemap { operation })
        } else {
            Ok(())
        }
    }
}

#[derive(Debug)]
pub struct Texture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    kind: TextureKind,
}

impl Texture {
    /// Wraps a texture created elsewhere. Six-layer textures are treated as cubemaps.
    #[must_use]
    pub fn from_wgpu(texture: wgpu::Texture) -> Self {
        let kind = if texture.depth_or_array_layers() == 6 {
            TextureKind::Cube
        } else {
            TextureKind::D2
        };
        let dimension = match kind {
            TextureKind::D2 => wgpu::TextureViewDimension::D2,
            TextureKind::Cube => wgpu::TextureViewDimension::Cube,
        };
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            dimension: Some(dimension),
            ..Default::default()
        });
        Self { texture, view, kind }
    }

    /// Allocates a single-level 2D texture.
    #[must_use]
    pub fn new_2d(
        device: &wgpu::Device,
        label: &str,
        size: UVec2,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size.x.max(1),
                height: size.y.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        Self::from_wgpu(texture)
    }

    /// Uploads tightly packed RGBA8 pixels into a new 2D texture.
    #[must_use]
    pub fn from_rgba8(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
        size: UVec2,
        pixels: &[u8],
    ) -> Self {
        let texture = Self::new_2d(
            device,
            label,
            size,
            wgpu::TextureFormat::Rgba8UnormSrgb,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        );
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * size.x),
                rows_per_image: Some(size.y),
            },
            texture.texture.size(),
        );
        texture
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> TextureKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> UVec2 {
        UVec2::new(self.texture.width(), self.texture.height())
    }

    #[inline]
    #[must_use]
    pub fn format(&self) -> wgpu::TextureFormat {
        self.texture.format()
    }

    #[inline]
    #[must_use]
    pub fn raw(&self) -> &wgpu::Texture {
        &self.texture
    }

    /// The 2D view used for sampling.
    pub fn view_2d(&self, operation: &'static str) -> Result<&wgpu::TextureView> {
        self.kind.require_2d(operation)?;
        Ok(&self.view)
    }

    /// The cube view used for environment sampling.
    pub fn cube_view(&self, operation: &'static str) -> Result<&wgpu::TextureView> {
        self.kind.require_cubemap(operation)?;
        Ok(&self.view)
    }

    /// A view of a single array layer of a cubemap, usable as a render attachment.
    pub fn cube_face_view(&self, face: u32) -> Result<wgpu::TextureView> {
        self.kind.require_cubemap("render to a cubemap face")?;
        Ok(self.texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Cubemap Face"),
            dimension: Some(wgpu::TextureViewDimension::D2),
            base_array_layer: face,
            array_layer_count: Some(1),
            ..Default::default()
        }))
    }
}

/// Textures handed over by the mesh/texture provider.
#[derive(Debug, Default)]
pub struct TextureStore {
    textures: SlotMap<TextureHandle, Texture>,
}

impl TextureStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, texture: Texture) -> TextureHandle {
        self.textures.insert(texture)
    }

    #[must_use]
    pub fn get(&self, handle: TextureHandle) -> Option<&Texture> {
        self.textures.get(handle)
    }

    pub fn remove(&mut self, handle: TextureHandle) -> Option<Texture> {
        self.textures.remove(handle)
    }
}
