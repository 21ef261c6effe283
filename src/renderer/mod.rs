//! Rendering System
//!
//! Per frame, in order:
//!
//! 1. **Acquire** the surface texture (a lost surface is reconfigured and the
//!    frame skipped)
//! 2. **Draw**: the [`DrawOrderRegistry`] walks its scene and overlay
//!    sequences; each drawable resolves its shading variant through the
//!    [`ShaderVariantCache`](pipeline::ShaderVariantCache) and records into
//!    the [`FrameRecorder`], which is then replayed into the HDR target
//! 3. **Post**: [`HdrPipeline`] generates LODs, adapts exposure, adds bloom and
//!    composites into the surface
//! 4. **Present**
//!
//! # Module Structure
//!
//! - [`draw_order`]: registry and the [`Drawable`] seam
//! - [`draw_list`]: prepare/execute recording of the frame passes
//! - [`pipeline`]: shader loading, variant keys and the variant cache
//! - [`post`]: mip chain, exposure, bloom, composite
//! - [`settings`]: [`RendererSettings`]
//! - [`skybox`]: cubemaps, panorama baking and the [`Skybox`] background

pub mod context;
pub mod draw_list;
pub mod draw_order;
pub mod mesh_drawable;
pub mod pipeline;
pub mod post;
pub mod settings;
pub mod skybox;

pub use context::WgpuContext;
pub use draw_list::{BackgroundCommand, DrawCommand, FrameRecorder, PassTargets};
pub use draw_order::{DrawOrderRegistry, Drawable, DrawableId, FrameContext, PassKind, PassRecorder};
pub use mesh_drawable::MeshDrawable;
pub use post::HdrPipeline;
pub use settings::{HDR_TEXTURE_FORMAT, PostProcessSettings, PowerPreference, RendererSettings};
pub use skybox::{CubeFace, Cubemap, Skybox};

use glam::UVec2;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::errors::Result;
use crate::renderer::pipeline::ShaderLoader;
use crate::resources::TextureStore;
use crate::scene::{NodeHandle, SceneTree};

pub struct Renderer {
    context: WgpuContext,
    settings: RendererSettings,

    recorder: FrameRecorder,
    registry: DrawOrderRegistry<FrameRecorder>,
    post: HdrPipeline,
}

impl Renderer {
    /// Creates the GPU context and every pipeline-level resource.
    ///
    /// The shader loader is built once here and shared by the variant cache
    /// and the post chain.
    pub async fn new<W>(window: W, size: UVec2, settings: RendererSettings) -> Result<Self>
    where
        W: HasWindowHandle + HasDisplayHandle + Send + Sync + 'static,
    {
        settings.validate()?;
        let context = WgpuContext::new(window, &settings, size).await?;
        let loader = ShaderLoader::new(settings.shader_root.clone());

        let recorder = FrameRecorder::new(
            &context.device,
            &context.queue,
            loader.clone(),
            settings.hdr_format,
            settings.depth_format,
        );
        let post = HdrPipeline::new(
            &context.device,
            &context.queue,
            loader,
            &settings,
            context.size(),
            context.color_format(),
        )?;

        Ok(Self {
            context,
            settings,
            recorder,
            registry: DrawOrderRegistry::new(),
            post,
        })
    }

    /// Blocking variant of [`new`](Self::new) for hosts without an executor.
    pub fn new_blocking<W>(window: W, size: UVec2, settings: RendererSettings) -> Result<Self>
    where
        W: HasWindowHandle + HasDisplayHandle + Send + Sync + 'static,
    {
        pollster::block_on(Self::new(window, size, settings))
    }

    pub fn register_drawable(&mut self, drawable: Box<dyn Drawable<FrameRecorder>>, overlay: bool) -> DrawableId {
        self.registry.register(drawable, overlay)
    }

    /// Unknown ids are a no-op.
    pub fn unregister_drawable(&mut self, id: DrawableId) -> Option<Box<dyn Drawable<FrameRecorder>>> {
        self.registry.unregister(id)
    }

    /// Draws `scene` from `camera` and presents.
    ///
    /// Returns `Ok(false)` when the frame was skipped because the surface had
    /// to be reconfigured.
    pub fn render_frame(&mut self, scene: &mut SceneTree, camera: NodeHandle, dt: f32) -> Result<bool> {
        let Some(output) = self.context.acquire()? else {
            return Ok(false);
        };
        let surface_view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let view = scene.view_matrix(camera)?;
        let proj = scene.projection_matrix(camera)?;
        let mut lights = scene.collect_lights();

        self.recorder.begin_frame();
        self.registry
            .draw_frame(&mut self.recorder, scene, view, proj, &mut lights)?;

        let device = &self.context.device;
        let queue = &self.context.queue;
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Frame Encoder"),
        });

        self.recorder.execute(
            queue,
            &mut encoder,
            &PassTargets {
                color: self.post.color_view(),
                depth: self.post.depth_view(),
                clear_color: self.settings.wgpu_clear_color(),
            },
        );
        self.post.run(device, queue, &mut encoder, &surface_view, dt);

        queue.submit(Some(encoder.finish()));
        self.post.after_submit();
        output.present();
        Ok(true)
    }

    /// Resizes the surface and the HDR chain. Zero-sized requests (minimized
    /// windows) are ignored.
    pub fn resize(&mut self, size: UVec2) -> Result<()> {
        if size.x == 0 || size.y == 0 {
            return Ok(());
        }
        log::info!("Resizing to {}x{}", size.x, size.y);
        self.context.resize(size);
        self.post.resize(&self.context.device, size)
    }

    pub fn set_bloom_enabled(&mut self, enabled: bool) -> Result<()> {
        self.settings.post.bloom_enabled = enabled;
        self.post.set_bloom_enabled(&self.context.device, enabled)
    }

    #[inline]
    #[must_use]
    pub fn exposure(&self) -> f32 {
        self.post.exposure()
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> UVec2 {
        self.context.size()
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    #[inline]
    #[must_use]
    pub fn device(&self) -> &wgpu::Device {
        &self.context.device
    }

    #[inline]
    #[must_use]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.context.queue
    }

    /// Textures that materials may reference by handle.
    #[inline]
    pub fn textures_mut(&mut self) -> &mut TextureStore {
        self.recorder.textures_mut()
    }

    #[inline]
    #[must_use]
    pub fn drawable_count(&self) -> usize {
        self.registry.len()
    }

    /// Compiled shading variants so far.
    #[inline]
    #[must_use]
    pub fn variant_count(&self) -> usize {
        self.recorder.variants.len()
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("size", &self.size())
            .field("drawables", &self.registry.len())
            .field("variants", &self.recorder.variants.len())
            .finish_non_exhaustive()
    }
}

