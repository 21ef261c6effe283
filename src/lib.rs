#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod app;
pub mod errors;
pub mod renderer;
pub mod resources;
pub mod scene;
pub mod utils;

pub use app::{FrameDriver, FrameTarget, SurfaceHost};
pub use errors::{RenderError, Result};
pub use renderer::{
    DrawOrderRegistry, Drawable, DrawableId, MeshDrawable, PassKind, Renderer, RendererSettings,
};
pub use renderer::pipeline::{ProgramId, ShaderLoader, ShaderVariantCache, VariantFlags, VariantKey};
pub use resources::{Material, Mesh, Texture, TextureHandle};
pub use scene::{Camera, LightContext, Node, NodeHandle, NodeKind, PointLight, SceneTree, SpotLight};
