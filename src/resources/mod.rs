//! GPU-facing resources supplied by the mesh/texture provider
//!
//! - [`Material`]: material descriptor read by the shading variants
//! - [`Mesh`]: ready-to-bind vertex and index buffers
//! - [`Texture`]: owned texture + view, with 2D/cube kind checks

pub mod material;
pub mod mesh;
pub mod texture;

pub use material::{BaseColor, Material, NormalMap, TextureSlot};
pub use mesh::Mesh;
pub use texture::{Texture, TextureHandle, TextureKind, TextureStore};
