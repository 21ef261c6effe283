//! Scene hierarchy
//!
//! - [`Transform`]: local TRS parameters with a cached local matrix
//! - [`Node`]: hierarchy links, transform and a per-variant payload
//! - [`SceneTree`]: arena that owns every node and propagates invalidation
//! - [`Camera`], [`PointLight`], [`SpotLight`]: node payloads

pub mod camera;
pub mod light;
pub mod node;
pub mod transform;
pub mod tree;

pub use camera::Camera;
pub use light::{LightContext, LightSample, PointLight, SpotLight};
pub use node::{Node, NodeKind};
pub use transform::Transform;
pub use tree::SceneTree;

use slotmap::new_key_type;

new_key_type! {
    pub struct NodeHandle;
}
