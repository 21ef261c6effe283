use crate::scene::NodeHandle;
use crate::scene::camera::Camera;
use crate::scene::light::{PointLight, SpotLight};
use crate::scene::transform::Transform;

/// Per-variant payload carried by a [`Node`].
///
/// Every variant participates in transform invalidation through
/// [`NodeKind::on_transform_invalidated`]; the tree calls it on each node it
/// marks dirty, so variants with derived spatial state can drop their caches.
#[derive(Debug, Clone, Default)]
pub enum NodeKind {
    /// Pure spatial grouping node.
    #[default]
    Empty,
    Camera(Camera),
    PointLight(PointLight),
    SpotLight(SpotLight),
}

impl NodeKind {
    /// Hook invoked whenever this node's global transform may have changed.
    pub(crate) fn on_transform_invalidated(&mut self) {
        match self {
            NodeKind::Camera(camera) => camera.invalidate_view(),
            NodeKind::Empty | NodeKind::PointLight(_) | NodeKind::SpotLight(_) => {}
        }
    }

    #[must_use]
    pub fn as_camera(&self) -> Option<&Camera> {
        match self {
            NodeKind::Camera(camera) => Some(camera),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_camera_mut(&mut self) -> Option<&mut Camera> {
        match self {
            NodeKind::Camera(camera) => Some(camera),
            _ => None,
        }
    }
}

/// A node of the scene hierarchy.
///
/// # Hierarchy
///
/// - `parent`: non-owning handle to the parent (None for roots), used only for
///   matrix composition and lookup
/// - `children`: ordered handles of exclusively owned children; removing a
///   child from its parent destroys its whole subtree
///
/// Hierarchy fields are only mutated through [`SceneTree`](super::SceneTree),
/// which keeps both sides in sync.
#[derive(Debug, Clone)]
pub struct Node {
    pub name: Option<String>,

    pub(crate) parent: Option<NodeHandle>,
    pub(crate) children: Vec<NodeHandle>,

    pub(crate) transform: Transform,
    pub kind: NodeKind,
}

impl Node {
    /// Creates a detached node with an identity transform.
    #[must_use]
    pub fn new(kind: NodeKind) -> Self {
        Self {
            name: None,
            parent: None,
            children: Vec::new(),
            transform: Transform::new(),
            kind,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<NodeHandle> {
        self.parent
    }

    #[inline]
    #[must_use]
    pub fn children(&self) -> &[NodeHandle] {
        &self.children
    }

    #[inline]
    #[must_use]
    pub fn transform(&self) -> &Transform {
        &self.transform
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new(NodeKind::Empty)
    }
}
