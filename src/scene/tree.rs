use glam::{Mat4, Quat, Vec3};
use slotmap::SlotMap;

use crate::errors::{RenderError, Result};
use crate::scene::NodeHandle;
use crate::scene::light::{LightContext, LightSample};
use crate::scene::node::{Node, NodeKind};

/// Scene hierarchy arena.
///
/// Nodes live in a generational arena; a parent exclusively owns its
/// children (removing a child destroys its subtree) while the parent link of
/// each node is a plain handle used for composition and lookup only.
///
/// Transform setters go through the tree so the node and every descendant
/// are invalidated in one place, with each node's variant hook invoked on
/// the way.
#[derive(Debug, Default)]
pub struct SceneTree {
    nodes: SlotMap<NodeHandle, Node>,
    roots: Vec<NodeHandle>,
}

impl SceneTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Hierarchy
    // ========================================================================

    /// Inserts `node` as a new root.
    pub fn add_root(&mut self, mut node: Node) -> NodeHandle {
        node.parent = None;
        node.children.clear();
        let handle = self.nodes.insert(node);
        self.roots.push(handle);
        handle
    }

    /// Moves `node` into the tree as the last child of `parent`.
    pub fn add_child(&mut self, parent: NodeHandle, mut node: Node) -> Result<NodeHandle> {
        if !self.nodes.contains_key(parent) {
            return Err(RenderError::NodeNotFound(format!("parent {parent:?}")));
        }
        node.parent = Some(parent);
        node.children.clear();
        // A freshly attached node composes with a new parent chain.
        node.transform.mark_dirty();
        node.kind.on_transform_invalidated();

        let handle = self.nodes.insert(node);
        if let Some(parent_node) = self.nodes.get_mut(parent) {
            parent_node.children.push(handle);
        }
        Ok(handle)
    }

    /// Removes `child` from `parent` and destroys the whole subtree.
    ///
    /// Fails with [`RenderError::NodeNotFound`] when `child` is not one of
    /// `parent`'s children; sibling order is untouched in that case.
    pub fn remove_child(&mut self, parent: NodeHandle, child: NodeHandle) -> Result<()> {
        let parent_node = self
            .nodes
            .get_mut(parent)
            .ok_or_else(|| RenderError::NodeNotFound(format!("parent {parent:?}")))?;
        let position = parent_node
            .children
            .iter()
            .position(|&c| c == child)
            .ok_or_else(|| RenderError::NodeNotFound(format!("{child:?} is not a child of {parent:?}")))?;
        parent_node.children.remove(position);
        self.destroy_subtree(child);
        Ok(())
    }

    /// Removes the `index`-th child of `parent` and destroys its subtree.
    pub fn remove_child_at(&mut self, parent: NodeHandle, index: usize) -> Result<()> {
        let parent_node = self
            .nodes
            .get_mut(parent)
            .ok_or_else(|| RenderError::NodeNotFound(format!("parent {parent:?}")))?;
        if index >= parent_node.children.len() {
            return Err(RenderError::NodeNotFound(format!(
                "child index {index} out of range for {parent:?} ({} children)",
                parent_node.children.len()
            )));
        }
        let child = parent_node.children.remove(index);
        self.destroy_subtree(child);
        Ok(())
    }

    /// Removes a root node and destroys its subtree.
    pub fn remove_root(&mut self, root: NodeHandle) -> Result<()> {
        let position = self
            .roots
            .iter()
            .position(|&r| r == root)
            .ok_or_else(|| RenderError::NodeNotFound(format!("root {root:?}")))?;
        self.roots.remove(position);
        self.destroy_subtree(root);
        Ok(())
    }

    fn destroy_subtree(&mut self, handle: NodeHandle) {
        let mut stack = vec![handle];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(current) {
                stack.extend(node.children);
            }
        }
    }

    // ========================================================================
    // Access
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn get(&self, handle: NodeHandle) -> Option<&Node> {
        self.nodes.get(handle)
    }

    /// Mutable access to the node payload.
    ///
    /// Spatial parameters are not reachable from here; use the tree's
    /// setters so descendants are invalidated.
    #[inline]
    pub fn kind_mut(&mut self, handle: NodeHandle) -> Option<&mut NodeKind> {
        self.nodes.get_mut(handle).map(|n| &mut n.kind)
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, handle: NodeHandle) -> bool {
        self.nodes.contains_key(handle)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn roots(&self) -> &[NodeHandle] {
        &self.roots
    }

    fn node_mut(&mut self, handle: NodeHandle) -> Result<&mut Node> {
        self.nodes
            .get_mut(handle)
            .ok_or_else(|| RenderError::NodeNotFound(format!("{handle:?}")))
    }

    // ========================================================================
    // Transform
    // ========================================================================

    pub fn set_translation(&mut self, handle: NodeHandle, translation: Vec3) -> Result<()> {
        self.node_mut(handle)?.transform.set_translation(translation);
        self.invalidate_subtree(handle);
        Ok(())
    }

    pub fn set_scale(&mut self, handle: NodeHandle, scale: Vec3) -> Result<()> {
        self.node_mut(handle)?.transform.set_scale(scale);
        self.invalidate_subtree(handle);
        Ok(())
    }

    pub fn set_rotation(&mut self, handle: NodeHandle, rotation: Quat) -> Result<()> {
        self.node_mut(handle)?.transform.set_rotation(rotation);
        self.invalidate_subtree(handle);
        Ok(())
    }

    /// Equivalent to `set_translation(current + delta)`.
    pub fn translate(&mut self, handle: NodeHandle, delta: Vec3) -> Result<()> {
        let current = self.node_mut(handle)?.transform.translation();
        self.set_translation(handle, current + delta)
    }

    /// Marks `handle` and every descendant dirty. Ancestors are never touched.
    fn invalidate_subtree(&mut self, handle: NodeHandle) {
        let mut stack = vec![handle];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get_mut(current) else {
                continue;
            };
            node.transform.mark_dirty();
            node.kind.on_transform_invalidated();
            stack.extend_from_slice(&node.children);
        }
    }

    /// Returns the node's local matrix, rebuilding the cache when dirty.
    pub fn local_matrix(&mut self, handle: NodeHandle) -> Result<Mat4> {
        Ok(self.node_mut(handle)?.transform.local_matrix())
    }

    /// Returns `parent.global · local`, or the local matrix at a root.
    ///
    /// The global matrix is not cached; each call walks the ancestor chain
    /// and composes the (cached) local matrices from the root down.
    pub fn global_matrix(&mut self, handle: NodeHandle) -> Result<Mat4> {
        let mut chain = Vec::new();
        let mut cursor = Some(handle);
        while let Some(current) = cursor {
            let node = self
                .nodes
                .get(current)
                .ok_or_else(|| RenderError::NodeNotFound(format!("{current:?}")))?;
            chain.push(current);
            cursor = node.parent;
        }

        let mut global = Mat4::IDENTITY;
        for &current in chain.iter().rev() {
            global *= self.node_mut(current)?.transform.local_matrix();
        }
        Ok(global)
    }

    // ========================================================================
    // Cameras & Lights
    // ========================================================================

    /// View matrix of a camera node (inverse of its global matrix), cached
    /// until the node or an ancestor moves.
    pub fn view_matrix(&mut self, camera: NodeHandle) -> Result<Mat4> {
        let cached = match &self.node_mut(camera)?.kind {
            NodeKind::Camera(cam) => cam.view_valid.then_some(cam.view_matrix),
            _ => return Err(RenderError::NodeNotFound(format!("{camera:?} is not a camera"))),
        };
        if let Some(view) = cached {
            return Ok(view);
        }

        let view = self.global_matrix(camera)?.inverse();
        if let Some(cam) = self.node_mut(camera)?.kind.as_camera_mut() {
            cam.view_matrix = view;
            cam.view_valid = true;
        }
        Ok(view)
    }

    /// Projection matrix of a camera node.
    pub fn projection_matrix(&mut self, camera: NodeHandle) -> Result<Mat4> {
        self.node_mut(camera)?
            .kind
            .as_camera_mut()
            .map(super::Camera::projection_matrix)
            .ok_or_else(|| RenderError::NodeNotFound(format!("{camera:?} is not a camera")))
    }

    /// Gathers every point and spot light, in depth-first tree order, with
    /// its global position.
    pub fn collect_lights(&mut self) -> LightContext {
        let mut context = LightContext::new();

        let mut stack: Vec<NodeHandle> = self.roots.iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(current) else {
                continue;
            };
            let color = match &node.kind {
                NodeKind::PointLight(light) => Some((true, light.color)),
                NodeKind::SpotLight(light) => Some((false, light.color)),
                _ => None,
            };
            stack.extend(node.children.iter().rev());

            if let Some((is_point, color)) = color
                && let Ok(global) = self.global_matrix(current)
            {
                let sample = LightSample::new(global.w_axis.truncate(), color);
                if is_point {
                    context.point_lights.push(sample);
                } else {
                    context.spot_lights.push(sample);
                }
            }
        }

        context
    }
}
