//! Transform node stored in the scene graph arena

use std::cell::Cell;
use std::fmt;

use super::{NodeId, Renderable};
use crate::foundation::math::{Mat4, Transform};

/// A node in the transform hierarchy
///
/// Holds the local transform relative to the parent, the cached world matrix
/// and the hierarchy links. Nodes are created and linked through
/// [`SceneGraph`](super::SceneGraph); the cache is only written by
/// [`SceneGraph::world_matrix`](super::SceneGraph::world_matrix).
pub struct TransformNode {
    pub(crate) name: String,
    pub(crate) local: Transform,
    pub(crate) world: Cell<Mat4>,
    pub(crate) dirty: Cell<bool>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) visible: bool,
    pub(crate) renderable: Option<Box<dyn Renderable>>,
}

impl TransformNode {
    pub(crate) fn new(name: impl Into<String>, local: Transform) -> Self {
        Self {
            name: name.into(),
            local,
            world: Cell::new(Mat4::identity()),
            dirty: Cell::new(true),
            parent: None,
            children: Vec::new(),
            visible: true,
            renderable: None,
        }
    }

    /// Node name, for debugging and lookup
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Transform relative to the parent
    pub fn local_transform(&self) -> &Transform {
        &self.local
    }

    /// Local transform as a matrix
    pub fn local_matrix(&self) -> Mat4 {
        self.local.to_matrix()
    }

    /// Parent handle, `None` for a root
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in attach order
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Whether the cached world matrix must be recomputed
    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// Whether this node and its subtree are drawn
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Whether a render callback is attached
    pub fn has_renderable(&self) -> bool {
        self.renderable.is_some()
    }
}

impl fmt::Debug for TransformNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformNode")
            .field("name", &self.name)
            .field("local", &self.local)
            .field("dirty", &self.dirty.get())
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("visible", &self.visible)
            .field("renderable", &self.renderable.is_some())
            .finish()
    }
}
