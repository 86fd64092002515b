//! Scene management system
//!
//! A scene is a tree of [`TransformNode`]s stored in a [`SceneGraph`] arena and
//! addressed by [`NodeId`] handles. Each node owns its children (removing a
//! node destroys its subtree) and refers to its parent by handle only.
//!
//! ## World matrix caching
//!
//! Every node caches its world matrix together with a dirty flag. The tree
//! maintains one invariant: a dirty node only has dirty descendants. That lets
//! invalidation stop descending as soon as it meets a node that is already
//! dirty, and lets [`SceneGraph::world_matrix`] walk upward only until it
//! finds a clean ancestor.

mod node;
mod renderable;
mod scene_graph;

pub use node::TransformNode;
pub use renderable::Renderable;
pub use scene_graph::SceneGraph;

use thiserror::Error;

slotmap::new_key_type! {
    /// Handle to a node stored in a [`SceneGraph`]
    pub struct NodeId;
}

/// Scene graph errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    /// Attaching `child` under `parent` would create a cycle
    #[error("cannot attach {child:?} under {parent:?}: child is an ancestor of the parent")]
    Cycle {
        /// Intended parent
        parent: NodeId,
        /// Intended child
        child: NodeId,
    },

    /// The handle does not refer to a live node
    #[error("node {0:?} does not exist")]
    InvalidNode(NodeId),

    /// `child` is not a direct child of `parent`
    #[error("{child:?} is not a child of {parent:?}")]
    NotAChild {
        /// Expected parent
        parent: NodeId,
        /// Node that was expected to be a child
        child: NodeId,
    },
}
