//! Scene graph arena
//!
//! Owns every [`TransformNode`] and implements hierarchy edits, lazy world
//! matrix evaluation and render traversal.

use slotmap::SlotMap;

use super::{NodeId, Renderable, SceneError, TransformNode};
use crate::foundation::math::{Mat4, Quat, Transform, Vec3};
use crate::render::gpu::{GpuCommands, MatrixMode, MatrixScope};

/// Arena of transform nodes forming a forest of trees
///
/// Any node without a parent is a root. Viewports render from a chosen root
/// and cameras keep their transform in a node of the same graph.
#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: SlotMap<NodeId, TransformNode>,
}

impl SceneGraph {
    /// Create an empty scene graph
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
        }
    }

    /// Create a standalone root node with an identity transform
    pub fn create_node(&mut self, name: impl Into<String>) -> NodeId {
        self.create_node_with(name, Transform::identity())
    }

    /// Create a standalone root node with the given local transform
    pub fn create_node_with(&mut self, name: impl Into<String>, local: Transform) -> NodeId {
        let id = self.nodes.insert(TransformNode::new(name, local));
        log::trace!("Created scene node {:?}", id);
        id
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph holds no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether `id` refers to a live node
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Borrow a node
    pub fn node(&self, id: NodeId) -> Result<&TransformNode, SceneError> {
        self.nodes.get(id).ok_or(SceneError::InvalidNode(id))
    }

    /// Find the first node with the given name
    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|(_, node)| node.name == name)
            .map(|(id, _)| id)
    }

    /// Parent of a node
    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>, SceneError> {
        Ok(self.node(id)?.parent)
    }

    /// Children of a node in attach order
    pub fn children(&self, id: NodeId) -> Result<&[NodeId], SceneError> {
        Ok(&self.node(id)?.children)
    }

    /// Local transform of a node
    pub fn local_transform(&self, id: NodeId) -> Result<Transform, SceneError> {
        Ok(self.node(id)?.local)
    }

    /// Replace a node's local transform
    ///
    /// Only flags the node and its descendants dirty; matrices are recomputed
    /// on the next [`SceneGraph::world_matrix`] call.
    pub fn set_local_transform(
        &mut self,
        id: NodeId,
        translation: Vec3,
        rotation: Quat,
        scale: Vec3,
    ) -> Result<(), SceneError> {
        self.set_transform(id, Transform::new(translation, rotation, scale))
    }

    /// Replace a node's local transform with a prepared [`Transform`]
    pub fn set_transform(&mut self, id: NodeId, local: Transform) -> Result<(), SceneError> {
        let node = self.nodes.get_mut(id).ok_or(SceneError::InvalidNode(id))?;
        node.local = local;
        self.mark_dirty(id);
        Ok(())
    }

    /// Change only the translation of a node
    pub fn set_translation(&mut self, id: NodeId, translation: Vec3) -> Result<(), SceneError> {
        let local = Transform {
            translation,
            ..self.local_transform(id)?
        };
        self.set_transform(id, local)
    }

    /// Change only the rotation of a node
    pub fn set_rotation(&mut self, id: NodeId, rotation: Quat) -> Result<(), SceneError> {
        let local = Transform {
            rotation,
            ..self.local_transform(id)?
        };
        self.set_transform(id, local)
    }

    /// Show or hide a node and its subtree during rendering
    pub fn set_visible(&mut self, id: NodeId, visible: bool) -> Result<(), SceneError> {
        self.nodes.get_mut(id).ok_or(SceneError::InvalidNode(id))?.visible = visible;
        Ok(())
    }

    /// Attach a render callback to a node, replacing any previous one
    pub fn set_renderable(
        &mut self,
        id: NodeId,
        renderable: impl Renderable + 'static,
    ) -> Result<(), SceneError> {
        let node = self.nodes.get_mut(id).ok_or(SceneError::InvalidNode(id))?;
        node.renderable = Some(Box::new(renderable));
        Ok(())
    }

    /// Remove a node's render callback
    pub fn clear_renderable(
        &mut self,
        id: NodeId,
    ) -> Result<Option<Box<dyn Renderable>>, SceneError> {
        Ok(self.nodes.get_mut(id).ok_or(SceneError::InvalidNode(id))?.renderable.take())
    }

    /// Whether `ancestor` lies on the parent chain of `id` (a node is its own ancestor)
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(key) = current {
            if key == ancestor {
                return true;
            }
            current = self.nodes.get(key).and_then(|node| node.parent);
        }
        false
    }

    /// Attach `child` as the last child of `parent`
    ///
    /// A child that already has a parent is moved. Fails with
    /// [`SceneError::Cycle`] if `child` is `parent` or one of its ancestors.
    pub fn attach(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        self.node(parent)?;
        let previous = self.node(child)?.parent;

        if self.is_ancestor(child, parent) {
            return Err(SceneError::Cycle { parent, child });
        }

        if let Some(previous) = previous {
            self.unlink(previous, child);
        }

        self.nodes[parent].children.push(child);
        self.nodes[child].parent = Some(parent);
        self.mark_dirty(child);

        log::debug!("Attached {:?} under {:?}", child, parent);
        Ok(())
    }

    /// Detach `child` from `parent`, leaving it as a root
    ///
    /// The detached subtree keeps its children and is flagged dirty so a
    /// later re-attach recomputes correctly.
    pub fn detach(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        self.node(parent)?;
        if self.node(child)?.parent != Some(parent) {
            return Err(SceneError::NotAChild { parent, child });
        }

        self.unlink(parent, child);
        self.nodes[child].parent = None;
        self.mark_dirty(child);

        log::debug!("Detached {:?} from {:?}", child, parent);
        Ok(())
    }

    /// Destroy a node together with its whole subtree
    ///
    /// Children that should survive must be detached or moved first.
    /// Returns the number of nodes removed.
    pub fn remove(&mut self, id: NodeId) -> Result<usize, SceneError> {
        if let Some(parent) = self.node(id)?.parent {
            self.unlink(parent, id);
        }

        let mut removed = 0;
        let mut stack = vec![id];
        while let Some(key) = stack.pop() {
            if let Some(node) = self.nodes.remove(key) {
                stack.extend(node.children);
                removed += 1;
            }
        }

        log::debug!("Removed {:?} and {} descendant(s)", id, removed - 1);
        Ok(removed)
    }

    /// World matrix of a node
    ///
    /// Returns the cached matrix when clean. Otherwise walks upward to the
    /// nearest clean ancestor (or the root), then recomputes and caches every
    /// matrix on the way back down as `parent_world * local`.
    pub fn world_matrix(&self, id: NodeId) -> Result<Mat4, SceneError> {
        let mut stale = Vec::new();
        let mut base = Mat4::identity();
        let mut current = Some(id);

        while let Some(key) = current {
            let node = self.node(key)?;
            if !node.dirty.get() {
                base = node.world.get();
                break;
            }
            stale.push(node);
            current = node.parent;
        }

        for node in stale.into_iter().rev() {
            base *= node.local.to_matrix();
            node.world.set(base);
            node.dirty.set(false);
        }

        Ok(base)
    }

    /// Whether a node's cached world matrix is stale
    pub fn is_dirty(&self, id: NodeId) -> Result<bool, SceneError> {
        Ok(self.node(id)?.dirty.get())
    }

    /// Render the subtree rooted at `root`
    ///
    /// Depth-first in child order. Invisible nodes are skipped with their
    /// subtree. For each node with a renderable, the world matrix is
    /// multiplied onto the model-view stack for the duration of its callback.
    pub fn render(&self, root: NodeId, gpu: &mut dyn GpuCommands) -> Result<(), SceneError> {
        let node = self.node(root)?;
        if !node.visible {
            return Ok(());
        }

        if let Some(renderable) = &node.renderable {
            let world = self.world_matrix(root)?;
            let mut scope = MatrixScope::multiply(gpu, MatrixMode::ModelView, &world);
            renderable.render(&mut *scope, &world);
        }

        for &child in &node.children {
            self.render(child, gpu)?;
        }
        Ok(())
    }

    /// Iterate over root nodes
    pub fn roots(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .filter(|(_, node)| node.parent.is_none())
            .map(|(id, _)| id)
    }

    fn unlink(&mut self, parent: NodeId, child: NodeId) {
        if let Some(node) = self.nodes.get_mut(parent) {
            node.children.retain(|&c| c != child);
        }
    }

    /// Flag a node and its descendants dirty, skipping subtrees that are
    /// already dirty
    fn mark_dirty(&self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(key) = stack.pop() {
            if let Some(node) = self.nodes.get(key) {
                if node.dirty.replace(true) {
                    continue;
                }
                stack.extend_from_slice(&node.children);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Point3;
    use crate::render::gpu::{CommandRecorder, GpuCommand, Primitive};
    use approx::assert_relative_eq;

    fn translated(graph: &mut SceneGraph, name: &str, x: f32, y: f32, z: f32) -> NodeId {
        graph.create_node_with(name, Transform::from_translation(Vec3::new(x, y, z)))
    }

    fn world_origin(graph: &SceneGraph, id: NodeId) -> Point3 {
        graph.world_matrix(id).unwrap().transform_point(&Point3::origin())
    }

    #[test]
    fn test_world_matrix_composes_ancestors() {
        let mut graph = SceneGraph::new();
        let root = translated(&mut graph, "root", 1.0, 0.0, 0.0);
        let child = translated(&mut graph, "child", 0.0, 2.0, 0.0);
        let leaf = translated(&mut graph, "leaf", 0.0, 0.0, 3.0);
        graph.attach(root, child).unwrap();
        graph.attach(child, leaf).unwrap();

        assert_relative_eq!(

            world_origin(&graph, leaf),

            Point3::new(1.0, 2.0, 3.0),

            epsilon = 1e-6

        );
        assert!(!graph.is_dirty(leaf).unwrap());
        assert!(!graph.is_dirty(root).unwrap());
    }

    #[test]
    fn test_parent_scale_and_rotation_apply_to_children() {
        let mut graph = SceneGraph::new();
        let root = graph.create_node_with(
            "root",
            Transform::new(
                Vec3::zeros(),
                Quat::from_axis_angle(&Vec3::z_axis(), std::f32::consts::FRAC_PI_2),
                Vec3::new(2.0, 2.0, 2.0),
            ),
        );
        let child = translated(&mut graph, "child", 1.0, 0.0, 0.0);
        graph.attach(root, child).unwrap();

        assert_relative_eq!(

            world_origin(&graph, child),

            Point3::new(0.0, 2.0, 0.0),

            epsilon = 1e-5

        );
    }

    #[test]
    fn test_set_local_transform_is_lazy() {
        let mut graph = SceneGraph::new();
        let root = graph.create_node("root");
        graph.world_matrix(root).unwrap();

        graph
            .set_local_transform(
                root,
                Vec3::new(5.0, 0.0, 0.0),
                Quat::identity(),
                Vec3::new(1.0, 1.0, 1.0),
            )
            .unwrap();
        assert!(graph.is_dirty(root).unwrap());
        assert_relative_eq!(graph.node(root).unwrap().world.get(), Mat4::identity());

        assert_relative_eq!(

            world_origin(&graph, root),

            Point3::new(5.0, 0.0, 0.0),

            epsilon = 1e-6

        );
    }

    #[test]
    fn test_mutation_invalidates_descendants_not_siblings() {
        let mut graph = SceneGraph::new();
        let root = graph.create_node("root");
        let left = translated(&mut graph, "left", -1.0, 0.0, 0.0);
        let left_leaf = translated(&mut graph, "left_leaf", 0.0, 1.0, 0.0);
        let right = translated(&mut graph, "right", 1.0, 0.0, 0.0);
        let right_leaf = translated(&mut graph, "right_leaf", 0.0, 1.0, 0.0);
        graph.attach(root, left).unwrap();
        graph.attach(left, left_leaf).unwrap();
        graph.attach(root, right).unwrap();
        graph.attach(right, right_leaf).unwrap();

        for id in [left_leaf, right_leaf] {
            graph.world_matrix(id).unwrap();
        }
        let right_before = graph.node(right_leaf).unwrap().world.get();

        graph.set_translation(left, Vec3::new(-4.0, 0.0, 0.0)).unwrap();

        assert!(graph.is_dirty(left).unwrap());
        assert!(graph.is_dirty(left_leaf).unwrap());
        assert!(!graph.is_dirty(root).unwrap());
        assert!(!graph.is_dirty(right).unwrap());
        assert!(!graph.is_dirty(right_leaf).unwrap());
        assert_eq!(graph.node(right_leaf).unwrap().world.get(), right_before);

        assert_relative_eq!(

            world_origin(&graph, left_leaf),

            Point3::new(-4.0, 1.0, 0.0),

            epsilon = 1e-6

        );
    }

    #[test]
    fn test_dirty_invariant_after_partial_evaluation() {
        let mut graph = SceneGraph::new();
        let root = graph.create_node("root");
        let mid = translated(&mut graph, "mid", 1.0, 0.0, 0.0);
        let leaf = translated(&mut graph, "leaf", 1.0, 0.0, 0.0);
        graph.attach(root, mid).unwrap();
        graph.attach(mid, leaf).unwrap();

        // evaluate only the middle node; leaf stays dirty
        graph.world_matrix(mid).unwrap();
        assert!(graph.is_dirty(leaf).unwrap());

        // the root change must still reach the leaf
        graph.set_translation(root, Vec3::new(0.0, 0.0, 10.0)).unwrap();
        assert!(graph.is_dirty(mid).unwrap());
        assert_relative_eq!(
            world_origin(&graph, leaf),
            Point3::new(2.0, 0.0, 10.0),
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_attach_rejects_cycles() {
        let mut graph = SceneGraph::new();
        let a = graph.create_node("a");
        let b = graph.create_node("b");
        let c = graph.create_node("c");
        graph.attach(a, b).unwrap();
        graph.attach(b, c).unwrap();

        assert_eq!(graph.attach(c, a), Err(SceneError::Cycle { parent: c, child: a }));
        assert_eq!(graph.attach(b, b), Err(SceneError::Cycle { parent: b, child: b }));
        assert_eq!(graph.children(c).unwrap(), &[] as &[NodeId]);
        assert_eq!(graph.parent(a).unwrap(), None);
    }

    #[test]
    fn test_attach_moves_between_parents() {
        let mut graph = SceneGraph::new();
        let first = translated(&mut graph, "first", 1.0, 0.0, 0.0);
        let second = translated(&mut graph, "second", 0.0, 5.0, 0.0);
        let child = graph.create_node("child");

        graph.attach(first, child).unwrap();
        assert_relative_eq!(
            world_origin(&graph, child),
            Point3::new(1.0, 0.0, 0.0),
            epsilon = 1e-6
        );

        graph.attach(second, child).unwrap();
        assert!(graph.children(first).unwrap().is_empty());
        assert_eq!(graph.children(second).unwrap(), &[child]);
        assert_relative_eq!(
            world_origin(&graph, child),
            Point3::new(0.0, 5.0, 0.0),
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_detach_orphans_and_marks_dirty() {
        let mut graph = SceneGraph::new();
        let root = translated(&mut graph, "root", 3.0, 0.0, 0.0);
        let child = translated(&mut graph, "child", 0.0, 1.0, 0.0);
        let grandchild = graph.create_node("grandchild");
        graph.attach(root, child).unwrap();
        graph.attach(child, grandchild).unwrap();
        graph.world_matrix(grandchild).unwrap();

        graph.detach(root, child).unwrap();
        assert_eq!(graph.parent(child).unwrap(), None);
        assert!(graph.is_dirty(child).unwrap());
        assert!(graph.is_dirty(grandchild).unwrap());
        assert_eq!(graph.children(child).unwrap(), &[grandchild]);
        assert_relative_eq!(
            world_origin(&graph, grandchild),
            Point3::new(0.0, 1.0, 0.0),
            epsilon = 1e-6
        );

        assert_eq!(
            graph.detach(root, child),
            Err(SceneError::NotAChild { parent: root, child })
        );
    }

    #[test]
    fn test_remove_destroys_subtree() {
        let mut graph = SceneGraph::new();
        let root = graph.create_node("root");
        let child = graph.create_node("child");
        let grandchild = graph.create_node("grandchild");
        let sibling = graph.create_node("sibling");
        graph.attach(root, child).unwrap();
        graph.attach(child, grandchild).unwrap();
        graph.attach(root, sibling).unwrap();

        assert_eq!(graph.remove(child).unwrap(), 2);
        assert!(!graph.contains(child));
        assert!(!graph.contains(grandchild));
        assert_eq!(graph.children(root).unwrap(), &[sibling]);
        assert_eq!(graph.world_matrix(grandchild), Err(SceneError::InvalidNode(grandchild)));
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn test_render_traverses_visible_nodes_in_order() {
        let mut graph = SceneGraph::new();
        let root = graph.create_node("root");
        let first = translated(&mut graph, "first", 1.0, 0.0, 0.0);
        let hidden = graph.create_node("hidden");
        let hidden_child = graph.create_node("hidden_child");
        let second = graph.create_node("second");
        graph.attach(root, first).unwrap();
        graph.attach(root, hidden).unwrap();
        graph.attach(hidden, hidden_child).unwrap();
        graph.attach(root, second).unwrap();

        graph.set_renderable(first, |gpu: &mut dyn GpuCommands, _: &Mat4| {
            gpu.draw_arrays(Primitive::Triangles, 0, 3);
        }).unwrap();
        graph.set_renderable(hidden_child, |gpu: &mut dyn GpuCommands, _: &Mat4| {
            gpu.draw_arrays(Primitive::Lines, 0, 2);
        }).unwrap();
        graph.set_renderable(second, |gpu: &mut dyn GpuCommands, _: &Mat4| {
            gpu.draw_arrays(Primitive::Points, 0, 1);
        }).unwrap();
        graph.set_visible(hidden, false).unwrap();

        let mut recorder = CommandRecorder::new();
        graph.render(root, &mut recorder).unwrap();

        let draws: Vec<_> = recorder
            .commands()
            .iter()
            .filter_map(|command| match command {
                GpuCommand::DrawArrays { primitive, .. } => Some(*primitive),
                _ => None,
            })
            .collect();
        assert_eq!(draws, vec![Primitive::Triangles, Primitive::Points]);
        assert!(recorder.is_balanced());

        let first_world = graph.world_matrix(first).unwrap();
        assert!(recorder
            .commands()
            .contains(&GpuCommand::MultiplyMatrix(MatrixMode::ModelView, first_world)));
    }

    #[test]
    fn test_find_by_name_and_roots() {
        let mut graph = SceneGraph::new();
        let root = graph.create_node("root");
        let child = graph.create_node("child");
        let other = graph.create_node("other_root");
        graph.attach(root, child).unwrap();

        assert_eq!(graph.find_by_name("child"), Some(child));
        assert_eq!(graph.find_by_name("missing"), None);

        let mut roots: Vec<_> = graph.roots().collect();
        roots.sort();
        let mut expected = vec![root, other];
        expected.sort();
        assert_eq!(roots, expected);
    }
}
