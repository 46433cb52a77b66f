//! Parent/child transform hierarchy stored in a `hecs` world.
//!
//! Every node is an [`Entity`] carrying a [`Transform`] and, when attached, a
//! [`Parent`] back reference. A node never owns its parent; despawning a parent
//! turns its children into roots.
//!
//! World matrices are derived on demand by walking the parent chain, so they
//! always reflect the current local transforms and parent links:
//!
//! ```text
//! world(node) = world(parent) * local(node)   // attached
//! world(node) = local(node)                   // root
//! ```
//!
//! # Example
//!
//! ```
//! use scenepick::{SceneGraph, Transform, Vec3};
//!
//! let mut graph = SceneGraph::new();
//! let a = graph.spawn(Transform::from_position(Vec3::X)).unwrap();
//! let b = graph.spawn_child(a, Transform::from_position(Vec3::Y)).unwrap();
//! let c = graph.spawn_child(b, Transform::from_position(Vec3::Z)).unwrap();
//!
//! assert!(graph.world_position(c).unwrap().abs_diff_eq(Vec3::ONE, 1e-6));
//! ```

use glam::{Mat4, Vec3};
use hecs::{Entity, World};

use crate::transform::Transform;

/// Back reference from a node to the node it is attached to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Parent(pub Entity);

/// Marks a node that [`SceneGraph::despawn`] refuses to remove.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pinned;

/// Errors returned by scene-graph mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneGraphError {
    /// The entity does not exist or is not a scene-graph node.
    NoSuchNode(Entity),
    /// A node cannot be its own parent.
    SelfParent(Entity),
    /// `parent` is a descendant of `child`; linking them would form a cycle.
    Cycle { child: Entity, parent: Entity },
    /// A transform component was NaN or infinite.
    NonFinite,
    /// The node is pinned and cannot be despawned.
    Pinned(Entity),
}

impl std::fmt::Display for SceneGraphError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SceneGraphError::NoSuchNode(e) => write!(f, "No scene node for entity {:?}", e),
            SceneGraphError::SelfParent(e) => write!(f, "Entity {:?} cannot parent itself", e),
            SceneGraphError::Cycle { child, parent } => write!(
                f,
                "Parenting {:?} to {:?} would create a cycle",
                child, parent
            ),
            SceneGraphError::NonFinite => write!(f, "Transform contains non-finite values"),
            SceneGraphError::Pinned(e) => write!(f, "Node {:?} is pinned", e),
        }
    }
}

impl std::error::Error for SceneGraphError {}

/// A tree of transforms.
///
/// The underlying [`World`] is reachable through [`SceneGraph::world`] and
/// [`SceneGraph::world_mut`] so callers can attach extra components (meshes,
/// pick ids) to the same entities.
#[derive(Default)]
pub struct SceneGraph {
    world: World,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared access to the entity world.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable access to the entity world.
    ///
    /// Inserting [`Parent`] components directly bypasses the cycle check in
    /// [`SceneGraph::set_parent`].
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Spawns a root node.
    pub fn spawn(&mut self, transform: Transform) -> Result<Entity, SceneGraphError> {
        if !transform.is_finite() {
            return Err(SceneGraphError::NonFinite);
        }
        Ok(self.world.spawn((transform,)))
    }

    /// Spawns a node attached to `parent`.
    pub fn spawn_child(
        &mut self,
        parent: Entity,
        transform: Transform,
    ) -> Result<Entity, SceneGraphError> {
        self.ensure_node(parent)?;
        if !transform.is_finite() {
            return Err(SceneGraphError::NonFinite);
        }
        Ok(self.world.spawn((transform, Parent(parent))))
    }

    /// Returns true if `node` is a live scene-graph node.
    pub fn contains(&self, node: Entity) -> bool {
        self.world.get::<&Transform>(node).is_ok()
    }

    fn ensure_node(&self, node: Entity) -> Result<(), SceneGraphError> {
        if self.contains(node) {
            Ok(())
        } else {
            Err(SceneGraphError::NoSuchNode(node))
        }
    }

    /// Attaches `child` to `parent`, or detaches it when `parent` is `None`.
    ///
    /// Only the back reference changes; the child's local transform is kept,
    /// so its world placement follows the new parent. Self-parenting and
    /// parenting to one of the child's descendants are rejected and leave the
    /// graph untouched.
    pub fn set_parent(
        &mut self,
        child: Entity,
        parent: Option<Entity>,
    ) -> Result<(), SceneGraphError> {
        self.ensure_node(child)?;

        let Some(parent) = parent else {
            // A root has no Parent component; nothing to remove is fine.
            let _ = self.world.remove_one::<Parent>(child);
            return Ok(());
        };

        self.ensure_node(parent)?;
        if parent == child {
            return Err(SceneGraphError::SelfParent(child));
        }
        if self.ancestors(parent).any(|ancestor| ancestor == child) {
            return Err(SceneGraphError::Cycle { child, parent });
        }

        self.world
            .insert_one(child, Parent(parent))
            .map_err(|_| SceneGraphError::NoSuchNode(child))
    }

    /// The node `node` is attached to, if any.
    pub fn parent(&self, node: Entity) -> Option<Entity> {
        self.world.get::<&Parent>(node).ok().map(|p| p.0)
    }

    /// Direct children of `node`, in no particular order.
    pub fn children(&self, node: Entity) -> Vec<Entity> {
        self.world
            .query::<&Parent>()
            .iter()
            .filter(|(_, parent)| parent.0 == node)
            .map(|(entity, _)| entity)
            .collect()
    }

    /// Iterates from the parent of `node` up to the root.
    ///
    /// The walk is bounded by the number of entities, so a cycle created
    /// through [`SceneGraph::world_mut`] terminates instead of spinning.
    pub fn ancestors(&self, node: Entity) -> impl Iterator<Item = Entity> + '_ {
        let limit = self.world.len() as usize;
        std::iter::successors(self.parent(node), move |&current| self.parent(current)).take(limit)
    }

    /// The local transform of `node`.
    pub fn local(&self, node: Entity) -> Result<Transform, SceneGraphError> {
        self.world
            .get::<&Transform>(node)
            .map(|t| *t)
            .map_err(|_| SceneGraphError::NoSuchNode(node))
    }

    /// Mutable access to the local transform of `node`.
    ///
    /// Unlike [`SceneGraph::set_local`], values written through this borrow
    /// are not checked for finiteness.
    pub fn local_mut(
        &mut self,
        node: Entity,
    ) -> Result<hecs::RefMut<'_, Transform>, SceneGraphError> {
        self.world
            .get::<&mut Transform>(node)
            .map_err(|_| SceneGraphError::NoSuchNode(node))
    }

    /// Replaces the local transform of `node`.
    pub fn set_local(&mut self, node: Entity, transform: Transform) -> Result<(), SceneGraphError> {
        if !transform.is_finite() {
            return Err(SceneGraphError::NonFinite);
        }
        *self.local_mut(node)? = transform;
        Ok(())
    }

    /// Local TRS matrix of `node`.
    pub fn local_matrix(&self, node: Entity) -> Result<Mat4, SceneGraphError> {
        self.local(node).map(|t| t.matrix())
    }

    /// Local-to-world matrix of `node`, composed through every ancestor.
    pub fn world_matrix(&self, node: Entity) -> Result<Mat4, SceneGraphError> {
        let mut matrix = self.local_matrix(node)?;
        for ancestor in self.ancestors(node) {
            // A dangling link (parent despawned through world_mut) ends the chain.
            let Ok(local) = self.local_matrix(ancestor) else {
                break;
            };
            matrix = local * matrix;
        }
        Ok(matrix)
    }

    /// World-space origin of `node`.
    pub fn world_position(&self, node: Entity) -> Result<Vec3, SceneGraphError> {
        self.world_matrix(node)
            .map(|m| m.transform_point3(Vec3::ZERO))
    }

    /// Keeps `node` alive: [`SceneGraph::despawn`] rejects it from now on.
    pub fn pin(&mut self, node: Entity) -> Result<(), SceneGraphError> {
        self.ensure_node(node)?;
        self.world
            .insert_one(node, Pinned)
            .map_err(|_| SceneGraphError::NoSuchNode(node))
    }

    pub fn is_pinned(&self, node: Entity) -> bool {
        self.world.get::<&Pinned>(node).is_ok()
    }

    /// Removes `node`. Its direct children become roots.
    pub fn despawn(&mut self, node: Entity) -> Result<(), SceneGraphError> {
        self.ensure_node(node)?;
        if self.is_pinned(node) {
            return Err(SceneGraphError::Pinned(node));
        }
        for child in self.children(node) {
            let _ = self.world.remove_one::<Parent>(child);
        }
        self.world
            .despawn(node)
            .map_err(|_| SceneGraphError::NoSuchNode(node))
    }

    /// Number of scene-graph nodes.
    pub fn len(&self) -> usize {
        self.world.query::<&Transform>().iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    fn assert_mat_eq(a: Mat4, b: Mat4) {
        assert!(a.abs_diff_eq(b, 1e-5), "{a:?} != {b:?}");
    }

    #[test]
    fn root_world_matrix_is_local_matrix() {
        let mut graph = SceneGraph::new();
        let t = Transform::from_position(Vec3::new(1.0, 2.0, 3.0))
            .rotation(Quat::from_rotation_z(0.3))
            .uniform_scale(1.5);
        let node = graph.spawn(t).unwrap();

        assert_mat_eq(graph.world_matrix(node).unwrap(), t.matrix());
    }

    #[test]
    fn child_world_matrix_composes_parent() {
        let mut graph = SceneGraph::new();
        let parent = graph
            .spawn(
                Transform::from_position(Vec3::new(0.0, 1.0, 0.0))
                    .rotation(Quat::from_rotation_y(1.2))
                    .scale(Vec3::new(2.0, 1.0, 0.5)),
            )
            .unwrap();
        let child = graph
            .spawn_child(
                parent,
                Transform::from_position(Vec3::new(3.0, 0.0, 0.0))
                    .rotation(Quat::from_rotation_x(0.4)),
            )
            .unwrap();

        let expected = graph.world_matrix(parent).unwrap() * graph.local_matrix(child).unwrap();
        assert_mat_eq(graph.world_matrix(child).unwrap(), expected);
    }

    #[test]
    fn three_level_chain_accumulates_translation() {
        let mut graph = SceneGraph::new();
        let a = graph.spawn(Transform::from_position(Vec3::X)).unwrap();
        let b = graph.spawn_child(a, Transform::from_position(Vec3::Y)).unwrap();
        let c = graph.spawn_child(b, Transform::from_position(Vec3::Z)).unwrap();

        let position = graph.world_position(c).unwrap();
        assert!(position.abs_diff_eq(Vec3::ONE, 1e-6));
        assert_eq!(graph.ancestors(c).collect::<Vec<_>>(), vec![b, a]);
    }

    #[test]
    fn detaching_drops_parent_influence_immediately() {
        let mut graph = SceneGraph::new();
        let parent = graph
            .spawn(Transform::from_position(Vec3::new(10.0, 0.0, 0.0)))
            .unwrap();
        let child = graph
            .spawn_child(parent, Transform::from_position(Vec3::Y))
            .unwrap();
        assert!(graph.world_position(child).unwrap().abs_diff_eq(Vec3::new(10.0, 1.0, 0.0), 1e-6));

        graph.set_parent(child, None).unwrap();

        assert_eq!(graph.parent(child), None);
        assert_mat_eq(graph.world_matrix(child).unwrap(), graph.local_matrix(child).unwrap());
    }

    #[test]
    fn moving_a_parent_moves_its_children() {
        let mut graph = SceneGraph::new();
        let parent = graph.spawn(Transform::new()).unwrap();
        let child = graph
            .spawn_child(parent, Transform::from_position(Vec3::X))
            .unwrap();

        graph.local_mut(parent).unwrap().position = Vec3::new(0.0, 0.0, -4.0);

        let position = graph.world_position(child).unwrap();
        assert!(position.abs_diff_eq(Vec3::new(1.0, 0.0, -4.0), 1e-6));
    }

    #[test]
    fn self_parenting_is_rejected() {
        let mut graph = SceneGraph::new();
        let node = graph.spawn(Transform::new()).unwrap();

        assert_eq!(
            graph.set_parent(node, Some(node)),
            Err(SceneGraphError::SelfParent(node))
        );
        assert_eq!(graph.parent(node), None);
    }

    #[test]
    fn cycles_are_rejected_and_graph_is_unchanged() {
        let mut graph = SceneGraph::new();
        let a = graph.spawn(Transform::new()).unwrap();
        let b = graph.spawn_child(a, Transform::new()).unwrap();
        let c = graph.spawn_child(b, Transform::new()).unwrap();

        assert_eq!(
            graph.set_parent(a, Some(c)),
            Err(SceneGraphError::Cycle { child: a, parent: c })
        );
        assert_eq!(graph.parent(a), None);
        assert_eq!(graph.parent(b), Some(a));
        assert_eq!(graph.parent(c), Some(b));
    }

    #[test]
    fn reparenting_between_siblings_is_allowed() {
        let mut graph = SceneGraph::new();
        let root = graph.spawn(Transform::new()).unwrap();
        let left = graph.spawn_child(root, Transform::new()).unwrap();
        let right = graph.spawn_child(root, Transform::new()).unwrap();

        graph.set_parent(right, Some(left)).unwrap();

        assert_eq!(graph.parent(right), Some(left));
        assert_eq!(graph.children(root), vec![left]);
        assert_eq!(graph.children(left), vec![right]);
    }

    #[test]
    fn unknown_nodes_are_reported() {
        let mut graph = SceneGraph::new();
        let node = graph.spawn(Transform::new()).unwrap();
        let stray = graph.world_mut().spawn((42u32,));

        assert_eq!(
            graph.set_parent(node, Some(stray)),
            Err(SceneGraphError::NoSuchNode(stray))
        );
        assert_eq!(graph.world_matrix(stray), Err(SceneGraphError::NoSuchNode(stray)));
    }

    #[test]
    fn non_finite_transforms_are_rejected() {
        let mut graph = SceneGraph::new();
        let bad = Transform::from_position(Vec3::new(f32::NAN, 0.0, 0.0));

        assert_eq!(graph.spawn(bad), Err(SceneGraphError::NonFinite));

        let node = graph.spawn(Transform::new()).unwrap();
        assert_eq!(graph.set_local(node, bad), Err(SceneGraphError::NonFinite));
        assert_eq!(graph.local(node).unwrap(), Transform::new());
    }

    #[test]
    fn despawn_turns_children_into_roots() {
        let mut graph = SceneGraph::new();
        let parent = graph
            .spawn(Transform::from_position(Vec3::new(5.0, 0.0, 0.0)))
            .unwrap();
        let child = graph
            .spawn_child(parent, Transform::from_position(Vec3::Y))
            .unwrap();

        graph.despawn(parent).unwrap();

        assert!(!graph.contains(parent));
        assert_eq!(graph.parent(child), None);
        assert!(graph.world_position(child).unwrap().abs_diff_eq(Vec3::Y, 1e-6));
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn pinned_nodes_survive_despawn() {
        let mut graph = SceneGraph::new();
        let node = graph.spawn(Transform::new()).unwrap();
        graph.pin(node).unwrap();

        assert_eq!(graph.despawn(node), Err(SceneGraphError::Pinned(node)));
        assert!(graph.contains(node));
        assert!(graph.is_pinned(node));
    }
}
