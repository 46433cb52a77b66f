//! The scene: graph, shared meshes, pickable id table, camera and lights.
//!
//! Pickable ids are handed out in spawn order starting at 1 and are never
//! reused, so a stale id read from last frame's picking buffer can only ever
//! resolve to the object that owned it or to nothing.

use std::fmt;
use std::sync::Arc;

use glam::{Mat4, Vec3};
use hecs::Entity;

use crate::camera::{Camera, Projection};
use crate::color::Color;
use crate::ecs::{MeshId, Pickable, RenderMesh};
use crate::geometry::RawGeometry;
use crate::light::{Light, LightItem, MAX_LIGHTS};
use crate::picking::{PickId, SoftwarePickingBuffer};
use crate::scene_graph::{Pinned, SceneGraph, SceneGraphError};
use crate::transform::Transform;

/// Errors raised by [`Scene`] operations.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneError {
    Graph(SceneGraphError),
    /// The mesh handle does not belong to this scene.
    UnknownMesh(MeshId),
    /// Every id up to [`PickId::MAX`] has been handed out.
    PickIdsExhausted,
    /// The camera node cannot be despawned.
    CameraNode(Entity),
}

impl fmt::Display for SceneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SceneError::Graph(e) => write!(f, "{e}"),
            SceneError::UnknownMesh(id) => write!(f, "Unknown mesh #{}", id.index()),
            SceneError::PickIdsExhausted => {
                write!(f, "No pick ids left (maximum {})", PickId::MAX)
            }
            SceneError::CameraNode(e) => write!(f, "Node {e:?} is the camera and cannot be removed"),
        }
    }
}

impl std::error::Error for SceneError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SceneError::Graph(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SceneGraphError> for SceneError {
    fn from(e: SceneGraphError) -> Self {
        SceneError::Graph(e)
    }
}

/// One object to draw this frame, resolved to world space.
#[derive(Clone, Copy, Debug)]
pub(crate) struct DrawItem {
    pub mesh: MeshId,
    pub model: Mat4,
    pub color: Color,
    pub id: Option<PickId>,
}

/// Everything the renderer and the picker read.
pub struct Scene {
    graph: SceneGraph,
    meshes: Vec<Arc<RawGeometry>>,
    /// Slot `id - 1` holds the entity owning `id`; despawned slots are `None`.
    pickables: Vec<Option<Entity>>,
    camera: Camera,
    /// Light nodes in spawn order.
    lights: Vec<Entity>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    /// Creates an empty scene with a root camera node at the origin.
    pub fn new() -> Self {
        let mut graph = SceneGraph::new();
        let node = graph.world_mut().spawn((Transform::new(), Pinned));
        Self {
            graph,
            meshes: Vec::new(),
            pickables: Vec::new(),
            camera: Camera::new(node, Projection::default()),
            lights: Vec::new(),
        }
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    /// Mutable graph access. The camera node is pinned, and nodes despawned
    /// here drop out of [`Scene::entity_for`] and [`Scene::pickables`].
    pub fn graph_mut(&mut self) -> &mut SceneGraph {
        &mut self.graph
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Changes the projection; the camera node itself is fixed for the
    /// scene's lifetime and is moved through the graph.
    pub fn set_projection(&mut self, projection: Projection) {
        self.camera.projection = projection;
    }

    /// Registers geometry and returns its handle. Meshes are immutable and
    /// may be shared by any number of objects.
    pub fn add_mesh(&mut self, geometry: impl Into<Arc<RawGeometry>>) -> MeshId {
        self.meshes.push(geometry.into());
        MeshId(self.meshes.len() - 1)
    }

    pub fn mesh(&self, id: MeshId) -> Option<&Arc<RawGeometry>> {
        self.meshes.get(id.index())
    }

    pub fn meshes(&self) -> &[Arc<RawGeometry>] {
        &self.meshes
    }

    /// Spawns a plain node, e.g. an invisible pivot.
    pub fn spawn_node(
        &mut self,
        transform: Transform,
        parent: Option<Entity>,
    ) -> Result<Entity, SceneError> {
        let node = match parent {
            Some(parent) => self.graph.spawn_child(parent, transform)?,
            None => self.graph.spawn(transform)?,
        };
        Ok(node)
    }

    /// Spawns a node drawn by the lit pass only.
    pub fn spawn_mesh(
        &mut self,
        mesh: MeshId,
        transform: Transform,
        color: Color,
        parent: Option<Entity>,
    ) -> Result<Entity, SceneError> {
        self.check_mesh(mesh)?;
        let node = self.spawn_node(transform, parent)?;
        self.insert(node, RenderMesh::new(mesh, color))?;
        Ok(node)
    }

    /// Spawns a drawn node with the next free pick id.
    pub fn spawn_pickable(
        &mut self,
        mesh: MeshId,
        transform: Transform,
        color: Color,
        parent: Option<Entity>,
    ) -> Result<Entity, SceneError> {
        self.check_mesh(mesh)?;
        let id = u32::try_from(self.pickables.len() + 1)
            .ok()
            .and_then(PickId::new)
            .ok_or(SceneError::PickIdsExhausted)?;

        let node = self.spawn_mesh(mesh, transform, color, parent)?;
        self.insert(node, Pickable { id })?;
        self.pickables.push(Some(node));
        log::debug!("Spawned pickable {id} as {node:?}");
        Ok(node)
    }

    /// Spawns a light node. See [`Light`] for how the node's transform is used.
    pub fn spawn_light(
        &mut self,
        light: Light,
        transform: Transform,
        parent: Option<Entity>,
    ) -> Result<Entity, SceneError> {
        let node = self.spawn_node(transform, parent)?;
        self.set_light(node, light)?;
        Ok(node)
    }

    /// Attaches `light` to `node`, replacing any light it already carries.
    pub fn set_light(&mut self, node: Entity, light: Light) -> Result<(), SceneError> {
        if !self.graph.contains(node) {
            return Err(SceneError::Graph(SceneGraphError::NoSuchNode(node)));
        }
        self.insert(node, light)?;
        if !self.lights.contains(&node) {
            self.lights.push(node);
        }
        Ok(())
    }

    pub fn light(&self, node: Entity) -> Option<Light> {
        self.graph.world().get::<&Light>(node).ok().map(|l| *l)
    }

    /// Enabled lights resolved to world space, at most [`MAX_LIGHTS`], in
    /// spawn order.
    pub(crate) fn light_items(&self) -> Vec<LightItem> {
        self.lights
            .iter()
            .filter_map(|&node| {
                let light = self.light(node).filter(|l| l.enabled)?;
                let world = self.graph.world_matrix(node).ok()?;
                Some(LightItem {
                    light,
                    position: world.transform_point3(Vec3::ZERO),
                    direction: world
                        .transform_vector3(Vec3::NEG_Z)
                        .normalize_or(Vec3::NEG_Z),
                })
            })
            .take(MAX_LIGHTS)
            .collect()
    }

    /// Removes `node`; its children become roots and its pick id is retired.
    pub fn despawn(&mut self, node: Entity) -> Result<(), SceneError> {
        if node == self.camera.node {
            return Err(SceneError::CameraNode(node));
        }
        if let Some(id) = self.pick_id(node) {
            self.pickables[id.get() as usize - 1] = None;
        }
        self.graph.despawn(node)?;
        self.lights.retain(|&light| light != node);
        Ok(())
    }

    /// The live entity owning `id`.
    pub fn entity_for(&self, id: PickId) -> Option<Entity> {
        self.pickables
            .get(id.get() as usize - 1)
            .copied()
            .flatten()
            .filter(|&node| self.graph.contains(node))
    }

    pub fn pick_id(&self, node: Entity) -> Option<PickId> {
        self.graph.world().get::<&Pickable>(node).ok().map(|p| p.id)
    }

    /// Live pickables in id order.
    pub fn pickables(&self) -> impl Iterator<Item = (PickId, Entity)> + '_ {
        self.pickables.iter().enumerate().filter_map(|(i, slot)| {
            let id = PickId::new(i as u32 + 1)?;
            slot.filter(|&node| self.graph.contains(node))
                .map(|node| (id, node))
        })
    }

    /// Resolves every drawable node to world space. Nodes whose ancestry
    /// cannot be resolved are skipped.
    pub(crate) fn draw_items(&self) -> Vec<DrawItem> {
        let world = self.graph.world();
        let mut query = world.query::<(&RenderMesh, Option<&Pickable>)>();
        query
            .iter()
            .filter_map(|(entity, (render, pickable))| {
                let model = self.graph.world_matrix(entity).ok()?;
                Some(DrawItem {
                    mesh: render.mesh,
                    model,
                    color: render.color,
                    id: pickable.map(|p| p.id),
                })
            })
            .collect()
    }

    /// Runs the picking pass on the CPU: clears `target` and draws every
    /// pickable with its id, depth-tested.
    pub fn render_picking_software(
        &self,
        target: &mut SoftwarePickingBuffer,
        aspect: f32,
    ) -> Result<(), SceneError> {
        target.clear();
        let view_proj = self.camera.view_projection(&self.graph, aspect)?;
        for item in self.draw_items() {
            let (Some(id), Some(geometry)) = (item.id, self.mesh(item.mesh)) else {
                continue;
            };
            target.draw_geometry(geometry, view_proj * item.model, id);
        }
        Ok(())
    }

    fn check_mesh(&self, mesh: MeshId) -> Result<(), SceneError> {
        if mesh.index() < self.meshes.len() {
            Ok(())
        } else {
            Err(SceneError::UnknownMesh(mesh))
        }
    }

    fn insert(&mut self, node: Entity, component: impl hecs::Component) -> Result<(), SceneError> {
        self.graph
            .world_mut()
            .insert_one(node, component)
            .map_err(|_| SceneError::Graph(SceneGraphError::NoSuchNode(node)))
    }
}
