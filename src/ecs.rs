//! Components attached to scene-graph entities.
//!
//! A pickable object is an entity carrying:
//!
//! - [`Transform`](crate::Transform) (and optionally [`Parent`](crate::Parent)) from the scene graph
//! - [`RenderMesh`]: which shared geometry to draw and its lit base color
//! - [`Pickable`]: the unique id written into the picking buffer
//!
//! Entities with a `RenderMesh` but no `Pickable` are drawn by the lit pass
//! only and never show up in picking results.

use crate::color::Color;
use crate::picking::PickId;

/// Type-safe handle to a mesh registered with a [`Scene`](crate::Scene).
///
/// This newtype wrapper prevents passing arbitrary indices where a mesh is
/// expected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshId(pub(crate) usize);

impl MeshId {
    /// Position of the mesh in the scene's mesh table.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Component for drawing a mesh through the lit pipeline.
#[derive(Clone, Copy, Debug)]
pub struct RenderMesh {
    /// Handle to the shared geometry.
    pub mesh: MeshId,
    /// Base color used by the lit shader.
    pub color: Color,
}

impl RenderMesh {
    pub fn new(mesh: MeshId, color: Color) -> Self {
        Self { mesh, color }
    }
}

/// Component marking an entity as pickable.
///
/// The picking shader writes `id` as a flat color; see
/// [`PickId::to_color`](crate::PickId::to_color).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pickable {
    pub id: PickId,
}
