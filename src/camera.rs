use glam::{Mat4, Vec3};
use hecs::Entity;

use crate::scene_graph::{SceneGraph, SceneGraphError};

/// How the camera maps view space to clip space.
///
/// Both variants produce wgpu's `[0, 1]` depth range.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Projection {
    /// Perspective projection with a vertical field of view in radians.
    Perspective { fov_y: f32, near: f32, far: f32 },
    /// Orthographic projection; the visible height is `2 * half_height`.
    Orthographic {
        half_height: f32,
        near: f32,
        far: f32,
    },
}

impl Default for Projection {
    fn default() -> Self {
        Projection::Perspective {
            fov_y: 45f32.to_radians(),
            near: 0.01,
            far: 100.0,
        }
    }
}

impl Projection {
    pub fn matrix(&self, aspect: f32) -> Mat4 {
        match *self {
            Projection::Perspective { fov_y, near, far } => {
                Mat4::perspective_rh(fov_y, aspect, near, far)
            }
            Projection::Orthographic {
                half_height,
                near,
                far,
            } => {
                let half_width = half_height * aspect;
                Mat4::orthographic_rh(-half_width, half_width, -half_height, half_height, near, far)
            }
        }
    }
}

/// A camera whose placement is a scene-graph node.
///
/// Because the camera lives in the graph it can be attached to any object,
/// e.g. to follow a picked planet. The camera looks down its node's local -Z.
#[derive(Clone, Copy, Debug)]
pub struct Camera {
    /// The node providing the camera's world transform.
    pub node: Entity,
    pub projection: Projection,
}

impl Camera {
    pub fn new(node: Entity, projection: Projection) -> Self {
        Self { node, projection }
    }

    /// World-to-view matrix: the inverse of the node's world matrix.
    pub fn view_matrix(&self, graph: &SceneGraph) -> Result<Mat4, SceneGraphError> {
        graph.world_matrix(self.node).map(|m| m.inverse())
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        self.projection.matrix(aspect)
    }

    /// `projection * view`.
    pub fn view_projection(&self, graph: &SceneGraph, aspect: f32) -> Result<Mat4, SceneGraphError> {
        Ok(self.projection_matrix(aspect) * self.view_matrix(graph)?)
    }

    /// Camera position in world space.
    pub fn position(&self, graph: &SceneGraph) -> Result<Vec3, SceneGraphError> {
        graph.world_position(self.node)
    }
}
