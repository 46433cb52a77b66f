use std::f32::consts::FRAC_PI_2;

use glam::Vec3;
use hecs::Entity;
use winit::event::MouseButton;

use crate::input::Input;
use crate::scene_graph::{SceneGraph, SceneGraphError};
use crate::transform::Transform;

const ELEVATION_LIMIT: f32 = FRAC_PI_2 - 0.01;

/// Controls how the orbit control moves.
#[derive(Clone, Copy, Debug, Default)]
pub enum OrbitMode {
    /// User controls the camera with mouse drag and scroll wheel.
    #[default]
    Interactive,
    /// Camera auto-rotates around the center, ignoring input.
    AutoRotate {
        /// Rotation speed in radians per second (positive = counterclockwise from above).
        speed: f32,
    },
}

/// Orbits a scene-graph node around a center point.
///
/// The control owns no camera of its own. [`apply`](Self::apply) writes the
/// node's local transform, so `center` lives in the node's parent space: a
/// camera node parented to a planet orbits that planet with `center = ZERO`.
///
/// # Example
/// ```ignore
/// let mut orbit = OrbitControl::new().distance(12.0);
///
/// // In frame loop:
/// orbit.update(frame.input, frame.dt);
/// orbit.apply(frame.scene.graph_mut(), camera.node)?;
/// ```
#[derive(Clone, Debug)]
pub struct OrbitControl {
    /// Point the camera orbits around, in the parent space of the node.
    pub center: Vec3,
    /// Distance from center.
    pub distance: f32,
    /// Horizontal angle in radians (yaw).
    pub azimuth: f32,
    /// Vertical angle in radians (pitch), clamped away from the poles.
    pub elevation: f32,
    pub mode: OrbitMode,
    /// Radians per pixel of mouse drag.
    pub sensitivity: f32,
    /// Distance change per scroll line.
    pub zoom_sensitivity: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl Default for OrbitControl {
    fn default() -> Self {
        Self {
            center: Vec3::ZERO,
            distance: 5.0,
            azimuth: 0.0,
            elevation: 0.3,
            mode: OrbitMode::Interactive,
            sensitivity: 0.005,
            zoom_sensitivity: 0.5,
            min_distance: 0.5,
            max_distance: 100.0,
        }
    }
}

impl OrbitControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn center(mut self, center: impl Into<Vec3>) -> Self {
        self.center = center.into();
        self
    }

    pub fn distance(mut self, distance: f32) -> Self {
        self.distance = distance.clamp(self.min_distance, self.max_distance);
        self
    }

    pub fn mode(mut self, mode: OrbitMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn azimuth(mut self, azimuth: f32) -> Self {
        self.azimuth = azimuth;
        self
    }

    pub fn elevation(mut self, elevation: f32) -> Self {
        self.elevation = elevation.clamp(-ELEVATION_LIMIT, ELEVATION_LIMIT);
        self
    }

    pub fn sensitivity(mut self, sensitivity: f32) -> Self {
        self.sensitivity = sensitivity;
        self
    }

    pub fn zoom_sensitivity(mut self, sensitivity: f32) -> Self {
        self.zoom_sensitivity = sensitivity;
        self
    }

    pub fn distance_limits(mut self, min: f32, max: f32) -> Self {
        self.min_distance = min;
        self.max_distance = max;
        self.distance = self.distance.clamp(min, max);
        self
    }

    /// Advances the orbit from this frame's input.
    pub fn update(&mut self, input: &Input, dt: f32) {
        match self.mode {
            OrbitMode::Interactive => {
                if input.mouse_down(MouseButton::Left) {
                    let delta = input.mouse_delta();
                    self.azimuth -= delta.x * self.sensitivity;
                    self.elevation = (self.elevation + delta.y * self.sensitivity)
                        .clamp(-ELEVATION_LIMIT, ELEVATION_LIMIT);
                }

                let scroll = input.scroll_delta();
                if scroll.y != 0.0 {
                    self.distance = (self.distance - scroll.y * self.zoom_sensitivity)
                        .clamp(self.min_distance, self.max_distance);
                }
            }
            OrbitMode::AutoRotate { speed } => {
                self.azimuth += speed * dt;
            }
        }
    }

    /// Offset of the eye from the center.
    pub fn offset(&self) -> Vec3 {
        Vec3::new(
            self.distance * self.elevation.cos() * self.azimuth.sin(),
            self.distance * self.elevation.sin(),
            self.distance * self.elevation.cos() * self.azimuth.cos(),
        )
    }

    /// Local transform placing the eye on the orbit, looking at the center.
    pub fn transform(&self) -> Transform {
        Transform::from_position(self.center + self.offset()).looking_at(self.center, Vec3::Y)
    }

    /// Writes [`transform`](Self::transform) into `node`.
    pub fn apply(&self, graph: &mut SceneGraph, node: Entity) -> Result<(), SceneGraphError> {
        graph.set_local(node, self.transform())
    }
}
