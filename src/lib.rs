//! # Scenepick
//!
//! **A small 3D scene graph with id-buffer object picking on wgpu.**
//!
//! Objects live in a parent/child [`SceneGraph`]; each pickable object gets a
//! [`PickId`] that the picking pass writes as a flat color. A click reads
//! back the pixel under the cursor and hands the decoded id to the app.
//!
//! ## Quick Start
//!
//! ```no_run
//! use scenepick::*;
//!
//! struct Viewer;
//!
//! impl BaseApp for Viewer {
//!     fn initialize(ctx: &mut SetupContext) -> Self {
//!         let cube = ctx.mesh_cube();
//!         let camera = ctx.scene.camera().node;
//!         ctx.scene
//!             .graph_mut()
//!             .set_local(camera, Transform::from_position(Vec3::new(0.0, 0.0, 4.0)))
//!             .unwrap();
//!         ctx.scene
//!             .spawn_pickable(cube, Transform::new(), Color::WHITE, None)
//!             .unwrap();
//!         ctx.scene
//!             .spawn_light(Light::ambient(0.2), Transform::new(), None)
//!             .unwrap();
//!         let sun = Transform::new().looking_at(Vec3::new(-1.0, -1.0, -1.0), Vec3::Y);
//!         ctx.scene
//!             .spawn_light(Light::directional(0.8), sun, None)
//!             .unwrap();
//!         Viewer
//!     }
//!
//!     fn update(&mut self, _frame: &mut Frame) {}
//!
//!     fn on_pick(&mut self, picked: Option<PickId>, _scene: &mut Scene) {
//!         println!("picked {picked:?}");
//!     }
//! }
//!
//! fn main() -> Result<(), RunError> {
//!     run::<Viewer>(AppConfig::new().title("Viewer"))
//! }
//! ```
//!
//! Without a window, [`Scene::render_picking_software`] runs the same picking
//! protocol on the CPU into a [`SoftwarePickingBuffer`].

mod app;
mod camera;
mod color;
mod ecs;
mod geometry;
mod gpu;
mod input;
mod light;
mod mesh;
mod orbit_camera;
mod picking;
mod renderer;
mod scene;
mod scene_graph;
mod transform;

pub use app::{AppConfig, BaseApp, Frame, RunError, SetupContext, run, window_to_pick_coords};
pub use camera::{Camera, Projection};
pub use color::Color;
pub use ecs::{MeshId, Pickable, RenderMesh};
pub use geometry::RawGeometry;
pub use gpu::{GpuContext, GpuError, request_headless_device};
pub use input::Input;
pub use light::{Light, LightKind, MAX_LIGHTS};
pub use mesh::{Mesh, Vertex3d};
pub use orbit_camera::{OrbitControl, OrbitMode};
pub use picking::{
    PICKING_DEPTH_FORMAT, PICKING_FORMAT, PickId, PickingBuffer, PickingTarget,
    SoftwarePickingBuffer, pick_index,
};
pub use renderer::{LightUniforms, ObjectUniforms, SceneRenderer, SceneUniforms};
pub use scene::{Scene, SceneError};
pub use scene_graph::{Parent, Pinned, SceneGraph, SceneGraphError};
pub use transform::Transform;

// Re-export glam math types for convenience
pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

// Re-export commonly used winit types for convenience
pub use winit::event::MouseButton;
pub use winit::keyboard::KeyCode;

pub use hecs::{Entity, World};
