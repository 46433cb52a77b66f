//! Solar system viewer.
//!
//! Sun, earth and moon are chained parent to child. Drag to orbit, scroll to
//! zoom, click a body to attach the camera to it, Escape to detach.

use anyhow::Context;
use scenepick::{
    AppConfig, BaseApp, Color, Entity, Frame, KeyCode, Light, OrbitControl, PickId, Scene,
    SetupContext, Transform, Vec3,
};

struct Body {
    name: &'static str,
    node: Entity,
}

struct SolarSystem {
    bodies: Vec<Body>,
    orbit: OrbitControl,
}

impl SolarSystem {
    fn body(&self, id: PickId, scene: &Scene) -> Option<&Body> {
        let node = scene.entity_for(id)?;
        self.bodies.iter().find(|b| b.node == node)
    }
}

impl BaseApp for SolarSystem {
    fn initialize(ctx: &mut SetupContext) -> Self {
        let specs = [
            ("sun", 1.0, Color::rgb(1.0, 0.5, 0.0)),
            ("earth", 0.4, Color::rgb(0.0, 0.5, 1.0)),
            ("moon", 0.2, Color::rgb(0.5, 0.5, 0.5)),
        ];

        let mut bodies: Vec<Body> = Vec::new();
        for (name, radius, color) in specs {
            let mesh = ctx.mesh_sphere(16, 8, radius);
            let parent = bodies.last().map(|b| b.node);
            match ctx
                .scene
                .spawn_pickable(mesh, Transform::new(), color, parent)
            {
                Ok(node) => bodies.push(Body { name, node }),
                Err(e) => log::error!("failed to spawn {name}: {e}"),
            }
        }

        // The sun shines on the earth and moon from its own center.
        let sun = bodies.first().map(|b| b.node);
        let lights = [(Light::ambient(0.3), None), (Light::point(1.0), sun)];
        for (light, parent) in lights {
            if let Err(e) = ctx.scene.spawn_light(light, Transform::new(), parent) {
                log::error!("failed to spawn light: {e}");
            }
        }

        Self {
            bodies,
            orbit: OrbitControl::new().distance(8.0).elevation(0.0),
        }
    }

    fn update(&mut self, frame: &mut Frame) {
        let camera = frame.scene.camera().node;
        let graph = frame.scene.graph_mut();

        if frame.input.key_pressed(KeyCode::Escape) {
            if let Err(e) = graph.set_parent(camera, None) {
                log::warn!("detaching camera: {e}");
            }
        }

        self.orbit.update(frame.input, frame.dt);
        if let Err(e) = self.orbit.apply(graph, camera) {
            log::warn!("orbit control: {e}");
        }

        let t = frame.time;
        let orbits = [(1, 3.0, 1.0), (2, 1.0, 5.0)];
        for (index, radius, speed) in orbits {
            let Some(body) = self.bodies.get(index) else {
                continue;
            };
            let angle = t * speed;
            let position = Vec3::new(radius * angle.cos(), radius * angle.sin(), 0.0);
            if let Ok(mut local) = graph.local_mut(body.node) {
                local.position = position;
            }
        }
    }

    fn on_pick(&mut self, picked: Option<PickId>, scene: &mut Scene) {
        let Some(id) = picked else {
            log::debug!("picked background");
            return;
        };
        let Some(body) = self.body(id, scene) else {
            return;
        };
        log::info!("picked {} ({id})", body.name);

        let camera = scene.camera().node;
        if let Err(e) = scene.graph_mut().set_parent(camera, Some(body.node)) {
            log::warn!("attaching camera to {}: {e}", body.name);
        }
    }

    fn finalize(&mut self) {
        log::info!("closing solar system with {} bodies", self.bodies.len());
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    scenepick::run::<SolarSystem>(AppConfig::new().title("Solar System").size(1024, 768))
        .context("solar system viewer failed")
}
