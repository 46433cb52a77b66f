//! Light sources.
//!
//! A [`Light`] is a component on a scene-graph node. Point and spot lights
//! sit at the node's world position and directional and spot lights shine
//! along its local -Z axis, so a light parented to a moving object follows it.
//! At most [`MAX_LIGHTS`] enabled lights reach the lit pass; the rest are
//! ignored in spawn order.

use glam::Vec3;

use crate::color::Color;

/// Upper bound on lights uploaded per frame.
pub const MAX_LIGHTS: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LightKind {
    /// Uniform light on every surface, regardless of orientation.
    Ambient,
    /// Parallel rays along the node's forward axis.
    Directional,
    /// Radiates from the node's position.
    Point,
    /// A cone along the node's forward axis.
    Spot {
        /// Half-angle of the cone, in radians.
        angle: f32,
        /// Falloff exponent toward the cone's edge.
        smoothness: f32,
    },
}

impl LightKind {
    /// Tag shared with the lit shader.
    pub(crate) fn tag(self) -> u32 {
        match self {
            LightKind::Ambient => 0,
            LightKind::Directional => 1,
            LightKind::Point => 2,
            LightKind::Spot { .. } => 3,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub color: Color,
    pub illuminance: f32,
    /// Disabled lights stay in the scene but are not uploaded.
    pub enabled: bool,
}

impl Light {
    pub fn new(kind: LightKind, illuminance: f32) -> Self {
        Self {
            kind,
            color: Color::WHITE,
            illuminance,
            enabled: true,
        }
    }

    pub fn ambient(illuminance: f32) -> Self {
        Self::new(LightKind::Ambient, illuminance)
    }

    pub fn directional(illuminance: f32) -> Self {
        Self::new(LightKind::Directional, illuminance)
    }

    pub fn point(illuminance: f32) -> Self {
        Self::new(LightKind::Point, illuminance)
    }

    pub fn spot(illuminance: f32, angle: f32, smoothness: f32) -> Self {
        Self::new(LightKind::Spot { angle, smoothness }, illuminance)
    }

    pub fn color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// A light resolved to world space for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct LightItem {
    pub light: Light,
    pub position: Vec3,
    /// Unit direction the light travels.
    pub direction: Vec3,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_start_enabled_and_white() {
        let light = Light::spot(0.3, 0.2, 100.0).color(Color::rgb(1.0, 0.0, 0.0));
        assert!(light.enabled);
        assert_eq!(light.color, Color::rgb(1.0, 0.0, 0.0));
        assert_eq!(light.kind.tag(), 3);
        assert!(!light.enabled(false).enabled);
    }
}
