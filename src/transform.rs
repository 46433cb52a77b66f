//! Local position, rotation and scale of a scene-graph node.
//!
//! A [`Transform`] only describes a node relative to its parent. World-space
//! matrices are derived by [`SceneGraph`](crate::SceneGraph), which walks the
//! parent chain and composes each level's [`Transform::matrix`].
//!
//! # Example
//!
//! ```
//! use scenepick::{Transform, Vec3, Quat};
//!
//! let transform = Transform::new()
//!     .position(Vec3::new(0.0, 2.0, -5.0))
//!     .rotation(Quat::from_rotation_y(0.5))
//!     .uniform_scale(2.0);
//!
//! let positioned = Transform::from_position(Vec3::new(1.0, 0.0, 0.0));
//! assert_eq!(positioned.position, Vec3::X);
//! ```

use glam::{Mat3, Mat4, Quat, Vec3};

/// Position, rotation and scale relative to the parent node.
///
/// # Transformation Order
///
/// [`Transform::matrix()`] applies **Scale → Rotate → Translate**:
/// 1. The node is scaled around its local origin
/// 2. Then rotated around its local origin
/// 3. Finally translated by `position`
///
/// The default transform is the identity: origin, no rotation, unit scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    /// Translation relative to the parent.
    pub position: Vec3,
    /// Rotation as a unit quaternion.
    pub rotation: Quat,
    /// Scale factors for each axis.
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// Creates a new identity transform.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transform positioned at the given location.
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Sets the position (translation) component.
    pub fn position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    /// Sets the rotation component.
    ///
    /// Use glam's constructors for common cases:
    /// `Quat::from_rotation_y(angle)`, `Quat::from_axis_angle(axis, angle)`.
    pub fn rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    /// Sets non-uniform scale factors for each axis.
    pub fn scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Sets uniform scale on all axes.
    ///
    /// ```
    /// use scenepick::{Transform, Vec3};
    ///
    /// let transform = Transform::new().uniform_scale(2.0);
    /// assert_eq!(transform.scale, Vec3::splat(2.0));
    /// ```
    pub fn uniform_scale(mut self, scale: f32) -> Self {
        self.scale = Vec3::splat(scale);
        self
    }

    /// Rotates the transform so its local -Z axis points at `target`.
    ///
    /// `target` is expressed in the same (parent) space as `position`. The
    /// rotation is left unchanged when `target` coincides with `position` or
    /// the view direction is parallel to `up`.
    pub fn looking_at(mut self, target: Vec3, up: Vec3) -> Self {
        self.look_at(target, up);
        self
    }

    /// In-place version of [`Transform::looking_at`].
    pub fn look_at(&mut self, target: Vec3, up: Vec3) {
        let forward = (target - self.position).normalize_or_zero();
        if forward == Vec3::ZERO {
            return;
        }
        let back = -forward;
        let right = up.cross(back).normalize_or_zero();
        if right == Vec3::ZERO {
            return;
        }
        let true_up = back.cross(right);
        self.rotation = Quat::from_mat3(&Mat3::from_cols(right, true_up, back)).normalize();
    }

    /// Local -Z axis after rotation.
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    /// Returns true if every component is a finite number.
    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.rotation.is_finite() && self.scale.is_finite()
    }

    /// Converts this transform to a 4×4 matrix (SRT order).
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_matrix_by_default() {
        assert_eq!(Transform::new().matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn scale_is_applied_before_translation() {
        let transform = Transform::new()
            .position(Vec3::new(1.0, 0.0, 0.0))
            .uniform_scale(2.0);

        let p = transform.matrix().transform_point3(Vec3::new(1.0, 0.0, 0.0));
        assert!(p.abs_diff_eq(Vec3::new(3.0, 0.0, 0.0), 1e-6));
    }

    #[test]
    fn rotation_is_applied_before_translation() {
        let transform = Transform::new()
            .position(Vec3::new(0.0, 0.0, -5.0))
            .rotation(Quat::from_rotation_y(std::f32::consts::FRAC_PI_2));

        // +X rotated 90 degrees about Y lands on -Z.
        let p = transform.matrix().transform_point3(Vec3::X);
        assert!(p.abs_diff_eq(Vec3::new(0.0, 0.0, -6.0), 1e-5));
    }

    #[test]
    fn look_at_points_forward_at_target() {
        let transform = Transform::from_position(Vec3::new(0.0, 0.0, 8.0))
            .looking_at(Vec3::new(3.0, 0.0, 8.0), Vec3::Y);

        assert!(transform.forward().abs_diff_eq(Vec3::X, 1e-5));
    }

    #[test]
    fn look_at_ignores_degenerate_directions() {
        let mut transform = Transform::from_position(Vec3::ONE);
        transform.look_at(Vec3::ONE, Vec3::Y);
        assert_eq!(transform.rotation, Quat::IDENTITY);

        transform.look_at(Vec3::new(1.0, 5.0, 1.0), Vec3::Y);
        assert_eq!(transform.rotation, Quat::IDENTITY);
    }

    #[test]
    fn non_finite_components_are_detected() {
        assert!(Transform::new().is_finite());
        assert!(!Transform::from_position(Vec3::new(f32::NAN, 0.0, 0.0)).is_finite());
        assert!(!Transform::new().uniform_scale(f32::INFINITY).is_finite());
    }
}
