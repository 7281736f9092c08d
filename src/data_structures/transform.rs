//! Local transformation of a scene node.
//!
//! A node's placement relative to its parent is stored decomposed as position,
//! rotation and scale and turned into a matrix when the scene updates.

use cgmath::{Matrix4, One, Quaternion, Rad, Rotation3, Vector3};

/// Position, rotation (as quaternion) and scale of a node relative to its parent.
#[derive(Clone, Debug, PartialEq)]
pub struct Transform {
    pub position: Vector3<f32>,
    pub rotation: Quaternion<f32>,
    pub scale: Vector3<f32>,
}

impl Transform {
    /// Identity transformation (no move, rotate, or scale).
    pub fn new() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 0.0),
            // `Quaternion::one()` is the identity quaternion (no rotation)
            rotation: Quaternion::one(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn to_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.position)
            * Matrix4::from(self.rotation)
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }

    pub fn translate(&mut self, offset: Vector3<f32>) {
        self.position += offset;
    }

    /// Rotates by `angle` around `axis`, expressed in the node's own frame.
    pub fn rotate(&mut self, axis: Vector3<f32>, angle: impl Into<Rad<f32>>) {
        self.rotation = self.rotation * Quaternion::from_axis_angle(axis, angle);
    }

    pub fn rotate_x(&mut self, angle: impl Into<Rad<f32>>) {
        self.rotate(Vector3::unit_x(), angle);
    }

    pub fn rotate_y(&mut self, angle: impl Into<Rad<f32>>) {
        self.rotate(Vector3::unit_y(), angle);
    }

    pub fn rotate_z(&mut self, angle: impl Into<Rad<f32>>) {
        self.rotate(Vector3::unit_z(), angle);
    }

    /// Multiplies the current scale component-wise.
    pub fn scale_by(&mut self, factor: Vector3<f32>) {
        self.scale = Vector3::new(
            self.scale.x * factor.x,
            self.scale.y * factor.y,
            self.scale.z * factor.z,
        );
    }
}

impl From<Vector3<f32>> for Transform {
    fn from(position: Vector3<f32>) -> Self {
        Transform {
            position,
            ..Default::default()
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{Deg, InnerSpace, Vector4};

    use super::*;

    fn apply(transform: &Transform, point: Vector3<f32>) -> Vector3<f32> {
        (transform.to_matrix() * Vector4::new(point.x, point.y, point.z, 1.0)).truncate()
    }

    #[test]
    fn rotations_turn_around_the_named_axis() {
        let mut transform = Transform::new();
        transform.rotate_z(Deg(90.0));
        assert!((apply(&transform, Vector3::unit_x()) - Vector3::unit_y()).magnitude() < 1e-5);

        let mut transform = Transform::new();
        transform.rotate_y(Deg(90.0));
        assert!((apply(&transform, Vector3::unit_x()) + Vector3::unit_z()).magnitude() < 1e-5);

        let mut transform = Transform::new();
        transform.rotate_x(Deg(90.0));
        assert!((apply(&transform, Vector3::unit_y()) - Vector3::unit_z()).magnitude() < 1e-5);
    }

    #[test]
    fn rotations_accumulate_in_the_local_frame() {
        let mut transform = Transform::new();
        transform.rotate_z(Deg(90.0));
        // local x now points along world y, so turning about it moves local y onto world z
        transform.rotate_x(Deg(90.0));
        assert!((apply(&transform, Vector3::unit_y()) - Vector3::unit_z()).magnitude() < 1e-5);
    }

    #[test]
    fn scale_is_applied_before_rotation_and_translation() {
        let mut transform = Transform::from(Vector3::new(10.0, 0.0, 0.0));
        transform.scale_by(Vector3::new(2.0, 3.0, 1.0));
        transform.scale_by(Vector3::new(2.0, 1.0, 1.0));
        assert_eq!(transform.scale, Vector3::new(4.0, 3.0, 1.0));

        transform.rotate_z(Deg(90.0));
        let moved = apply(&transform, Vector3::new(1.0, 1.0, 0.0));
        assert!((moved - Vector3::new(7.0, 4.0, 0.0)).magnitude() < 1e-5);
    }
}
