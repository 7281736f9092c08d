//! Cameras: a placement in the world plus a perspective projection.
//!
//! Matrices follow the OpenGL clip-space convention (depth in `-1..1`). Backends
//! with a different convention convert when applying camera state.

use cgmath::{Deg, Matrix4, Point3, Rad, SquareMatrix, Vector3};

use crate::data_structures::transform::Transform;

#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub aspect: f32,
    pub fovy: Rad<f32>,
    pub znear: f32,
    pub zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width as f32 / height.max(1) as f32,
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height.max(1) as f32;
    }

    pub fn matrix(&self) -> Matrix4<f32> {
        cgmath::perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub transform: Transform,
    pub projection: Projection,
}

impl Camera {
    pub fn new(transform: Transform, projection: Projection) -> Self {
        Self {
            transform,
            projection,
        }
    }

    /// Camera at `eye` looking at `target`, with +Y as up.
    pub fn looking_at(eye: Point3<f32>, target: Point3<f32>, projection: Projection) -> Self {
        // look_at_rh builds the view matrix; the camera's own rotation is its inverse
        let view: Matrix4<f32> = Matrix4::look_at_rh(eye, target, Vector3::unit_y());
        let rotation = cgmath::Quaternion::from(cgmath::Matrix3::new(
            view.x.x, view.y.x, view.z.x, view.x.y, view.y.y, view.z.y, view.x.z, view.y.z,
            view.z.z,
        ));
        Self {
            transform: Transform {
                position: Vector3::new(eye.x, eye.y, eye.z),
                rotation,
                scale: Vector3::new(1.0, 1.0, 1.0),
            },
            projection,
        }
    }

    /// Camera with a 45° field of view placed at `position`, looking down -Z.
    pub fn perspective(width: u32, height: u32, position: Vector3<f32>) -> Self {
        Self::new(
            Transform::from(position),
            Projection::new(width, height, Deg(45.0), 0.1, 500.0),
        )
    }

    pub fn projection(&self) -> Matrix4<f32> {
        self.projection.matrix()
    }

    /// Inverse of the camera's placement. Falls back to identity for a degenerate scale.
    pub fn view(&self) -> Matrix4<f32> {
        self.transform
            .to_matrix()
            .invert()
            .unwrap_or_else(Matrix4::identity)
    }
}
