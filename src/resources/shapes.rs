//! Ready-made geometries for boxes and planes.
//!
//! Every shape is centered on the origin and uses `U16` indices. Lit shapes
//! carry `position` and `normal` attributes, coloured ones `position` and
//! `colour`.

use crate::{
    context::{AttributeDescriptor, AttributeFormat, BufferUsage, IndexType, PrimitiveMode},
    error::Result,
    resources::{buffer::Buffer, geometry::Geometry},
};

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct NormalVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl NormalVertex {
    pub const STRIDE: u64 = std::mem::size_of::<Self>() as u64;
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ColourVertex {
    pub position: [f32; 3],
    pub colour: [f32; 4],
}

impl ColourVertex {
    pub const STRIDE: u64 = std::mem::size_of::<Self>() as u64;
}

/// One quad per face: outward normal plus the two in-plane axes, chosen so
/// that `u x v == normal` and the winding is counter-clockwise seen from outside.
const BOX_FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
    ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
    ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
    ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
    ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
    ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
];

const QUAD_CORNERS: [(f32, f32); 4] = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];

fn box_corners(width: f32, height: f32, depth: f32) -> Vec<NormalVertex> {
    let half = [width / 2.0, height / 2.0, depth / 2.0];
    let mut vertices = Vec::with_capacity(24);
    for (normal, u, v) in BOX_FACES {
        for (cu, cv) in QUAD_CORNERS {
            let mut position = [0.0; 3];
            for axis in 0..3 {
                position[axis] = (normal[axis] + u[axis] * cu + v[axis] * cv) * half[axis];
            }
            vertices.push(NormalVertex { position, normal });
        }
    }
    vertices
}

fn quad_indices(quads: u16) -> Vec<u16> {
    (0..quads)
        .flat_map(|quad| {
            let base = quad * 4;
            [base, base + 1, base + 2, base, base + 2, base + 3]
        })
        .collect()
}

fn lit_geometry(vertices: &[NormalVertex], indices: &[u16]) -> Result<Geometry> {
    Geometry::indexed(
        Buffer::from_slice(indices, BufferUsage::Index),
        Buffer::from_slice(vertices, BufferUsage::Vertex),
        PrimitiveMode::Triangles,
        IndexType::U16,
    )
    .with_attribute(
        "position",
        AttributeDescriptor::new(AttributeFormat::Float32x3, NormalVertex::STRIDE, 0),
    )?
    .with_attribute(
        "normal",
        AttributeDescriptor::new(AttributeFormat::Float32x3, NormalVertex::STRIDE, 12),
    )
}

/// Box with per-face normals: 24 vertices and 36 indices.
pub fn box_geometry(width: f32, height: f32, depth: f32) -> Result<Geometry> {
    lit_geometry(&box_corners(width, height, depth), &quad_indices(6))
}

/// Box whose vertices all carry `colour`, for the unlit `color` program.
pub fn colored_box_geometry(
    colour: [f32; 4],
    width: f32,
    height: f32,
    depth: f32,
) -> Result<Geometry> {
    let vertices: Vec<ColourVertex> = box_corners(width, height, depth)
        .into_iter()
        .map(|vertex| ColourVertex {
            position: vertex.position,
            colour,
        })
        .collect();
    Geometry::indexed(
        Buffer::from_slice(&quad_indices(6), BufferUsage::Index),
        Buffer::from_slice(&vertices, BufferUsage::Vertex),
        PrimitiveMode::Triangles,
        IndexType::U16,
    )
    .with_attribute(
        "position",
        AttributeDescriptor::new(AttributeFormat::Float32x3, ColourVertex::STRIDE, 0),
    )?
    .with_attribute(
        "colour",
        AttributeDescriptor::new(AttributeFormat::Float32x4, ColourVertex::STRIDE, 12),
    )
}

/// Plane in the XZ plane facing +Y.
pub fn plane_geometry(width: f32, depth: f32) -> Result<Geometry> {
    let (x, z) = (width / 2.0, depth / 2.0);
    let normal = [0.0, 1.0, 0.0];
    let vertices = [
        NormalVertex { position: [-x, 0.0, z], normal },
        NormalVertex { position: [x, 0.0, z], normal },
        NormalVertex { position: [x, 0.0, -z], normal },
        NormalVertex { position: [-x, 0.0, -z], normal },
    ];
    lit_geometry(&vertices, &quad_indices(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_has_24_vertices_and_36_indices() {
        let geometry = box_geometry(1.0, 2.0, 3.0).unwrap();
        assert_eq!(geometry.size(), 36);
        assert_eq!(geometry.vertex_buffer().byte_length(), 24 * NormalVertex::STRIDE);
        assert_eq!(geometry.index_type(), Some(IndexType::U16));
    }

    #[test]
    fn box_faces_wind_counter_clockwise_from_outside() {
        let vertices = box_corners(2.0, 2.0, 2.0);
        for face in vertices.chunks(4) {
            let [a, b, c] = [face[0].position, face[1].position, face[2].position];
            let ab = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
            let ac = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
            let cross = [
                ab[1] * ac[2] - ab[2] * ac[1],
                ab[2] * ac[0] - ab[0] * ac[2],
                ab[0] * ac[1] - ab[1] * ac[0],
            ];
            let n = face[0].normal;
            assert!(cross[0] * n[0] + cross[1] * n[1] + cross[2] * n[2] > 0.0);
        }
    }

    #[test]
    fn plane_is_one_upward_quad() {
        let geometry = plane_geometry(4.0, 2.0).unwrap();
        assert_eq!(geometry.size(), 6);
        assert_eq!(geometry.vertex_buffer().byte_length(), 4 * NormalVertex::STRIDE);
        assert!(geometry.attribute("position").is_some());
        assert!(geometry.attribute("normal").is_some());

        let vertices: Vec<NormalVertex> = geometry
            .vertex_buffer()
            .data()
            .chunks_exact(NormalVertex::STRIDE as usize)
            .map(bytemuck::pod_read_unaligned)
            .collect();
        assert!(vertices.iter().all(|v| v.normal == [0.0, 1.0, 0.0] && v.position[1] == 0.0));
        let xs: Vec<f32> = vertices.iter().map(|v| v.position[0].abs()).collect();
        let zs: Vec<f32> = vertices.iter().map(|v| v.position[2].abs()).collect();
        assert!(xs.iter().all(|x| *x == 2.0));
        assert!(zs.iter().all(|z| *z == 1.0));
    }
}
