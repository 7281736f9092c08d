/**
 * This module contains the GPU-backed resources renderables draw with:
 * buffers, geometries and a few ready-made shapes.
 */
pub mod buffer;
pub mod geometry;
pub mod shapes;

pub use buffer::Buffer;
pub use geometry::Geometry;
