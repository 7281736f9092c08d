//! Engine data structures: the scene tree and what lives in it.
//!
//! - `scene_graph` holds the node trait, the shared node state and group nodes
//! - `transform` holds the local position, rotation and scale of a node
//! - `renderable` is a node drawing a geometry with a named program
//! - `camera` contains projection and view for rendering
//! - `scene` is the root node that batches rendering by program
//! - `texture` contains depth and offscreen render targets

pub mod camera;
pub mod renderable;
pub mod scene;
pub mod scene_graph;
pub mod texture;
pub mod transform;
