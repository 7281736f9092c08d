//! scene-ngin
//!
//! A minimal real-time 3D engine. A scene is a tree of nodes carrying local
//! transforms; renderable nodes pair a geometry with a named shader program.
//! Geometry creates its GPU buffers lazily and rendering batches draw calls by
//! program, so each program is bound and fed its camera state once per frame.
//!
//! High-level modules
//! - `context`: handles, enums and the `Renderer` trait all GPU access goes through
//! - `data_structures`: scene graph, transforms, cameras, renderables and the scene root
//! - `resources`: buffers, geometry and a few procedural shapes
//! - `render`: the program cache grouping renderables by program
//! - `backends`: a `wgpu` renderer and a recording headless renderer
//! - `pipelines`: WGSL programs and pipeline construction
//! - `flow`: the windowed frame driver
//! - `error`: the engine's error type
//!

pub mod backends;
pub mod context;
pub mod data_structures;
pub mod error;
#[cfg(not(target_arch = "wasm32"))]
pub mod flow;
pub mod pipelines;
pub mod render;
pub mod resources;

pub use backends::{HeadlessRenderer, WgpuRenderer};
pub use context::{Config, Renderer};
pub use data_structures::{
    camera::{Camera, Projection},
    renderable::Renderable,
    scene::{Scene, UpdateContext, UpdateListener},
    scene_graph::{ContainerNode, NodeId, Object3D, SceneNode},
    transform::Transform,
};
pub use error::{RenderError, Result};
pub use resources::{Buffer, Geometry};

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath;
pub use wgpu;
pub use winit::event::WindowEvent;
