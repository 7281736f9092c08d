//! Error types for the scene and GPU-resource layer.
//!
//! Everything the scene graph, the geometry lifecycle and the batched render
//! pass can fail with is a [`RenderError`]. Window, surface and device setup in
//! [`crate::flow`] report through `anyhow` instead, since those failures are
//! only ever shown to a human.

use thiserror::Error;

use crate::context::ContextId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// An attribute with this name is already part of the geometry.
    #[error("Attribute {0} already exists in this geometry.")]
    DuplicateAttribute(String),

    /// The renderer handed back no handle for a buffer or vertex array.
    #[error("Failed to allocate GPU {resource}.")]
    ResourceAllocation { resource: &'static str },

    /// The scene's active camera index points past its camera list.
    #[error("Active camera index {index} is out of range for {count} camera(s).")]
    InvalidCameraIndex { index: usize, count: usize },

    #[error("Program {0} is not registered with this renderer.")]
    UnknownProgram(String),

    /// The program exists but its shaders are not compiled yet.
    #[error("Program {0} is not ready yet.")]
    ProgramNotReady(String),

    #[error("No program is bound.")]
    NoActiveProgram,

    /// GPU handles may only be released through the context that created them.
    #[error("Resource was created on context {created:?} but released through {current:?}.")]
    ContextMismatch {
        created: ContextId,
        current: ContextId,
    },
}

pub type Result<T> = std::result::Result<T, RenderError>;
