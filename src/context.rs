//! The GPU-context facade the scene renders through.
//!
//! [`Renderer`] is the capability surface every backend provides: buffer and
//! vertex-array allocation, program binding, attribute and uniform binding and
//! draw-call issuance. Handles it returns are only meaningful for the context
//! that produced them, see [`ContextId`].
//!
//! [`Config`] collects the knobs [`crate::flow::run`] needs to open a window
//! and set up a camera.

use std::sync::atomic::{AtomicU64, Ordering};

use cgmath::Matrix4;

use crate::error::Result;

/// Identity of one GPU context. Every renderer gets a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl ContextId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Handle to a driver-side buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(u64);

/// Handle to a vertex array: the recorded attribute-to-buffer bindings of a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexArrayHandle(u64);

/// Location of a uniform inside a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(u32);

macro_rules! raw_handle {
    ($($name:ident: $raw:ty),*) => {
        $(impl $name {
            pub const fn from_raw(raw: $raw) -> Self {
                Self(raw)
            }

            pub const fn raw(&self) -> $raw {
                self.0
            }
        })*
    };
}
raw_handle!(BufferHandle: u64, VertexArrayHandle: u64, UniformLocation: u32);

/// What a buffer is bound as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    Vertex,
    Index,
}

/// Primitive assembly mode of a draw call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveMode {
    Points,
    Lines,
    LineStrip,
    #[default]
    Triangles,
    TriangleStrip,
}

/// Element type of an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexType {
    #[default]
    U16,
    U32,
}

impl IndexType {
    pub fn byte_size(&self) -> u64 {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeFormat {
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
}

impl AttributeFormat {
    pub fn components(&self) -> u32 {
        match self {
            AttributeFormat::Float32 => 1,
            AttributeFormat::Float32x2 => 2,
            AttributeFormat::Float32x3 => 3,
            AttributeFormat::Float32x4 => 4,
        }
    }

    pub fn byte_size(&self) -> u64 {
        self.components() as u64 * 4
    }
}

/// How one named vertex attribute is laid out inside the vertex buffer.
///
/// `stride` is the distance in bytes between two consecutive vertices and
/// `offset` the position of this attribute inside one vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeDescriptor {
    pub format: AttributeFormat,
    pub stride: u64,
    pub offset: u64,
}

impl AttributeDescriptor {
    pub fn new(format: AttributeFormat, stride: u64, offset: u64) -> Self {
        Self {
            format,
            stride,
            offset,
        }
    }
}

/// A named shader program living inside a renderer.
pub trait Program {
    fn name(&self) -> &str;

    /// Whether compilation finished. Programs must be ready before a scene
    /// using them is attached or rendered.
    fn is_ready(&self) -> bool {
        true
    }

    fn uniform(&self, name: &str) -> Option<UniformLocation>;
}

/// Capability surface of a single GPU context.
///
/// All calls happen on the thread owning the context. Handles are valid only
/// for the renderer (see [`Renderer::context_id`]) that created them; releasing
/// them through another renderer is the caller's mistake.
pub trait Renderer {
    fn context_id(&self) -> ContextId;

    /// Allocates a buffer of `byte_length` bytes, `None` if the driver refused.
    fn create_buffer(&mut self, byte_length: u64, usage: BufferUsage) -> Option<BufferHandle>;

    fn update_buffer_data(&mut self, buffer: BufferHandle, data: &[u8], offset: u64);

    fn delete_buffer(&mut self, buffer: BufferHandle);

    fn create_vertex_array(&mut self) -> Option<VertexArrayHandle>;

    /// Binds `vertex_array`, or unbinds the current one with `None`.
    fn activate_vertex_array(&mut self, vertex_array: Option<VertexArrayHandle>);

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayHandle);

    /// Binds `buffer` to its target. While a vertex array is active the
    /// binding is captured by it.
    fn activate_buffer(&mut self, buffer: BufferHandle, usage: BufferUsage);

    /// Enables `name` on the active vertex array, sourced from the bound vertex buffer.
    fn enable_attribute(&mut self, name: &str, attribute: &AttributeDescriptor);

    /// Binds the named program, or unbinds with `None`.
    fn use_program(&mut self, name: Option<&str>) -> Result<()>;

    fn active_program(&self) -> Option<&dyn Program>;

    /// Applies the active program's per-frame camera state.
    fn apply_program_state(&mut self, projection: &Matrix4<f32>, view: &Matrix4<f32>)
    -> Result<()>;

    fn set_uniform_matrix(&mut self, location: UniformLocation, matrix: &Matrix4<f32>);

    fn draw_arrays(&mut self, mode: PrimitiveMode, first: u32, count: u32);

    /// Indexed draw of `count` indices, starting `offset` bytes into the index buffer.
    fn draw_elements(&mut self, mode: PrimitiveMode, count: u32, index_type: IndexType, offset: u64);
}

/// Startup configuration of a windowed application.
#[derive(Debug, Clone)]
pub struct Config {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub clear_colour: wgpu::Color,
    /// Vertical field of view in degrees.
    pub fovy: f32,
    pub znear: f32,
    pub zfar: f32,
    /// `env_logger` filter, falls back to `RUST_LOG` when unset.
    pub log_filter: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title: "scene-ngin".to_string(),
            width: 1280,
            height: 720,
            clear_colour: wgpu::Color {
                r: 0.1,
                g: 0.2,
                b: 0.3,
                a: 1.0,
            },
            fovy: 45.0,
            znear: 0.1,
            zfar: 500.0,
            log_filter: None,
        }
    }
}
