//! Drawable geometry: vertex data, an optional index buffer and the attribute
//! layout that feeds them to a program.
//!
//! A [`Geometry`] is built with its data already in place and stays on the CPU
//! until [`Geometry::initialize`] creates the buffers and the vertex array on a
//! renderer. From then on it belongs to that renderer's context and has to be
//! released through it with [`Geometry::destroy`].

use log::warn;

use crate::{
    context::{
        AttributeDescriptor, BufferUsage, ContextId, IndexType, PrimitiveMode, Renderer,
        VertexArrayHandle,
    },
    error::{RenderError, Result},
    resources::buffer::Buffer,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GpuState {
    Uninitialized,
    Initialized {
        vertex_array: VertexArrayHandle,
        context: ContextId,
    },
}

#[derive(Debug)]
struct IndexBuffer {
    buffer: Buffer,
    index_type: IndexType,
}

#[derive(Debug)]
pub struct Geometry {
    vertices: Buffer,
    indices: Option<IndexBuffer>,
    /// Kept in insertion order, names are unique.
    attributes: Vec<(String, AttributeDescriptor)>,
    mode: PrimitiveMode,
    size: u32,
    state: GpuState,
}

impl Geometry {
    /// Non-indexed geometry drawing `size` vertices from `vertices`.
    pub fn new(vertices: Buffer, size: u32, mode: PrimitiveMode) -> Self {
        Self {
            vertices,
            indices: None,
            attributes: Vec::new(),
            mode,
            size,
            state: GpuState::Uninitialized,
        }
    }

    /// Indexed geometry. The element count is the number of indices in `indices`.
    pub fn indexed(
        indices: Buffer,
        vertices: Buffer,
        mode: PrimitiveMode,
        index_type: IndexType,
    ) -> Self {
        let size = (indices.byte_length() / index_type.byte_size()) as u32;
        Self {
            vertices,
            indices: Some(IndexBuffer {
                buffer: indices,
                index_type,
            }),
            attributes: Vec::new(),
            mode,
            size,
            state: GpuState::Uninitialized,
        }
    }

    /// Declares how the attribute `name` is read from the vertex buffer.
    ///
    /// Fails if `name` is already declared, leaving the layout untouched.
    /// Attributes added after [`Geometry::initialize`] only take effect on the
    /// next initialization.
    pub fn add_attribute(
        &mut self,
        name: impl Into<String>,
        descriptor: AttributeDescriptor,
    ) -> Result<()> {
        let name = name.into();
        if self.attribute(&name).is_some() {
            return Err(RenderError::DuplicateAttribute(name));
        }
        if self.is_initialized() {
            warn!("Attribute {name} added to an initialized geometry, it is bound on the next initialize.");
        }
        self.attributes.push((name, descriptor));
        Ok(())
    }

    /// Builder form of [`Geometry::add_attribute`].
    pub fn with_attribute(
        mut self,
        name: impl Into<String>,
        descriptor: AttributeDescriptor,
    ) -> Result<Self> {
        self.add_attribute(name, descriptor)?;
        Ok(self)
    }

    /// Uploads all buffers, creates the vertex array and records the attribute
    /// and index bindings into it.
    ///
    /// An already initialized geometry is destroyed first. On failure every
    /// resource created by this call is released again and the geometry stays
    /// uninitialized.
    pub fn initialize(&mut self, renderer: &mut dyn Renderer) -> Result<()> {
        if self.is_initialized() {
            warn!("Geometry already initialized.");
            self.destroy(renderer)?;
        }

        let vertex_buffer = self.vertices.initialize(renderer)?;
        let Some(vertex_array) = renderer.create_vertex_array() else {
            self.vertices.destroy(renderer);
            return Err(RenderError::ResourceAllocation {
                resource: "vertex array",
            });
        };

        renderer.activate_vertex_array(Some(vertex_array));
        renderer.activate_buffer(vertex_buffer, BufferUsage::Vertex);
        for (name, descriptor) in &self.attributes {
            renderer.enable_attribute(name, descriptor);
        }

        if let Some(indices) = self.indices.as_mut() {
            match indices.buffer.initialize(renderer) {
                Ok(index_buffer) => renderer.activate_buffer(index_buffer, BufferUsage::Index),
                Err(err) => {
                    renderer.activate_vertex_array(None);
                    renderer.delete_vertex_array(vertex_array);
                    self.vertices.destroy(renderer);
                    return Err(err);
                }
            }
        }
        renderer.activate_vertex_array(None);

        self.state = GpuState::Initialized {
            vertex_array,
            context: renderer.context_id(),
        };
        Ok(())
    }

    /// Draws the whole geometry with the currently bound program and vertex array.
    pub fn render(&self, renderer: &mut dyn Renderer) {
        if !self.is_initialized() {
            warn!("Geometry rendered before initialized.");
            return;
        }
        match &self.indices {
            Some(indices) => renderer.draw_elements(self.mode, self.size, indices.index_type, 0),
            None => renderer.draw_arrays(self.mode, 0, self.size),
        }
    }

    /// Releases the vertex array and every owned buffer.
    ///
    /// Destroying an uninitialized geometry only logs. Releasing through a
    /// renderer other than the creating one fails and keeps the geometry
    /// initialized.
    pub fn destroy(&mut self, renderer: &mut dyn Renderer) -> Result<()> {
        let GpuState::Initialized {
            vertex_array,
            context,
        } = self.state
        else {
            warn!("Geometry destroyed before initialized.");
            return Ok(());
        };
        let current = renderer.context_id();
        if context != current {
            return Err(RenderError::ContextMismatch {
                created: context,
                current,
            });
        }

        renderer.delete_vertex_array(vertex_array);
        self.vertices.destroy(renderer);
        if let Some(indices) = self.indices.as_mut() {
            indices.buffer.destroy(renderer);
        }
        self.state = GpuState::Uninitialized;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self.state, GpuState::Initialized { .. })
    }

    /// Context the GPU resources live on, if initialized.
    pub fn context(&self) -> Option<ContextId> {
        match self.state {
            GpuState::Initialized { context, .. } => Some(context),
            GpuState::Uninitialized => None,
        }
    }

    pub fn vertex_array(&self) -> Option<VertexArrayHandle> {
        match self.state {
            GpuState::Initialized { vertex_array, .. } => Some(vertex_array),
            GpuState::Uninitialized => None,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes
            .iter()
            .find(|(attribute, _)| attribute == name)
            .map(|(_, descriptor)| descriptor)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &AttributeDescriptor)> {
        self.attributes
            .iter()
            .map(|(name, descriptor)| (name.as_str(), descriptor))
    }

    pub fn vertex_buffer(&self) -> &Buffer {
        &self.vertices
    }

    pub fn index_buffer(&self) -> Option<&Buffer> {
        self.indices.as_ref().map(|indices| &indices.buffer)
    }

    pub fn index_type(&self) -> Option<IndexType> {
        self.indices.as_ref().map(|indices| indices.index_type)
    }

    pub fn is_indexed(&self) -> bool {
        self.indices.is_some()
    }

    pub fn mode(&self) -> PrimitiveMode {
        self.mode
    }

    /// Number of vertices, or indices for indexed geometry, one draw covers.
    pub fn size(&self) -> u32 {
        self.size
    }
}

impl Drop for Geometry {
    fn drop(&mut self) {
        if let GpuState::Initialized { context, .. } = self.state {
            warn!("Geometry dropped while still initialized on context {context:?}, its GPU resources leak.");
        }
    }
}
