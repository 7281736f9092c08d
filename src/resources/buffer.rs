//! CPU-side data blobs backed by lazily created GPU buffers.

use crate::{
    context::{BufferHandle, BufferUsage, Renderer},
    error::{RenderError, Result},
};

/// A data blob that is uploaded to a GPU buffer on first [`Buffer::initialize`].
///
/// The data is fixed at construction. A handle is present exactly while the
/// buffer is initialized.
#[derive(Debug)]
pub struct Buffer {
    data: Vec<u8>,
    usage: BufferUsage,
    handle: Option<BufferHandle>,
}

impl Buffer {
    pub fn new(data: Vec<u8>, usage: BufferUsage) -> Self {
        Self {
            data,
            usage,
            handle: None,
        }
    }

    pub fn from_slice<T: bytemuck::Pod>(data: &[T], usage: BufferUsage) -> Self {
        Self::new(bytemuck::cast_slice(data).to_vec(), usage)
    }

    /// Creates the GPU buffer and uploads the data at offset 0.
    ///
    /// A handle left over from an earlier call is released first.
    pub fn initialize(&mut self, renderer: &mut dyn Renderer) -> Result<BufferHandle> {
        if let Some(old) = self.handle.take() {
            renderer.delete_buffer(old);
        }
        let handle = renderer
            .create_buffer(self.byte_length(), self.usage)
            .ok_or(RenderError::ResourceAllocation { resource: "buffer" })?;
        renderer.update_buffer_data(handle, &self.data, 0);
        self.handle = Some(handle);
        Ok(handle)
    }

    /// Releases the GPU buffer. Does nothing if there is none.
    pub fn destroy(&mut self, renderer: &mut dyn Renderer) {
        if let Some(handle) = self.handle.take() {
            renderer.delete_buffer(handle);
        }
    }

    pub fn byte_length(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    pub fn handle(&self) -> Option<BufferHandle> {
        self.handle
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn is_initialized(&self) -> bool {
        self.handle.is_some()
    }
}
