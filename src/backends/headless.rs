//! A renderer without a GPU.
//!
//! [`HeadlessRenderer`] hands out handles from a counter, keeps uploaded
//! buffer contents in memory and records every call it receives as a
//! [`Command`]. It is what the test-suite drives scenes with, and it doubles
//! as a dry-run target for checking the call sequence a scene produces.

use std::collections::{HashMap, HashSet};

use cgmath::Matrix4;
use log::warn;

use crate::{
    context::{
        AttributeDescriptor, BufferHandle, BufferUsage, ContextId, IndexType, PrimitiveMode,
        Program, Renderer, UniformLocation, VertexArrayHandle,
    },
    data_structures::renderable::MODEL_UNIFORM,
    error::{RenderError, Result},
};

/// One call received by a [`HeadlessRenderer`].
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateBuffer {
        buffer: BufferHandle,
        byte_length: u64,
        usage: BufferUsage,
    },
    UpdateBufferData {
        buffer: BufferHandle,
        offset: u64,
        byte_length: u64,
    },
    DeleteBuffer(BufferHandle),
    CreateVertexArray(VertexArrayHandle),
    ActivateVertexArray(Option<VertexArrayHandle>),
    DeleteVertexArray(VertexArrayHandle),
    ActivateBuffer {
        buffer: BufferHandle,
        usage: BufferUsage,
    },
    EnableAttribute {
        name: String,
        attribute: AttributeDescriptor,
    },
    UseProgram(Option<String>),
    ApplyProgramState {
        program: String,
        projection: Matrix4<f32>,
        view: Matrix4<f32>,
    },
    SetUniformMatrix {
        location: UniformLocation,
        matrix: Matrix4<f32>,
    },
    DrawArrays {
        mode: PrimitiveMode,
        first: u32,
        count: u32,
    },
    DrawElements {
        mode: PrimitiveMode,
        count: u32,
        index_type: IndexType,
        offset: u64,
    },
}

/// A program known to a [`HeadlessRenderer`]: a name and a uniform table.
#[derive(Debug, Clone)]
pub struct HeadlessProgram {
    name: String,
    ready: bool,
    uniforms: HashMap<String, UniformLocation>,
}

impl HeadlessProgram {
    /// A ready program exposing the `model` uniform.
    pub fn new(name: impl Into<String>) -> Self {
        Self::bare(name).with_uniform(MODEL_UNIFORM)
    }

    /// A ready program without any uniform.
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ready: true,
            uniforms: HashMap::new(),
        }
    }

    /// Adds a uniform at the next free location.
    pub fn with_uniform(mut self, name: impl Into<String>) -> Self {
        let location = UniformLocation::from_raw(self.uniforms.len() as u32);
        self.uniforms.insert(name.into(), location);
        self
    }

    pub fn with_ready(mut self, ready: bool) -> Self {
        self.ready = ready;
        self
    }

    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }
}

impl Program for HeadlessProgram {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn uniform(&self, name: &str) -> Option<UniformLocation> {
        self.uniforms.get(name).copied()
    }
}

/// Creation and deletion counts of a [`HeadlessRenderer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocationStats {
    pub buffers_created: usize,
    pub buffers_deleted: usize,
    pub vertex_arrays_created: usize,
    pub vertex_arrays_deleted: usize,
}

impl AllocationStats {
    pub fn live_buffers(&self) -> usize {
        self.buffers_created - self.buffers_deleted
    }

    pub fn live_vertex_arrays(&self) -> usize {
        self.vertex_arrays_created - self.vertex_arrays_deleted
    }
}

#[derive(Debug)]
struct StoredBuffer {
    usage: BufferUsage,
    data: Vec<u8>,
}

pub struct HeadlessRenderer {
    context: ContextId,
    next_handle: u64,
    buffers: HashMap<BufferHandle, StoredBuffer>,
    vertex_arrays: HashSet<VertexArrayHandle>,
    programs: HashMap<String, HeadlessProgram>,
    active_program: Option<String>,
    active_vertex_array: Option<VertexArrayHandle>,
    commands: Vec<Command>,
    stats: AllocationStats,
    failing_buffers: usize,
    failing_vertex_arrays: usize,
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self {
            context: ContextId::next(),
            next_handle: 1,
            buffers: HashMap::new(),
            vertex_arrays: HashSet::new(),
            programs: HashMap::new(),
            active_program: None,
            active_vertex_array: None,
            commands: Vec::new(),
            stats: AllocationStats::default(),
            failing_buffers: 0,
            failing_vertex_arrays: 0,
        }
    }

    /// Renderer with a ready program for every name in `programs`.
    pub fn with_programs<'a>(programs: impl IntoIterator<Item = &'a str>) -> Self {
        let mut renderer = Self::new();
        for name in programs {
            renderer.register_program(HeadlessProgram::new(name));
        }
        renderer
    }

    /// Registers `program`, replacing one of the same name.
    pub fn register_program(&mut self, program: HeadlessProgram) {
        self.programs.insert(program.name.clone(), program);
    }

    pub fn program_mut(&mut self, name: &str) -> Option<&mut HeadlessProgram> {
        self.programs.get_mut(name)
    }

    /// Makes the next `count` buffer allocations return no handle.
    pub fn fail_next_buffer_allocations(&mut self, count: usize) {
        self.failing_buffers = count;
    }

    /// Makes the next `count` vertex array allocations return no handle.
    pub fn fail_next_vertex_array_allocations(&mut self, count: usize) {
        self.failing_vertex_arrays = count;
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Returns the recorded commands and starts a fresh log.
    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    pub fn stats(&self) -> AllocationStats {
        self.stats
    }

    pub fn is_live_buffer(&self, buffer: BufferHandle) -> bool {
        self.buffers.contains_key(&buffer)
    }

    pub fn is_live_vertex_array(&self, vertex_array: VertexArrayHandle) -> bool {
        self.vertex_arrays.contains(&vertex_array)
    }

    pub fn buffer_data(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(|stored| stored.data.as_slice())
    }

    pub fn buffer_usage(&self, buffer: BufferHandle) -> Option<BufferUsage> {
        self.buffers.get(&buffer).map(|stored| stored.usage)
    }

    pub fn active_vertex_array(&self) -> Option<VertexArrayHandle> {
        self.active_vertex_array
    }

    pub fn active_program_name(&self) -> Option<&str> {
        self.active_program.as_deref()
    }

    fn next_handle(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }
}

impl Default for HeadlessRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for HeadlessRenderer {
    fn context_id(&self) -> ContextId {
        self.context
    }

    fn create_buffer(&mut self, byte_length: u64, usage: BufferUsage) -> Option<BufferHandle> {
        if self.failing_buffers > 0 {
            self.failing_buffers -= 1;
            return None;
        }
        let buffer = BufferHandle::from_raw(self.next_handle());
        self.buffers.insert(
            buffer,
            StoredBuffer {
                usage,
                data: vec![0; byte_length as usize],
            },
        );
        self.stats.buffers_created += 1;
        self.commands.push(Command::CreateBuffer {
            buffer,
            byte_length,
            usage,
        });
        Some(buffer)
    }

    fn update_buffer_data(&mut self, buffer: BufferHandle, data: &[u8], offset: u64) {
        let Some(stored) = self.buffers.get_mut(&buffer) else {
            warn!("Upload to unknown buffer {buffer:?} ignored.");
            return;
        };
        let start = offset as usize;
        let end = start + data.len();
        if stored.data.len() < end {
            stored.data.resize(end, 0);
        }
        stored.data[start..end].copy_from_slice(data);
        self.commands.push(Command::UpdateBufferData {
            buffer,
            offset,
            byte_length: data.len() as u64,
        });
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        if self.buffers.remove(&buffer).is_none() {
            warn!("Deleting unknown buffer {buffer:?}.");
            return;
        }
        self.stats.buffers_deleted += 1;
        self.commands.push(Command::DeleteBuffer(buffer));
    }

    fn create_vertex_array(&mut self) -> Option<VertexArrayHandle> {
        if self.failing_vertex_arrays > 0 {
            self.failing_vertex_arrays -= 1;
            return None;
        }
        let vertex_array = VertexArrayHandle::from_raw(self.next_handle());
        self.vertex_arrays.insert(vertex_array);
        self.stats.vertex_arrays_created += 1;
        self.commands.push(Command::CreateVertexArray(vertex_array));
        Some(vertex_array)
    }

    fn activate_vertex_array(&mut self, vertex_array: Option<VertexArrayHandle>) {
        self.active_vertex_array = vertex_array;
        self.commands.push(Command::ActivateVertexArray(vertex_array));
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
        if !self.vertex_arrays.remove(&vertex_array) {
            warn!("Deleting unknown vertex array {vertex_array:?}.");
            return;
        }
        if self.active_vertex_array == Some(vertex_array) {
            self.active_vertex_array = None;
        }
        self.stats.vertex_arrays_deleted += 1;
        self.commands.push(Command::DeleteVertexArray(vertex_array));
    }

    fn activate_buffer(&mut self, buffer: BufferHandle, usage: BufferUsage) {
        self.commands.push(Command::ActivateBuffer { buffer, usage });
    }

    fn enable_attribute(&mut self, name: &str, attribute: &AttributeDescriptor) {
        self.commands.push(Command::EnableAttribute {
            name: name.to_string(),
            attribute: *attribute,
        });
    }

    fn use_program(&mut self, name: Option<&str>) -> Result<()> {
        if let Some(name) = name {
            if !self.programs.contains_key(name) {
                return Err(RenderError::UnknownProgram(name.to_string()));
            }
        }
        self.active_program = name.map(str::to_string);
        self.commands.push(Command::UseProgram(self.active_program.clone()));
        Ok(())
    }

    fn active_program(&self) -> Option<&dyn Program> {
        let name = self.active_program.as_ref()?;
        self.programs.get(name).map(|program| program as &dyn Program)
    }

    fn apply_program_state(
        &mut self,
        projection: &Matrix4<f32>,
        view: &Matrix4<f32>,
    ) -> Result<()> {
        let program = self
            .active_program
            .clone()
            .ok_or(RenderError::NoActiveProgram)?;
        if !self.programs.get(&program).is_some_and(|p| p.ready) {
            return Err(RenderError::ProgramNotReady(program));
        }
        self.commands.push(Command::ApplyProgramState {
            program,
            projection: *projection,
            view: *view,
        });
        Ok(())
    }

    fn set_uniform_matrix(&mut self, location: UniformLocation, matrix: &Matrix4<f32>) {
        self.commands.push(Command::SetUniformMatrix {
            location,
            matrix: *matrix,
        });
    }

    fn draw_arrays(&mut self, mode: PrimitiveMode, first: u32, count: u32) {
        self.commands.push(Command::DrawArrays { mode, first, count });
    }

    fn draw_elements(&mut self, mode: PrimitiveMode, count: u32, index_type: IndexType, offset: u64) {
        self.commands.push(Command::DrawElements {
            mode,
            count,
            index_type,
            offset,
        });
    }
}
