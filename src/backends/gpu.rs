//! A [`Renderer`] on top of `wgpu`.
//!
//! Buffers are real `wgpu::Buffer`s. Vertex arrays are CPU-side records of the
//! buffers and attributes bound while they were active, as in GL. Draw calls
//! issued during [`crate::data_structures::scene::Scene::render`] are recorded
//! together with the camera and model state they saw, and replayed in a single
//! render pass by [`WgpuRenderer::flush`]. Render pipelines are built lazily,
//! one per program, vertex layout and topology.

use std::{collections::HashMap, time::Duration};

use anyhow::Context as _;
use cgmath::{Matrix4, SquareMatrix};
use log::{debug, warn};

use crate::{
    context::{
        AttributeDescriptor, AttributeFormat, BufferHandle, BufferUsage, ContextId, IndexType,
        PrimitiveMode, Program, Renderer, UniformLocation, VertexArrayHandle,
    },
    data_structures::texture::Texture,
    error::{RenderError, Result},
    pipelines::{
        self, CAMERA_UNIFORM_SIZE, MODEL_LOCATION, MODEL_UNIFORM_SIZE, WgslProgram,
    },
};

/// Maps GL clip space (depth `-1..1`) to wgpu clip space (depth `0..1`).
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct CameraUniform {
    projection: [[f32; 4]; 4],
    view: [[f32; 4]; 4],
}

type ModelUniform = [[f32; 4]; 4];

struct GpuBuffer {
    buffer: wgpu::Buffer,
    usage: BufferUsage,
}

#[derive(Debug, Clone, Default)]
struct VertexArrayRecord {
    attributes: Vec<(String, BufferHandle, AttributeDescriptor)>,
    index_buffer: Option<BufferHandle>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct VertexSlotKey {
    stride: u64,
    /// Shader location, format and offset of every attribute read from the slot.
    attributes: Vec<(u32, AttributeFormat, u64)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PipelineKey {
    program: String,
    mode: PrimitiveMode,
    strip_index: Option<IndexType>,
    slots: Vec<VertexSlotKey>,
}

#[derive(Debug, Clone, Copy)]
enum DrawKind {
    Arrays {
        first: u32,
        count: u32,
    },
    Elements {
        count: u32,
        index_type: IndexType,
        offset: u64,
    },
}

#[derive(Debug)]
struct RecordedDraw {
    key: PipelineKey,
    vertex_buffers: Vec<BufferHandle>,
    index_buffer: Option<BufferHandle>,
    camera: u32,
    model: u32,
    kind: DrawKind,
}

/// Everything recorded since the last flush.
#[derive(Default)]
struct FrameRecording {
    cameras: Vec<CameraUniform>,
    models: Vec<ModelUniform>,
    draws: Vec<RecordedDraw>,
    current_camera: Option<u32>,
    current_model: Option<u32>,
}

/// A uniform buffer holding one element per slot, addressed by dynamic offset.
struct DynamicUniform {
    label: &'static str,
    element_size: u64,
    stride: u64,
    capacity: u64,
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl DynamicUniform {
    fn new(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        label: &'static str,
        element_size: u64,
        capacity: u64,
    ) -> Self {
        let alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
        let stride = element_size.div_ceil(alignment) * alignment;
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: stride * capacity,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(element_size),
                }),
            }],
            label: Some(label),
        });
        Self {
            label,
            element_size,
            stride,
            capacity,
            buffer,
            bind_group,
        }
    }

    /// Writes `elements` into consecutive slots, growing the buffer if needed.
    fn upload(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        elements: &[u8],
    ) {
        let count = elements.len() as u64 / self.element_size;
        if count == 0 {
            return;
        }
        if count > self.capacity {
            debug!("Growing {} to {} slots", self.label, count.next_power_of_two());
            self.buffer.destroy();
            *self = Self::new(
                device,
                layout,
                self.label,
                self.element_size,
                count.next_power_of_two(),
            );
        }
        let element_size = self.element_size as usize;
        let mut staging = vec![0u8; (count * self.stride) as usize];
        for (slot, element) in elements.chunks_exact(element_size).enumerate() {
            let start = slot * self.stride as usize;
            staging[start..start + element_size].copy_from_slice(element);
        }
        queue.write_buffer(&self.buffer, 0, &staging);
    }

    fn offset(&self, slot: u32) -> u32 {
        (slot as u64 * self.stride) as u32
    }
}

fn vertex_format(format: AttributeFormat) -> wgpu::VertexFormat {
    match format {
        AttributeFormat::Float32 => wgpu::VertexFormat::Float32,
        AttributeFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
        AttributeFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
        AttributeFormat::Float32x4 => wgpu::VertexFormat::Float32x4,
    }
}

fn index_format(index_type: IndexType) -> wgpu::IndexFormat {
    match index_type {
        IndexType::U16 => wgpu::IndexFormat::Uint16,
        IndexType::U32 => wgpu::IndexFormat::Uint32,
    }
}

fn topology(mode: PrimitiveMode) -> wgpu::PrimitiveTopology {
    match mode {
        PrimitiveMode::Points => wgpu::PrimitiveTopology::PointList,
        PrimitiveMode::Lines => wgpu::PrimitiveTopology::LineList,
        PrimitiveMode::LineStrip => wgpu::PrimitiveTopology::LineStrip,
        PrimitiveMode::Triangles => wgpu::PrimitiveTopology::TriangleList,
        PrimitiveMode::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
    }
}

fn is_strip(mode: PrimitiveMode) -> bool {
    matches!(mode, PrimitiveMode::LineStrip | PrimitiveMode::TriangleStrip)
}

/// Requests an adapter and a device, compatible with `surface` when given.
pub async fn request_device(
    instance: &wgpu::Instance,
    surface: Option<&wgpu::Surface<'_>>,
) -> anyhow::Result<(wgpu::Adapter, wgpu::Device, wgpu::Queue)> {
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: surface,
            force_fallback_adapter: false,
        })
        .await
        .context("No suitable GPU adapter found")?;
    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: None,
            required_features: wgpu::Features::empty(),
            required_limits: if cfg!(target_arch = "wasm32") {
                wgpu::Limits::downlevel_webgl2_defaults()
            } else {
                wgpu::Limits::default()
            },
            memory_hints: Default::default(),
            ..Default::default()
        })
        .await
        .context("Failed to create the GPU device")?;
    Ok((adapter, device, queue))
}

pub struct WgpuRenderer {
    context: ContextId,
    device: wgpu::Device,
    queue: wgpu::Queue,
    target_format: wgpu::TextureFormat,
    next_handle: u64,
    buffers: HashMap<BufferHandle, GpuBuffer>,
    vertex_arrays: HashMap<VertexArrayHandle, VertexArrayRecord>,
    programs: HashMap<String, WgslProgram>,
    active_program: Option<String>,
    active_vertex_array: Option<VertexArrayHandle>,
    bound_vertex_buffer: Option<BufferHandle>,
    camera_layout: wgpu::BindGroupLayout,
    model_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    cameras: DynamicUniform,
    models: DynamicUniform,
    frame: FrameRecording,
}

impl WgpuRenderer {
    /// Renderer drawing into targets of `target_format` with a
    /// [`Texture::DEPTH_FORMAT`] depth buffer.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, target_format: wgpu::TextureFormat) -> Self {
        let camera_layout = pipelines::camera_bind_group_layout(&device);
        let model_layout = pipelines::model_bind_group_layout(&device);
        let pipeline_layout = pipelines::mk_pipeline_layout(&device, &camera_layout, &model_layout);
        let cameras =
            DynamicUniform::new(&device, &camera_layout, "Camera Buffer", CAMERA_UNIFORM_SIZE, 4);
        let models =
            DynamicUniform::new(&device, &model_layout, "Model Buffer", MODEL_UNIFORM_SIZE, 64);
        Self {
            context: ContextId::next(),
            device,
            queue,
            target_format,
            next_handle: 1,
            buffers: HashMap::new(),
            vertex_arrays: HashMap::new(),
            programs: HashMap::new(),
            active_program: None,
            active_vertex_array: None,
            bound_vertex_buffer: None,
            camera_layout,
            model_layout,
            pipeline_layout,
            pipelines: HashMap::new(),
            cameras,
            models,
            frame: FrameRecording::default(),
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn target_format(&self) -> wgpu::TextureFormat {
        self.target_format
    }

    /// Compiles `program` and makes it available under its name.
    pub fn register_program(&mut self, mut program: WgslProgram) {
        program.compile(&self.device);
        let name = program.name().to_string();
        self.pipelines.retain(|key, _| key.program != name);
        self.programs.insert(name, program);
    }

    /// Number of draw calls waiting for [`WgpuRenderer::flush`].
    pub fn pending_draws(&self) -> usize {
        self.frame.draws.len()
    }

    fn next_handle(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    /// Pipeline key and buffers for a draw with the current bindings.
    fn resolve_draw(
        &self,
        mode: PrimitiveMode,
        indexed: Option<IndexType>,
    ) -> Option<(PipelineKey, Vec<BufferHandle>, Option<BufferHandle>)> {
        let Some(program_name) = self.active_program.as_ref() else {
            warn!("Draw call without a bound program skipped.");
            return None;
        };
        let program = self.programs.get(program_name)?;
        let Some(vertex_array) = self
            .active_vertex_array
            .and_then(|handle| self.vertex_arrays.get(&handle))
        else {
            warn!("Draw call without a vertex array skipped.");
            return None;
        };

        if let Some((missing, _)) = program.attributes().find(|(name, _)| {
            !vertex_array
                .attributes
                .iter()
                .any(|(attribute, _, _)| attribute == name)
        }) {
            warn!("Draw call skipped, program {program_name} needs attribute {missing}.");
            return None;
        }

        let mut buffers: Vec<BufferHandle> = Vec::new();
        let mut slots: Vec<VertexSlotKey> = Vec::new();
        for (name, buffer, descriptor) in &vertex_array.attributes {
            let Some(location) = program.attribute_location(name) else {
                continue;
            };
            let attribute = (location, descriptor.format, descriptor.offset);
            let existing = buffers
                .iter()
                .zip(slots.iter())
                .position(|(slot_buffer, slot)| slot_buffer == buffer && slot.stride == descriptor.stride);
            match existing {
                Some(idx) => slots[idx].attributes.push(attribute),
                None => {
                    buffers.push(*buffer);
                    slots.push(VertexSlotKey {
                        stride: descriptor.stride,
                        attributes: vec![attribute],
                    });
                }
            }
        }

        let index_buffer = match indexed {
            Some(_) => {
                let Some(index_buffer) = vertex_array.index_buffer else {
                    warn!("Indexed draw call without an index buffer skipped.");
                    return None;
                };
                Some(index_buffer)
            }
            None => None,
        };
        let key = PipelineKey {
            program: program_name.clone(),
            mode,
            strip_index: indexed.filter(|_| is_strip(mode)),
            slots,
        };
        Some((key, buffers, index_buffer))
    }

    fn record_draw(&mut self, mode: PrimitiveMode, kind: DrawKind) {
        let Some(camera) = self.frame.current_camera else {
            warn!("Draw call before the program state was applied skipped.");
            return;
        };
        let indexed = match kind {
            DrawKind::Elements { index_type, .. } => Some(index_type),
            DrawKind::Arrays { .. } => None,
        };
        let Some((key, vertex_buffers, index_buffer)) = self.resolve_draw(mode, indexed) else {
            return;
        };
        let model = match self.frame.current_model {
            Some(model) => model,
            None => {
                self.frame.models.push(Matrix4::<f32>::identity().into());
                let model = self.frame.models.len() as u32 - 1;
                self.frame.current_model = Some(model);
                model
            }
        };
        self.frame.draws.push(RecordedDraw {
            key,
            vertex_buffers,
            index_buffer,
            camera,
            model,
            kind,
        });
    }

    fn ensure_pipeline(&mut self, key: &PipelineKey) {
        if self.pipelines.contains_key(key) {
            return;
        }
        let Some(module) = self.programs.get(&key.program).and_then(|program| program.module())
        else {
            warn!("Program {} has no compiled module.", key.program);
            return;
        };
        debug!("Creating pipeline for program {} ({:?})", key.program, key.mode);

        let attributes: Vec<Vec<wgpu::VertexAttribute>> = key
            .slots
            .iter()
            .map(|slot| {
                slot.attributes
                    .iter()
                    .map(|(location, format, offset)| wgpu::VertexAttribute {
                        format: vertex_format(*format),
                        offset: *offset,
                        shader_location: *location,
                    })
                    .collect()
            })
            .collect();
        let layouts: Vec<wgpu::VertexBufferLayout> = key
            .slots
            .iter()
            .zip(attributes.iter())
            .map(|(slot, attributes)| wgpu::VertexBufferLayout {
                array_stride: slot.stride,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes,
            })
            .collect();
        let primitive = wgpu::PrimitiveState {
            topology: topology(key.mode),
            strip_index_format: key.strip_index.map(index_format),
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: Some(wgpu::Face::Back),
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        };

        let pipeline = pipelines::mk_render_pipeline(
            &self.device,
            &self.pipeline_layout,
            self.target_format,
            Some(Texture::DEPTH_FORMAT),
            primitive,
            &layouts,
            module,
            &format!("{} Pipeline", key.program),
        );
        self.pipelines.insert(key.clone(), pipeline);
    }

    /// Replays every recorded draw into `target` in one render pass and submits it.
    ///
    /// `clear` clears colour and depth first; `None` draws on top of what is there.
    pub fn flush(
        &mut self,
        target: &wgpu::TextureView,
        depth: &wgpu::TextureView,
        clear: Option<wgpu::Color>,
    ) -> wgpu::SubmissionIndex {
        let frame = std::mem::take(&mut self.frame);
        self.cameras.upload(
            &self.device,
            &self.queue,
            &self.camera_layout,
            bytemuck::cast_slice(&frame.cameras),
        );
        self.models.upload(
            &self.device,
            &self.queue,
            &self.model_layout,
            bytemuck::cast_slice(&frame.models),
        );
        for draw in frame.draws.iter() {
            self.ensure_pipeline(&draw.key);
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Scene Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: clear.map_or(wgpu::LoadOp::Load, wgpu::LoadOp::Clear),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: depth,
                    depth_ops: Some(wgpu::Operations {
                        load: match clear {
                            Some(_) => wgpu::LoadOp::Clear(1.0),
                            None => wgpu::LoadOp::Load,
                        },
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            for draw in frame.draws.iter() {
                let Some(pipeline) = self.pipelines.get(&draw.key) else {
                    continue;
                };
                let vertex_buffers: Option<Vec<&wgpu::Buffer>> = draw
                    .vertex_buffers
                    .iter()
                    .map(|handle| self.buffers.get(handle).map(|gpu| &gpu.buffer))
                    .collect();
                let Some(vertex_buffers) = vertex_buffers else {
                    warn!("Draw call skipped, a vertex buffer was deleted before flush.");
                    continue;
                };

                render_pass.set_pipeline(pipeline);
                render_pass.set_bind_group(0, &self.cameras.bind_group, &[self.cameras.offset(draw.camera)]);
                render_pass.set_bind_group(1, &self.models.bind_group, &[self.models.offset(draw.model)]);
                for (slot, buffer) in vertex_buffers.into_iter().enumerate() {
                    render_pass.set_vertex_buffer(slot as u32, buffer.slice(..));
                }

                match draw.kind {
                    DrawKind::Arrays { first, count } => {
                        render_pass.draw(first..first + count, 0..1);
                    }
                    DrawKind::Elements {
                        count,
                        index_type,
                        offset,
                    } => {
                        let Some(index_buffer) = draw
                            .index_buffer
                            .and_then(|handle| self.buffers.get(&handle))
                        else {
                            warn!("Draw call skipped, its index buffer was deleted before flush.");
                            continue;
                        };
                        render_pass.set_index_buffer(index_buffer.buffer.slice(..), index_format(index_type));
                        let first = (offset / index_type.byte_size()) as u32;
                        render_pass.draw_indexed(first..first + count, 0, 0..1);
                    }
                }
            }
        }
        self.queue.submit(std::iter::once(encoder.finish()))
    }

    /// Copies `target` back to the CPU as tightly packed rows of 4-byte texels.
    pub fn read_pixels(&self, target: &Texture) -> anyhow::Result<Vec<u8>> {
        let [width, height] = target.size();
        let unpadded_bytes_per_row = 4 * width;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;

        let output_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Buffer"),
            size: (padded_bytes_per_row * height) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &output_buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        // The mapping has to be requested before polling, otherwise the wait never finishes.
        let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
        let buffer_slice = output_buffer.slice(..);
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            tx.send(result).ok();
        });
        self.device.poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: Some(Duration::from_secs(3)),
        })?;
        futures::executor::block_on(rx.receive())
            .context("Readback channel closed before the buffer was mapped")??;

        let pixels: Vec<u8> = {
            let data = buffer_slice.get_mapped_range();
            data.chunks(padded_bytes_per_row as usize)
                .flat_map(|row| &row[..unpadded_bytes_per_row as usize])
                .copied()
                .collect()
        };
        output_buffer.unmap();
        Ok(pixels)
    }
}

impl Renderer for WgpuRenderer {
    fn context_id(&self) -> ContextId {
        self.context
    }

    fn create_buffer(&mut self, byte_length: u64, usage: BufferUsage) -> Option<BufferHandle> {
        let wgpu_usage = match usage {
            BufferUsage::Vertex => wgpu::BufferUsages::VERTEX,
            BufferUsage::Index => wgpu::BufferUsages::INDEX,
        };
        // copies must be a multiple of COPY_BUFFER_ALIGNMENT
        let size = byte_length.div_ceil(wgpu::COPY_BUFFER_ALIGNMENT) * wgpu::COPY_BUFFER_ALIGNMENT;
        if size > self.device.limits().max_buffer_size {
            warn!("Buffer of {byte_length} bytes exceeds the device limit.");
            return None;
        }
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(match usage {
                BufferUsage::Vertex => "Vertex Buffer",
                BufferUsage::Index => "Index Buffer",
            }),
            size: size.max(wgpu::COPY_BUFFER_ALIGNMENT),
            usage: wgpu_usage | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let handle = BufferHandle::from_raw(self.next_handle());
        self.buffers.insert(handle, GpuBuffer { buffer, usage });
        Some(handle)
    }

    fn update_buffer_data(&mut self, buffer: BufferHandle, data: &[u8], offset: u64) {
        let Some(gpu) = self.buffers.get(&buffer) else {
            warn!("Upload to unknown buffer {buffer:?} ignored.");
            return;
        };
        let remainder = data.len() as u64 % wgpu::COPY_BUFFER_ALIGNMENT;
        if remainder == 0 {
            self.queue.write_buffer(&gpu.buffer, offset, data);
        } else {
            let mut padded = data.to_vec();
            padded.resize(data.len() + (wgpu::COPY_BUFFER_ALIGNMENT - remainder) as usize, 0);
            self.queue.write_buffer(&gpu.buffer, offset, &padded);
        }
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        match self.buffers.remove(&buffer) {
            Some(gpu) => gpu.buffer.destroy(),
            None => warn!("Deleting unknown buffer {buffer:?}."),
        }
        if self.bound_vertex_buffer == Some(buffer) {
            self.bound_vertex_buffer = None;
        }
    }

    fn create_vertex_array(&mut self) -> Option<VertexArrayHandle> {
        let handle = VertexArrayHandle::from_raw(self.next_handle());
        self.vertex_arrays.insert(handle, VertexArrayRecord::default());
        Some(handle)
    }

    fn activate_vertex_array(&mut self, vertex_array: Option<VertexArrayHandle>) {
        self.active_vertex_array = vertex_array;
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
        if self.vertex_arrays.remove(&vertex_array).is_none() {
            warn!("Deleting unknown vertex array {vertex_array:?}.");
        }
        if self.active_vertex_array == Some(vertex_array) {
            self.active_vertex_array = None;
        }
    }

    fn activate_buffer(&mut self, buffer: BufferHandle, usage: BufferUsage) {
        if self.buffers.get(&buffer).is_some_and(|gpu| gpu.usage != usage) {
            warn!("Buffer {buffer:?} bound as {usage:?} but created for another usage.");
        }
        match usage {
            BufferUsage::Vertex => self.bound_vertex_buffer = Some(buffer),
            BufferUsage::Index => {
                match self
                    .active_vertex_array
                    .and_then(|handle| self.vertex_arrays.get_mut(&handle))
                {
                    Some(record) => record.index_buffer = Some(buffer),
                    None => warn!("Index buffer {buffer:?} bound without a vertex array."),
                }
            }
        }
    }

    fn enable_attribute(&mut self, name: &str, attribute: &AttributeDescriptor) {
        let Some(buffer) = self.bound_vertex_buffer else {
            warn!("Attribute {name} enabled without a bound vertex buffer.");
            return;
        };
        let Some(record) = self
            .active_vertex_array
            .and_then(|handle| self.vertex_arrays.get_mut(&handle))
        else {
            warn!("Attribute {name} enabled without a vertex array.");
            return;
        };
        record.attributes.retain(|(existing, _, _)| existing != name);
        record
            .attributes
            .push((name.to_string(), buffer, *attribute));
    }

    fn use_program(&mut self, name: Option<&str>) -> Result<()> {
        if let Some(name) = name {
            if !self.programs.contains_key(name) {
                return Err(RenderError::UnknownProgram(name.to_string()));
            }
        }
        self.active_program = name.map(str::to_string);
        self.frame.current_camera = None;
        self.frame.current_model = None;
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
        let name = self
            .active_program
            .as_ref()
            .ok_or(RenderError::NoActiveProgram)?;
        if !self.programs.get(name).is_some_and(|program| program.is_ready()) {
            return Err(RenderError::ProgramNotReady(name.clone()));
        }
        self.frame.cameras.push(CameraUniform {
            projection: (OPENGL_TO_WGPU_MATRIX * projection).into(),
            view: (*view).into(),
        });
        self.frame.current_camera = Some(self.frame.cameras.len() as u32 - 1);
        Ok(())
    }

    fn set_uniform_matrix(&mut self, location: UniformLocation, matrix: &Matrix4<f32>) {
        if location != MODEL_LOCATION {
            warn!("Unknown uniform location {location:?} ignored.");
            return;
        }
        self.frame.models.push((*matrix).into());
        self.frame.current_model = Some(self.frame.models.len() as u32 - 1);
    }

    fn draw_arrays(&mut self, mode: PrimitiveMode, first: u32, count: u32) {
        self.record_draw(mode, DrawKind::Arrays { first, count });
    }

    fn draw_elements(&mut self, mode: PrimitiveMode, count: u32, index_type: IndexType, offset: u64) {
        self.record_draw(
            mode,
            DrawKind::Elements {
                count,
                index_type,
                offset,
            },
        );
    }
}
