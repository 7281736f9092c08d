//! WGSL programs and render pipeline construction.
//!
//! Every program follows the same binding contract:
//!
//! - group 0, binding 0: camera uniform (`projection`, `view`), dynamic offset
//! - group 1, binding 0: the `model` matrix of the current draw, dynamic offset
//!
//! Vertex inputs are matched by attribute name against the locations a
//! [`WgslProgram`] declares.

use std::borrow::Cow;

use crate::{
    context::{Program, UniformLocation},
    data_structures::renderable::MODEL_UNIFORM,
};

/// Location the `model` matrix is exposed under by every [`WgslProgram`].
pub const MODEL_LOCATION: UniformLocation = UniformLocation::from_raw(0);

/// Byte size of the camera uniform: two 4x4 float matrices.
pub const CAMERA_UNIFORM_SIZE: u64 = 2 * 64;

/// Byte size of the model uniform: one 4x4 float matrix.
pub const MODEL_UNIFORM_SIZE: u64 = 64;

/// A named WGSL shader with `vs_main` and `fs_main` entry points.
///
/// The program becomes ready once [`WgslProgram::compile`] created its module.
#[derive(Debug)]
pub struct WgslProgram {
    name: String,
    source: Cow<'static, str>,
    attributes: Vec<(String, u32)>,
    module: Option<wgpu::ShaderModule>,
}

impl WgslProgram {
    pub fn new(name: impl Into<String>, source: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            attributes: Vec::new(),
            module: None,
        }
    }

    /// Feeds the geometry attribute `name` into `@location(location)`.
    pub fn with_attribute(mut self, name: impl Into<String>, location: u32) -> Self {
        self.attributes.push((name.into(), location));
        self
    }

    /// Lit program drawing `position` + `normal` geometry.
    pub fn simple() -> Self {
        Self::new("simple", include_str!("simple.wgsl"))
            .with_attribute("position", 0)
            .with_attribute("normal", 1)
    }

    /// Unlit program drawing `position` + `colour` geometry.
    pub fn color() -> Self {
        Self::new("color", include_str!("color.wgsl"))
            .with_attribute("position", 0)
            .with_attribute("colour", 1)
    }

    pub fn compile(&mut self, device: &wgpu::Device) {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&self.name),
            source: wgpu::ShaderSource::Wgsl(self.source.clone()),
        });
        self.module = Some(module);
    }

    pub fn module(&self) -> Option<&wgpu::ShaderModule> {
        self.module.as_ref()
    }

    pub fn attribute_location(&self, name: &str) -> Option<u32> {
        self.attributes
            .iter()
            .find(|(attribute, _)| attribute == name)
            .map(|(_, location)| *location)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, u32)> {
        self.attributes
            .iter()
            .map(|(name, location)| (name.as_str(), *location))
    }
}

impl Program for WgslProgram {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_ready(&self) -> bool {
        self.module.is_some()
    }

    fn uniform(&self, name: &str) -> Option<UniformLocation> {
        (name == MODEL_UNIFORM).then_some(MODEL_LOCATION)
    }
}

fn dynamic_uniform_layout(device: &wgpu::Device, label: &str, size: u64) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: true,
                min_binding_size: wgpu::BufferSize::new(size),
            },
            count: None,
        }],
        label: Some(label),
    })
}

pub fn camera_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    dynamic_uniform_layout(device, "camera_bind_group_layout", CAMERA_UNIFORM_SIZE)
}

pub fn model_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    dynamic_uniform_layout(device, "model_bind_group_layout", MODEL_UNIFORM_SIZE)
}

pub fn mk_pipeline_layout(
    device: &wgpu::Device,
    camera_bind_group_layout: &wgpu::BindGroupLayout,
    model_bind_group_layout: &wgpu::BindGroupLayout,
) -> wgpu::PipelineLayout {
    device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Render Pipeline Layout"),
        bind_group_layouts: &[camera_bind_group_layout, model_bind_group_layout],
        immediate_size: 0,
    })
}

pub fn mk_render_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    color_format: wgpu::TextureFormat,
    depth_format: Option<wgpu::TextureFormat>,
    primitive: wgpu::PrimitiveState,
    vertex_layouts: &[wgpu::VertexBufferLayout],
    shader: &wgpu::ShaderModule,
    label: &str,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        cache: None,
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: vertex_layouts,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: color_format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive,
        depth_stencil: depth_format.map(|format| wgpu::DepthStencilState {
            format,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview_mask: None,
    })
}
