//! Render-target textures.
//!
//! This module provides [`Texture`], a wrapper around a WGPU texture and its
//! default view, with constructors for the depth buffer and for offscreen
//! colour targets.

/// A GPU texture with a view.
#[derive(Clone, Debug)]
pub struct Texture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl Texture {
    /// Standard depth buffer texture format (32-bit float).
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    /// Format of offscreen colour targets.
    pub const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

    /// Create a depth texture for depth-testing during rendering.
    ///
    /// # Arguments
    ///
    /// * `size` is [width, height] of the texture in pixels
    /// * `label` is used as a debug label for the GPU resource
    pub fn create_depth_texture(device: &wgpu::Device, size: [u32; 2], label: &str) -> Self {
        Self::create_attachment(device, size, label, Self::DEPTH_FORMAT, wgpu::TextureUsages::empty())
    }

    /// Create an offscreen colour target that can be copied back to the CPU.
    pub fn create_render_target(device: &wgpu::Device, size: [u32; 2], label: &str) -> Self {
        Self::create_attachment(device, size, label, Self::TARGET_FORMAT, wgpu::TextureUsages::COPY_SRC)
    }

    fn create_attachment(
        device: &wgpu::Device,
        size: [u32; 2],
        label: &str,
        format: wgpu::TextureFormat,
        extra_usage: wgpu::TextureUsages,
    ) -> Self {
        let size = wgpu::Extent3d {
            width: size[0].max(1),
            height: size[1].max(1),
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | extra_usage,
            view_formats: &[format],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }

    pub fn size(&self) -> [u32; 2] {
        [self.texture.width(), self.texture.height()]
    }
}
