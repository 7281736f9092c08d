//! Frame driver and application event loop.
//!
//! [`run`] opens a window, sets up the `wgpu` surface and a [`WgpuRenderer`],
//! builds the user's [`Scene`] and attaches it. From then on every redraw
//! follows this pattern:
//!
//! 1. Measure the time since the last frame
//! 2. `Scene::update` with the elapsed milliseconds
//! 3. `Scene::render` records the batched draw calls
//! 4. `WgpuRenderer::flush` replays them into the surface texture
//! 5. Present frame
//!
//! On exit the scene is destroyed against the same renderer, before the GPU
//! context goes away.

use std::sync::Arc;

use anyhow::Context as _;
use cgmath::{Deg, Vector3};
use instant::Instant;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowId},
};

use crate::{
    backends::gpu::{WgpuRenderer, request_device},
    context::Config,
    data_structures::{
        camera::{Camera, Projection},
        scene::Scene,
        texture::Texture,
        transform::Transform,
    },
    pipelines::WgslProgram,
};

/// Builds the scene once the GPU is ready. Called exactly once.
pub type SceneBuilder = Box<dyn FnOnce(&Config) -> anyhow::Result<Scene>>;

/// Initializes `env_logger` with `filter`, or `RUST_LOG` when `None`.
///
/// Safe to call more than once; only the first call installs the logger.
pub fn init_logging(filter: Option<&str>) {
    let mut builder = env_logger::Builder::from_default_env();
    if let Some(filter) = filter {
        builder.parse_filters(filter);
    }
    if let Err(e) = builder.try_init() {
        println!("Warning: Could not initialize logger: {}", e);
    }
}

/// Window, GPU context and the scene drawn into it.
struct AppState {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    renderer: WgpuRenderer,
    depth_texture: Texture,
    scene: Scene,
    clear_colour: wgpu::Color,
    is_surface_configured: bool,
}

impl AppState {
    async fn new(
        window: Arc<Window>,
        config: &Config,
        programs: Vec<WgslProgram>,
        build_scene: SceneBuilder,
    ) -> anyhow::Result<Self> {
        let size = window.inner_size();

        log::debug!("WGPU setup");
        let instance = wgpu::Instance::default();
        let surface = instance
            .create_surface(window.clone())
            .context("Failed to create a surface for the window")?;
        let (adapter, device, queue) = request_device(&instance, Some(&surface)).await?;

        let surface_caps = surface.get_capabilities(&adapter);
        // The shaders assume an sRGB target, anything else comes out darker.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("Surface reports no supported formats")?;
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps
                .present_modes
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo),
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        let depth_texture = Texture::create_depth_texture(
            &device,
            [surface_config.width, surface_config.height],
            "depth_texture",
        );
        let mut renderer = WgpuRenderer::new(device, queue, surface_format);
        for program in programs {
            renderer.register_program(program);
        }

        let mut scene = build_scene(config)?;
        if scene.cameras().is_empty() {
            log::info!("Scene has no camera, adding one at (0, 0, 5).");
            scene.add_camera(Camera::new(
                Transform::from(Vector3::new(0.0, 0.0, 5.0)),
                Projection::new(
                    surface_config.width,
                    surface_config.height,
                    Deg(config.fovy),
                    config.znear,
                    config.zfar,
                ),
            ));
        }
        scene.scene_attached(&mut renderer)?;

        Ok(Self {
            window,
            surface,
            surface_config,
            renderer,
            depth_texture,
            scene,
            clear_colour: config.clear_colour,
            is_surface_configured: false,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.surface_config.width = width;
            self.surface_config.height = height;
            self.surface
                .configure(self.renderer.device(), &self.surface_config);
            self.is_surface_configured = true;
            self.depth_texture =
                Texture::create_depth_texture(self.renderer.device(), [width, height], "depth_texture");
            for camera in self.scene.cameras_mut() {
                camera.projection.resize(width, height);
            }
        }
    }

    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        // invoke main render loop
        self.window.request_redraw();

        // Rendering requires the surface to be configured
        if !self.is_surface_configured {
            return Ok(());
        }

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        if let Err(e) = self.scene.render(&mut self.renderer) {
            log::error!("Scene render failed: {}", e);
        }
        self.renderer
            .flush(&view, &self.depth_texture.view, Some(self.clear_colour));
        output.present();
        Ok(())
    }

    fn teardown(&mut self) {
        if let Err(e) = self.scene.destroy(&mut self.renderer) {
            log::error!("Scene teardown failed: {}", e);
        }
    }
}

struct App {
    async_runtime: tokio::runtime::Runtime,
    config: Config,
    programs: Vec<WgslProgram>,
    build_scene: Option<SceneBuilder>,
    state: Option<AppState>,
    error: Option<anyhow::Error>,
    last_time: Instant,
}

impl App {
    fn new(config: Config, programs: Vec<WgslProgram>, build_scene: SceneBuilder) -> anyhow::Result<Self> {
        Ok(Self {
            async_runtime: tokio::runtime::Runtime::new()?,
            config,
            programs,
            build_scene: Some(build_scene),
            state: None,
            error: None,
            last_time: Instant::now(),
        })
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(mut state) = self.state.take() {
            state.teardown();
        }
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some(build_scene) = self.build_scene.take() else {
            return;
        };
        let window_attributes = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.width,
                self.config.height,
            ));
        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                self.error = Some(e.into());
                event_loop.exit();
                return;
            }
        };

        let programs = std::mem::take(&mut self.programs);
        let init = AppState::new(window, &self.config, programs, build_scene);
        match self.async_runtime.block_on(init) {
            Ok(mut state) => {
                let size = state.window.inner_size();
                state.resize(size.width, size.height);
                state.window.request_redraw();
                self.last_time = Instant::now();
                self.state = Some(state);
            }
            Err(e) => {
                self.error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let state = match &mut self.state {
            Some(state) => state,
            None => return,
        };

        match event {
            WindowEvent::CloseRequested => self.shutdown(event_loop),
            WindowEvent::Resized(size) => state.resize(size.width, size.height),
            WindowEvent::RedrawRequested => {
                let dt = self.last_time.elapsed();
                self.last_time = Instant::now();
                state.scene.update(dt.as_secs_f32() * 1000.0);
                match state.render() {
                    Ok(_) => {}
                    // Reconfigure the surface if it's lost or outdated
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let size = state.window.inner_size();
                        state.resize(size.width, size.height);
                    }
                    Err(e) => {
                        log::error!("Unable to render {}", e);
                    }
                }
            }
            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(mut state) = self.state.take() {
            state.teardown();
        }
    }
}

/// Opens a window and drives `build_scene`'s scene until the window closes.
///
/// `programs` are compiled and registered before the scene is built; every
/// program a renderable names has to be among them.
pub fn run(
    config: Config,
    programs: Vec<WgslProgram>,
    build_scene: impl FnOnce(&Config) -> anyhow::Result<Scene> + 'static,
) -> anyhow::Result<()> {
    init_logging(config.log_filter.as_deref());

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config, programs, Box::new(build_scene))?;
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
