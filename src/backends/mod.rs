//! Implementations of [`crate::context::Renderer`].
//!
//! - `headless` keeps everything in memory and records the calls it receives
//! - `gpu` renders through `wgpu`

pub mod gpu;
pub mod headless;

pub use gpu::WgpuRenderer;
pub use headless::HeadlessRenderer;
