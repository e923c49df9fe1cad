//! # Novade Render Helper
//!
//! The output rendering path between the scene-graph engine and the display
//! backend:
//!
//! - [`RenderHelper`] builds render targets for display buffers through the
//!   [`backend::BackendAdapter`] of the active renderer (GLES2, Vulkan or the
//!   Pixman CPU rasterizer), caches one entry per buffer and drops it when the
//!   buffer is destroyed or the working size changes.
//! - [`export`] turns rendered textures back into display buffers (DMA-BUF
//!   for GPU textures, shared memory for CPU images).
//! - [`OutputHelper`] runs the per-output frame state machine: it acquires
//!   swapchain buffers, accumulates damage, decides when a render is needed,
//!   and commits.
//!
//! Everything here runs on the compositor's render thread.
//!
//! ## Example
//!
//! ```no_run
//! use std::rc::Rc;
//! use novade_compositor_core::Size;
//! use novade_render_helper::{RenderHelper, RenderHelperConfig, BackendRenderer, RenderControl};
//! # fn demo(renderer: Rc<dyn BackendRenderer>, rc: &dyn RenderControl, buffer: &novade_buffer_manager::DisplayBuffer) {
//! let config = RenderHelperConfig::default();
//! let mut helper = RenderHelper::for_process(renderer, &config);
//! helper.set_working_size(Size::new(1920, 1080));
//! if let Some(target) = helper.acquire_render_target(rc, buffer) {
//!     // hand `target` to the scene graph
//!     let _ = target;
//! }
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod export;
pub mod graphics_api;
pub mod output_helper;
pub mod render_helper;
pub mod renderer;
pub mod scene;
pub mod target;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::{CompositorConfig, RenderHelperConfig};
pub use error::{
    fatal_configuration_mismatch, ConfigurationMismatch, ConstructionError, ExportError, OutputHelperError,
};
pub use graphics_api::{graphics_api, init_graphics_api, GraphicsApi};
pub use output_helper::{
    AcquiredTarget, OutputBackend, OutputCommit, OutputHelper, OutputHelperEvent, OutputTransform, SwapchainBuffer,
    SwapchainHandle,
};
pub use render_helper::RenderHelper;
pub use renderer::{create_renderer, BackendRenderer, NativeBufferTexture, RendererFactory, RendererKind};
pub use scene::{RenderControl, Rhi, SceneTexture};
pub use target::{RenderTarget, RenderTargetKind};
