//! Backend renderers that import display buffers into native GPU or CPU
//! objects.

use crate::error::{fatal_configuration_mismatch, ConfigurationMismatch, ConstructionError};
use crate::export::{EglDisplay, VulkanMemoryExport};
use crate::graphics_api::GraphicsApi;
use ash::vk;
use drm_fourcc::DrmFourcc;
use novade_buffer_manager::{DisplayBuffer, PixelMemory};
use std::rc::Rc;
use tracing::{info, warn};

/// Renderer implementations the compositor can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RendererKind {
    /// Accelerated raster through OpenGL ES 2.
    Gles2,
    Vulkan,
    /// CPU rasterizer.
    Pixman,
}

impl RendererKind {
    /// Renderer matching a scene-graph graphics API, if any.
    pub fn for_api(api: GraphicsApi) -> Option<Self> {
        match api {
            GraphicsApi::OpenGl => Some(RendererKind::Gles2),
            GraphicsApi::Vulkan => Some(RendererKind::Vulkan),
            GraphicsApi::Software => Some(RendererKind::Pixman),
            GraphicsApi::Direct3D11 | GraphicsApi::Metal | GraphicsApi::Null => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RendererKind::Gles2 => "gles2",
            RendererKind::Vulkan => "vulkan",
            RendererKind::Pixman => "pixman",
        }
    }
}

/// GL object a buffer was imported as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlObject {
    Texture(u32),
    Renderbuffer(u32),
}

/// Native representation of an imported display buffer.
#[derive(Debug, Clone)]
pub enum NativeBufferTexture {
    Gles {
        object: GlObject,
        /// Sized GL internal format, e.g. `GL_RGBA8`.
        internal_format: u32,
        has_alpha: bool,
    },
    Vulkan {
        image: vk::Image,
        layout: vk::ImageLayout,
        format: vk::Format,
    },
    Pixman {
        memory: PixelMemory,
        width: u32,
        height: u32,
        stride: u32,
        format: DrmFourcc,
    },
}

impl NativeBufferTexture {
    pub fn renderer_kind(&self) -> RendererKind {
        match self {
            NativeBufferTexture::Gles { .. } => RendererKind::Gles2,
            NativeBufferTexture::Vulkan { .. } => RendererKind::Vulkan,
            NativeBufferTexture::Pixman { .. } => RendererKind::Pixman,
        }
    }
}

/// A backend renderer.
pub trait BackendRenderer {
    fn kind(&self) -> RendererKind;

    /// Imports `buffer` and reports the native object backing it.
    fn import_buffer(&self, buffer: &DisplayBuffer) -> Result<NativeBufferTexture, ConstructionError>;

    /// EGL display of a GLES renderer.
    fn egl_display(&self) -> Option<&dyn EglDisplay> {
        None
    }

    /// Memory export capability of a Vulkan renderer.
    fn vulkan_memory_export(&self) -> Option<&dyn VulkanMemoryExport> {
        None
    }
}

/// Creates renderers of a requested kind for the output backend.
pub trait RendererFactory {
    /// Returns `None` if the kind is unavailable on this system.
    fn create(&self, kind: RendererKind) -> Option<Rc<dyn BackendRenderer>>;
}

/// Creates the renderer matching `api`.
///
/// Returns `None` if the factory could not create one. An API without a
/// renderer, or a factory that hands back the wrong kind, is fatal.
pub fn create_renderer(api: GraphicsApi, factory: &dyn RendererFactory) -> Option<Rc<dyn BackendRenderer>> {
    let kind = RendererKind::for_api(api)
        .unwrap_or_else(|| fatal_configuration_mismatch(ConfigurationMismatch::NoRenderer(api)));

    let Some(renderer) = factory.create(kind) else {
        warn!(%api, renderer = kind.name(), "Failed to create renderer");
        return None;
    };
    if renderer.kind() != kind {
        fatal_configuration_mismatch(ConfigurationMismatch::RendererKind {
            api,
            expected: kind,
            actual: renderer.kind(),
        });
    }
    info!(%api, renderer = kind.name(), "Renderer created");
    Some(renderer)
}
