//! Per-backend construction of render targets from imported display buffers.
//!
//! One [`BackendAdapter`] is selected when the render helper is created and
//! used for every buffer afterwards. Each variant keeps its own ownership
//! rules for the objects it creates:
//!
//! - [`gles`]: wraps GL textures or renderbuffers and, for RHI rendering,
//!   manufactures a depth/stencil attachment and render pass.
//! - [`vulkan`]: wraps the image/layout/format triple; the render pass owns
//!   depth/stencil, so none is created here.
//! - [`pixman`]: paints straight into the buffer's pixel memory and creates
//!   no GPU objects.

pub mod gles;
pub mod pixman;
pub mod vulkan;

use crate::error::ConstructionError;
use crate::renderer::{NativeBufferTexture, RendererKind};
use crate::scene::{Rhi, RhiError, RhiResource};
use crate::target::RenderTarget;
use novade_compositor_core::Size;

pub use gles::GlesAdapter;
pub use pixman::PixmanAdapter;
pub use vulkan::VulkanAdapter;

/// Parameters shared by every target built for the current working size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetParams {
    pub size: Size,
    pub device_pixel_ratio: f64,
    pub sample_count: u32,
}

/// RHI objects owned by one cache entry.
///
/// Fields drop in declaration order, so the render pass goes before the
/// render target and the target before its attachments.
#[derive(Default)]
pub struct EntryResources {
    pub(crate) render_pass: Option<Box<dyn RhiResource>>,
    pub(crate) render_target: Option<Box<dyn RhiResource>>,
    pub(crate) texture: Option<Box<dyn RhiResource>>,
    pub(crate) renderbuffer: Option<Box<dyn RhiResource>>,
    pub(crate) depth_stencil: Option<Box<dyn RhiResource>>,
}

impl EntryResources {
    /// Number of live RHI objects.
    pub fn len(&self) -> usize {
        [
            &self.render_pass,
            &self.render_target,
            &self.texture,
            &self.renderbuffer,
            &self.depth_stencil,
        ]
        .iter()
        .filter(|r| r.is_some())
        .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for EntryResources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryResources").field("len", &self.len()).finish()
    }
}

pub(crate) fn rhi_failure(resource: &'static str) -> impl FnOnce(RhiError) -> ConstructionError {
    move |err| ConstructionError::ResourceCreationFailed {
        resource,
        reason: err.0,
    }
}

/// Render target strategy for the active renderer.
#[derive(Debug)]
pub enum BackendAdapter {
    Gles(GlesAdapter),
    Vulkan(VulkanAdapter),
    Pixman(PixmanAdapter),
}

impl BackendAdapter {
    pub fn for_renderer(kind: RendererKind) -> Self {
        match kind {
            RendererKind::Gles2 => BackendAdapter::Gles(GlesAdapter),
            RendererKind::Vulkan => BackendAdapter::Vulkan(VulkanAdapter),
            RendererKind::Pixman => BackendAdapter::Pixman(PixmanAdapter),
        }
    }

    pub fn kind(&self) -> RendererKind {
        match self {
            BackendAdapter::Gles(_) => RendererKind::Gles2,
            BackendAdapter::Vulkan(_) => RendererKind::Vulkan,
            BackendAdapter::Pixman(_) => RendererKind::Pixman,
        }
    }

    /// Builds the native render target description for an imported buffer.
    pub fn build(
        &self,
        native: &NativeBufferTexture,
        params: &TargetParams,
    ) -> Result<RenderTarget, ConstructionError> {
        if native.renderer_kind() != self.kind() {
            return Err(ConstructionError::NativeMismatch { expected: self.kind() });
        }
        match self {
            BackendAdapter::Gles(adapter) => adapter.build(native, params),
            BackendAdapter::Vulkan(adapter) => adapter.build(native, params),
            BackendAdapter::Pixman(adapter) => adapter.build(native, params),
        }
    }

    /// Creates the RHI objects for `target` and records their handles in it.
    ///
    /// On failure every object created so far is released before returning.
    pub fn materialize(
        &self,
        rhi: &dyn Rhi,
        native: &NativeBufferTexture,
        target: &mut RenderTarget,
    ) -> Result<EntryResources, ConstructionError> {
        match self {
            BackendAdapter::Gles(adapter) => adapter.materialize(rhi, native, target),
            BackendAdapter::Vulkan(adapter) => adapter.materialize(rhi, native, target),
            BackendAdapter::Pixman(adapter) => adapter.materialize(rhi, native, target),
        }
    }
}
