//! Interfaces of the scene-graph engine this crate renders for.
//!
//! The scene graph drives rendering through a [`RenderControl`]. When its
//! graphics API is RHI-based, native handles must additionally be wrapped in
//! RHI objects through the [`Rhi`] it exposes. Rendered results come back as
//! [`SceneTexture`]s.

use crate::graphics_api::GraphicsApi;
use ash::vk;
use drm_fourcc::DrmFourcc;
use image::RgbaImage;
use novade_buffer_manager::PixelMemory;
use novade_compositor_core::Size;
use thiserror::Error;

/// Identifier of an RHI object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RhiResourceId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RhiResourceKind {
    Texture,
    Renderbuffer,
    DepthStencil,
    RenderTarget,
    RenderPass,
}

/// An RHI object. Dropping it releases the underlying resource.
pub trait RhiResource {
    fn id(&self) -> RhiResourceId;
    fn kind(&self) -> RhiResourceKind;
}

/// Texture formats the RHI can wrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RhiTextureFormat {
    Rgba8,
    Bgra8,
    Rgb10A2,
    Rgba16F,
}

/// A native object handed to the RHI for wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeRhiObject {
    GlTexture(u32),
    VulkanImage { image: vk::Image, layout: vk::ImageLayout },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct RhiError(pub String);

/// Factory for RHI objects.
pub trait Rhi {
    /// Wraps a native texture or image without taking ownership of it.
    fn wrap_native_texture(
        &self,
        object: NativeRhiObject,
        format: RhiTextureFormat,
        size: Size,
        sample_count: u32,
    ) -> Result<Box<dyn RhiResource>, RhiError>;

    fn wrap_native_renderbuffer(
        &self,
        renderbuffer: u32,
        format: RhiTextureFormat,
        size: Size,
        sample_count: u32,
    ) -> Result<Box<dyn RhiResource>, RhiError>;

    fn create_depth_stencil(&self, size: Size, sample_count: u32) -> Result<Box<dyn RhiResource>, RhiError>;

    fn create_texture_render_target(
        &self,
        color: &dyn RhiResource,
        depth_stencil: Option<&dyn RhiResource>,
    ) -> Result<Box<dyn RhiResource>, RhiError>;

    fn create_render_pass(&self, render_target: &dyn RhiResource) -> Result<Box<dyn RhiResource>, RhiError>;
}

/// The scene graph's render driver.
pub trait RenderControl {
    /// API this render control renders with. May differ from the process-wide
    /// value, e.g. for an offscreen software window.
    fn graphics_api(&self) -> GraphicsApi;

    fn rhi(&self) -> Option<&dyn Rhi>;
}

/// Native object behind a rendered texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeTextureObject {
    Gl { texture: u32 },
    Vulkan {
        image: vk::Image,
        memory: vk::DeviceMemory,
        format: vk::Format,
    },
    /// CPU-side texture without a GPU object.
    None,
}

/// Pixels of a texture in CPU memory.
#[derive(Debug, Clone)]
pub struct CpuImage {
    pub width: u32,
    pub height: u32,
    /// Bytes per row.
    pub stride: u32,
    pub format: DrmFourcc,
    pub memory: PixelMemory,
}

impl CpuImage {
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn is_null(&self) -> bool {
        self.width == 0 || self.height == 0 || self.memory.is_empty()
    }
}

impl From<RgbaImage> for CpuImage {
    /// RGBA byte order is `ABGR8888` in DRM's little-endian naming.
    fn from(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            stride: width * 4,
            format: DrmFourcc::Abgr8888,
            memory: PixelMemory::from_vec(image.into_raw()),
        }
    }
}

/// Result of asking a texture for its pixels.
#[derive(Debug, Clone)]
pub enum CpuImageConversion {
    Converted(CpuImage),
    /// The texture is of a supported kind but has no content yet.
    Empty,
    /// The texture kind cannot be read back on the CPU.
    Unsupported,
}

/// A texture produced by the scene graph.
pub trait SceneTexture {
    fn pixel_size(&self) -> Size;

    fn native_object(&self) -> NativeTextureObject;

    fn to_cpu_image(&self) -> CpuImageConversion;
}
