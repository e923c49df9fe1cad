//! Render target descriptions handed to the scene-graph renderer.

use ash::vk;
use drm_fourcc::DrmFourcc;
use novade_buffer_manager::PixelMemory;
use novade_compositor_core::Size;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::scene::RhiResourceId;

/// Identity of one constructed render target. A rebuilt target for the same
/// buffer always gets a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId(u64);

impl TargetId {
    pub(crate) fn new_unique() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        TargetId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// CPU paint surface wrapping a buffer's pixel memory.
#[derive(Debug, Clone)]
pub struct PaintSurface {
    pub memory: PixelMemory,
    pub size: Size,
    pub stride: u32,
    pub format: DrmFourcc,
}

impl PaintSurface {
    /// Whether the surface paints into `memory`.
    pub fn wraps(&self, memory: &PixelMemory) -> bool {
        PixelMemory::ptr_eq(&self.memory, memory)
    }
}

impl PartialEq for PaintSurface {
    fn eq(&self, other: &Self) -> bool {
        PixelMemory::ptr_eq(&self.memory, &other.memory)
            && self.size == other.size
            && self.stride == other.stride
            && self.format == other.format
    }
}

/// Backend-specific native destination of a render target.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderTargetKind {
    GlTexture { texture: u32 },
    GlRenderbuffer { renderbuffer: u32 },
    VulkanImage {
        image: vk::Image,
        layout: vk::ImageLayout,
        format: vk::Format,
    },
    PaintDevice(PaintSurface),
}

/// RHI objects built for a target, referenced by id. The objects themselves
/// are owned by the render helper's cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RhiTargetHandles {
    pub render_target: RhiResourceId,
    pub render_pass: RhiResourceId,
}

/// Where the scene graph renders a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTarget {
    id: TargetId,
    kind: RenderTargetKind,
    pixel_size: Size,
    device_pixel_ratio: f64,
    mirror_vertically: bool,
    sample_count: u32,
    rhi: Option<RhiTargetHandles>,
}

impl RenderTarget {
    pub(crate) fn new(kind: RenderTargetKind, pixel_size: Size, device_pixel_ratio: f64) -> Self {
        Self {
            id: TargetId::new_unique(),
            kind,
            pixel_size,
            device_pixel_ratio,
            mirror_vertically: false,
            sample_count: 1,
            rhi: None,
        }
    }

    pub(crate) fn with_mirror_vertically(mut self, mirror: bool) -> Self {
        self.mirror_vertically = mirror;
        self
    }

    pub(crate) fn with_sample_count(mut self, sample_count: u32) -> Self {
        self.sample_count = sample_count;
        self
    }

    pub(crate) fn set_rhi(&mut self, handles: RhiTargetHandles) {
        self.rhi = Some(handles);
    }

    pub fn id(&self) -> TargetId {
        self.id
    }

    pub fn kind(&self) -> &RenderTargetKind {
        &self.kind
    }

    pub fn pixel_size(&self) -> Size {
        self.pixel_size
    }

    pub fn device_pixel_ratio(&self) -> f64 {
        self.device_pixel_ratio
    }

    /// The backend's origin is bottom-left; the scene graph must flip.
    pub fn mirror_vertically(&self) -> bool {
        self.mirror_vertically
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn rhi(&self) -> Option<RhiTargetHandles> {
        self.rhi
    }

    pub fn paint_surface(&self) -> Option<&PaintSurface> {
        match &self.kind {
            RenderTargetKind::PaintDevice(surface) => Some(surface),
            _ => None,
        }
    }
}
