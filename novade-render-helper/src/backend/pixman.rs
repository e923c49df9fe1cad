//! CPU rasterizer render targets.

use super::{EntryResources, TargetParams};
use crate::error::ConstructionError;
use crate::renderer::{NativeBufferTexture, RendererKind};
use crate::scene::Rhi;
use crate::target::{PaintSurface, RenderTarget, RenderTargetKind};
use novade_compositor_core::Size;
use tracing::trace;

#[derive(Debug, Clone, Copy, Default)]
pub struct PixmanAdapter;

impl PixmanAdapter {
    fn paint_surface(native: &NativeBufferTexture) -> Result<PaintSurface, ConstructionError> {
        let NativeBufferTexture::Pixman { memory, width, height, stride, format } = native else {
            return Err(ConstructionError::NativeMismatch { expected: RendererKind::Pixman });
        };
        let required = *stride as usize * *height as usize;
        if *width == 0 || *height == 0 || memory.len() < required {
            return Err(ConstructionError::ResourceCreationFailed {
                resource: "paint surface",
                reason: format!(
                    "{}x{} image with stride {} needs {} bytes, memory has {}",
                    width,
                    height,
                    stride,
                    required,
                    memory.len()
                ),
            });
        }
        Ok(PaintSurface {
            memory: memory.clone(),
            size: Size::new(*width, *height),
            stride: *stride,
            format: *format,
        })
    }

    fn target_for(surface: PaintSurface, params: &TargetParams) -> RenderTarget {
        let size = surface.size;
        RenderTarget::new(RenderTargetKind::PaintDevice(surface), size, params.device_pixel_ratio)
    }

    pub fn build(&self, native: &NativeBufferTexture, params: &TargetParams) -> Result<RenderTarget, ConstructionError> {
        let surface = Self::paint_surface(native)?;
        trace!(size = %surface.size, stride = surface.stride, "Paint surface over buffer memory");
        Ok(Self::target_for(surface, params))
    }

    /// Paint surfaces cannot back RHI render targets.
    pub fn materialize(
        &self,
        _rhi: &dyn Rhi,
        _native: &NativeBufferTexture,
        _target: &mut RenderTarget,
    ) -> Result<EntryResources, ConstructionError> {
        Err(ConstructionError::ResourceCreationFailed {
            resource: "RHI render target",
            reason: "paint surfaces are not RHI textures".into(),
        })
    }
}
