//! Accelerated raster (GLES2) render targets.

use super::{rhi_failure, EntryResources, TargetParams};
use crate::error::ConstructionError;
use crate::renderer::{GlObject, NativeBufferTexture, RendererKind};
use crate::scene::{NativeRhiObject, Rhi, RhiResource, RhiTextureFormat};
use crate::target::{RenderTarget, RenderTargetKind, RhiTargetHandles};
use tracing::{debug, trace};

pub const GL_RGBA8: u32 = 0x8058;
pub const GL_RGB10_A2: u32 = 0x8059;
pub const GL_RGBA16F: u32 = 0x881A;
pub const GL_BGRA8_EXT: u32 = 0x93A1;

/// Maps a sized GL internal format to the RHI format used when wrapping it.
/// Unknown formats are wrapped as RGBA8.
pub fn rhi_format_from_gl(internal_format: u32) -> RhiTextureFormat {
    match internal_format {
        GL_RGBA8 => RhiTextureFormat::Rgba8,
        GL_BGRA8_EXT => RhiTextureFormat::Bgra8,
        GL_RGB10_A2 => RhiTextureFormat::Rgb10A2,
        GL_RGBA16F => RhiTextureFormat::Rgba16F,
        other => {
            debug!(internal_format = format_args!("{:#x}", other), "Unknown GL format, wrapping as RGBA8");
            RhiTextureFormat::Rgba8
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GlesAdapter;

impl GlesAdapter {
    pub fn build(&self, native: &NativeBufferTexture, params: &TargetParams) -> Result<RenderTarget, ConstructionError> {
        let NativeBufferTexture::Gles { object, .. } = native else {
            return Err(ConstructionError::NativeMismatch { expected: RendererKind::Gles2 });
        };
        let kind = match *object {
            GlObject::Texture(0) | GlObject::Renderbuffer(0) => {
                return Err(ConstructionError::ResourceCreationFailed {
                    resource: "GL render target",
                    reason: "buffer imported as GL object 0".into(),
                })
            }
            GlObject::Texture(texture) => RenderTargetKind::GlTexture { texture },
            GlObject::Renderbuffer(renderbuffer) => RenderTargetKind::GlRenderbuffer { renderbuffer },
        };
        // GL's origin is bottom-left.
        Ok(RenderTarget::new(kind, params.size, params.device_pixel_ratio)
            .with_mirror_vertically(true)
            .with_sample_count(params.sample_count))
    }

    pub fn materialize(
        &self,
        rhi: &dyn Rhi,
        native: &NativeBufferTexture,
        target: &mut RenderTarget,
    ) -> Result<EntryResources, ConstructionError> {
        let NativeBufferTexture::Gles { object, internal_format, .. } = native else {
            return Err(ConstructionError::NativeMismatch { expected: RendererKind::Gles2 });
        };
        let format = rhi_format_from_gl(*internal_format);
        let size = target.pixel_size();
        let samples = target.sample_count();
        let mut resources = EntryResources::default();

        let color = match *object {
            GlObject::Texture(texture) => resources.texture.insert(
                rhi.wrap_native_texture(NativeRhiObject::GlTexture(texture), format, size, samples)
                    .map_err(rhi_failure("color texture"))?,
            ),
            GlObject::Renderbuffer(renderbuffer) => resources.renderbuffer.insert(
                rhi.wrap_native_renderbuffer(renderbuffer, format, size, samples)
                    .map_err(rhi_failure("color renderbuffer"))?,
            ),
        };
        let color: &dyn RhiResource = &**color;

        let depth_stencil = rhi
            .create_depth_stencil(size, samples)
            .map_err(rhi_failure("depth/stencil renderbuffer"))?;
        let render_target = rhi
            .create_texture_render_target(color, Some(depth_stencil.as_ref()))
            .map_err(rhi_failure("texture render target"))?;
        let render_pass = rhi
            .create_render_pass(render_target.as_ref())
            .map_err(rhi_failure("render pass descriptor"))?;

        target.set_rhi(RhiTargetHandles {
            render_target: render_target.id(),
            render_pass: render_pass.id(),
        });
        trace!(target = ?target.id(), ?format, "GLES render target materialized");

        resources.depth_stencil = Some(depth_stencil);
        resources.render_target = Some(render_target);
        resources.render_pass = Some(render_pass);
        Ok(resources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::RhiResourceKind;
    use crate::testing::MockRhi;
    use novade_compositor_core::Size;

    fn params() -> TargetParams {
        TargetParams {
            size: Size::new(640, 480),
            device_pixel_ratio: 1.0,
            sample_count: 4,
        }
    }

    fn native(object: GlObject, internal_format: u32) -> NativeBufferTexture {
        NativeBufferTexture::Gles { object, internal_format, has_alpha: true }
    }

    #[test]
    fn texture_target_is_mirrored() {
        let target = GlesAdapter.build(&native(GlObject::Texture(7), GL_RGBA8), &params()).unwrap();
        assert_eq!(target.kind(), &RenderTargetKind::GlTexture { texture: 7 });
        assert!(target.mirror_vertically());
        assert_eq!(target.sample_count(), 4);
        assert_eq!(target.pixel_size(), Size::new(640, 480));
        assert!(target.rhi().is_none());
    }

    #[test]
    fn zero_object_fails_construction() {
        let err = GlesAdapter.build(&native(GlObject::Texture(0), GL_RGBA8), &params()).unwrap_err();
        assert!(matches!(err, ConstructionError::ResourceCreationFailed { .. }));
    }

    #[test]
    fn unknown_format_falls_back_to_rgba8() {
        assert_eq!(rhi_format_from_gl(GL_BGRA8_EXT), RhiTextureFormat::Bgra8);
        assert_eq!(rhi_format_from_gl(0x1234), RhiTextureFormat::Rgba8);
    }

    #[test]
    fn materialize_creates_depth_stencil_and_pass() {
        let rhi = MockRhi::new();
        let native = native(GlObject::Renderbuffer(3), 0x1234);
        let mut target = GlesAdapter.build(&native, &params()).unwrap();
        let resources = GlesAdapter.materialize(&rhi, &native, &mut target).unwrap();

        assert_eq!(resources.len(), 4);
        assert!(resources.texture.is_none());
        assert_eq!(rhi.live_count(RhiResourceKind::Renderbuffer), 1);
        assert_eq!(rhi.live_count(RhiResourceKind::DepthStencil), 1);
        assert_eq!(rhi.wrapped_formats(), vec![RhiTextureFormat::Rgba8]);
        assert!(target.rhi().is_some());

        drop(resources);
        assert_eq!(rhi.live_total(), 0);
    }

    #[test]
    fn failed_materialize_releases_partial_resources() {
        let rhi = MockRhi::new();
        rhi.fail_on(RhiResourceKind::RenderPass);
        let native = native(GlObject::Texture(9), GL_RGBA8);
        let mut target = GlesAdapter.build(&native, &params()).unwrap();

        let err = GlesAdapter.materialize(&rhi, &native, &mut target).unwrap_err();
        assert!(matches!(
            err,
            ConstructionError::ResourceCreationFailed { resource: "render pass descriptor", .. }
        ));
        assert!(target.rhi().is_none());
        assert_eq!(rhi.live_total(), 0);
        assert_eq!(rhi.released_count(), 3);
    }
}
