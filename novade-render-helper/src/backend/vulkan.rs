//! Vulkan render targets.

use super::{rhi_failure, EntryResources, TargetParams};
use crate::error::ConstructionError;
use crate::renderer::{NativeBufferTexture, RendererKind};
use crate::scene::{NativeRhiObject, Rhi, RhiTextureFormat};
use crate::target::{RenderTarget, RenderTargetKind, RhiTargetHandles};
use ash::vk;
use tracing::{debug, trace};

pub fn rhi_format_from_vk(format: vk::Format) -> RhiTextureFormat {
    match format {
        vk::Format::R8G8B8A8_UNORM | vk::Format::R8G8B8A8_SRGB => RhiTextureFormat::Rgba8,
        vk::Format::B8G8R8A8_UNORM | vk::Format::B8G8R8A8_SRGB => RhiTextureFormat::Bgra8,
        vk::Format::A2B10G10R10_UNORM_PACK32 => RhiTextureFormat::Rgb10A2,
        vk::Format::R16G16B16A16_SFLOAT => RhiTextureFormat::Rgba16F,
        other => {
            debug!(?other, "Unknown Vulkan format, wrapping as RGBA8");
            RhiTextureFormat::Rgba8
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VulkanAdapter;

impl VulkanAdapter {
    pub fn build(&self, native: &NativeBufferTexture, params: &TargetParams) -> Result<RenderTarget, ConstructionError> {
        let NativeBufferTexture::Vulkan { image, layout, format } = *native else {
            return Err(ConstructionError::NativeMismatch { expected: RendererKind::Vulkan });
        };
        if image == vk::Image::null() {
            return Err(ConstructionError::ResourceCreationFailed {
                resource: "Vulkan render target",
                reason: "buffer imported as a null VkImage".into(),
            });
        }
        Ok(
            RenderTarget::new(RenderTargetKind::VulkanImage { image, layout, format }, params.size, params.device_pixel_ratio)
                .with_sample_count(params.sample_count),
        )
    }

    /// Wraps the image and builds target and pass. Depth/stencil belongs to
    /// the render pass description and is not created here.
    pub fn materialize(
        &self,
        rhi: &dyn Rhi,
        native: &NativeBufferTexture,
        target: &mut RenderTarget,
    ) -> Result<EntryResources, ConstructionError> {
        let NativeBufferTexture::Vulkan { image, layout, format } = *native else {
            return Err(ConstructionError::NativeMismatch { expected: RendererKind::Vulkan });
        };
        let texture = rhi
            .wrap_native_texture(
                NativeRhiObject::VulkanImage { image, layout },
                rhi_format_from_vk(format),
                target.pixel_size(),
                target.sample_count(),
            )
            .map_err(rhi_failure("color texture"))?;
        let render_target = rhi
            .create_texture_render_target(texture.as_ref(), None)
            .map_err(rhi_failure("texture render target"))?;
        let render_pass = rhi
            .create_render_pass(render_target.as_ref())
            .map_err(rhi_failure("render pass descriptor"))?;

        target.set_rhi(RhiTargetHandles {
            render_target: render_target.id(),
            render_pass: render_pass.id(),
        });
        trace!(target = ?target.id(), ?format, "Vulkan render target materialized");

        Ok(EntryResources {
            render_pass: Some(render_pass),
            render_target: Some(render_target),
            texture: Some(texture),
            ..EntryResources::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::RhiResourceKind;
    use crate::testing::MockRhi;
    use ash::vk::Handle;
    use novade_compositor_core::Size;

    fn native(raw: u64) -> NativeBufferTexture {
        NativeBufferTexture::Vulkan {
            image: vk::Image::from_raw(raw),
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            format: vk::Format::B8G8R8A8_UNORM,
        }
    }

    fn params() -> TargetParams {
        TargetParams { size: Size::new(1920, 1080), device_pixel_ratio: 1.5, sample_count: 1 }
    }

    #[test]
    fn wraps_image_triple_unmirrored() {
        let target = VulkanAdapter.build(&native(42), &params()).unwrap();
        assert_eq!(
            target.kind(),
            &RenderTargetKind::VulkanImage {
                image: vk::Image::from_raw(42),
                layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                format: vk::Format::B8G8R8A8_UNORM,
            }
        );
        assert!(!target.mirror_vertically());
        assert_eq!(target.device_pixel_ratio(), 1.5);
    }

    #[test]
    fn null_image_fails() {
        assert!(VulkanAdapter.build(&native(0), &params()).is_err());
    }

    #[test]
    fn target_debug_names_vulkan_enums() {
        let target = VulkanAdapter.build(&native(42), &params()).unwrap();
        let rendered = format!("{:?}", target.kind());
        assert!(rendered.contains("B8G8R8A8_UNORM"), "{rendered}");
        assert!(rendered.contains("COLOR_ATTACHMENT_OPTIMAL"), "{rendered}");
    }

    #[test]
    fn materialize_skips_depth_stencil() {
        let rhi = MockRhi::new();
        let native = native(42);
        let mut target = VulkanAdapter.build(&native, &params()).unwrap();
        let resources = VulkanAdapter.materialize(&rhi, &native, &mut target).unwrap();
        assert_eq!(resources.len(), 3);
        assert_eq!(rhi.live_count(RhiResourceKind::DepthStencil), 0);
        assert_eq!(rhi.wrapped_formats(), vec![RhiTextureFormat::Bgra8]);
        assert!(target.rhi().is_some());
    }
}
