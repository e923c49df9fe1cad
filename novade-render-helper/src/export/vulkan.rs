//! Export of Vulkan images through their backing device memory.

use crate::error::ExportError;
use crate::graphics_api::GraphicsApi;
use crate::renderer::BackendRenderer;
use crate::scene::{NativeTextureObject, SceneTexture};
use ash::vk;
use drm_fourcc::{DrmFourcc, DrmModifier};
use novade_buffer_manager::{DisplayBuffer, DmabufAttributes, DmabufPlane};
use std::os::fd::OwnedFd;
use tracing::debug;

use super::gles::DmabufSource;

/// Device memory exported as a DMA-BUF file descriptor.
#[derive(Debug)]
pub struct VulkanExportedMemory {
    pub fd: OwnedFd,
    pub offset: u32,
    pub stride: u32,
    pub modifier: DrmModifier,
}

/// Memory export capability of a Vulkan renderer
/// (`VK_KHR_external_memory_fd` / `VK_EXT_external_memory_dma_buf`).
pub trait VulkanMemoryExport {
    fn export_memory(&self, image: vk::Image, memory: vk::DeviceMemory) -> Result<VulkanExportedMemory, ExportError>;
}

pub fn fourcc_from_vk(format: vk::Format) -> Option<DrmFourcc> {
    match format {
        vk::Format::B8G8R8A8_UNORM | vk::Format::B8G8R8A8_SRGB => Some(DrmFourcc::Argb8888),
        vk::Format::R8G8B8A8_UNORM | vk::Format::R8G8B8A8_SRGB => Some(DrmFourcc::Abgr8888),
        vk::Format::A2R10G10B10_UNORM_PACK32 => Some(DrmFourcc::Argb2101010),
        vk::Format::A2B10G10R10_UNORM_PACK32 => Some(DrmFourcc::Abgr2101010),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VulkanExporter;

impl VulkanExporter {
    /// Fails with [`ExportError::Unimplemented`] when the renderer cannot
    /// export memory.
    pub fn export(&self, renderer: &dyn BackendRenderer, texture: &dyn SceneTexture) -> Result<DisplayBuffer, ExportError> {
        let NativeTextureObject::Vulkan { image, memory, format } = texture.native_object() else {
            return Err(ExportError::WrongTextureObject(GraphicsApi::Vulkan));
        };
        let exporter = renderer
            .vulkan_memory_export()
            .ok_or(ExportError::Unimplemented(GraphicsApi::Vulkan))?;
        let fourcc = fourcc_from_vk(format).ok_or_else(|| ExportError::UnsupportedFormat(format!("{:?}", format)))?;

        let exported = exporter.export_memory(image, memory)?;
        let size = texture.pixel_size();
        let attributes = DmabufAttributes::new(
            size.width,
            size.height,
            fourcc,
            exported.modifier,
            vec![DmabufPlane {
                fd: exported.fd,
                offset: exported.offset,
                stride: exported.stride,
            }],
        );
        debug!(?format, "Exported Vulkan image as DMA-BUF");
        Ok(DisplayBuffer::from_source(Box::new(DmabufSource(attributes)), size.width, size.height)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::RendererKind;
    use crate::testing::{MockRenderer, MockTexture, MockVulkanExport};
    use novade_compositor_core::Size;

    #[test]
    fn renderer_without_memory_export_fails_cleanly() {
        let renderer = MockRenderer::new(RendererKind::Vulkan);
        let texture = MockTexture::vulkan(Size::new(32, 32), vk::Format::B8G8R8A8_UNORM);
        assert_eq!(
            VulkanExporter.export(&renderer, &texture).unwrap_err(),
            ExportError::Unimplemented(GraphicsApi::Vulkan)
        );
    }

    #[test]
    fn exports_single_plane_dmabuf() {
        let renderer = MockRenderer::new(RendererKind::Vulkan).with_vulkan_export(MockVulkanExport);
        let texture = MockTexture::vulkan(Size::new(32, 16), vk::Format::R8G8B8A8_UNORM);
        let buffer = VulkanExporter.export(&renderer, &texture).unwrap();
        let dmabuf = buffer.dmabuf().unwrap();
        assert_eq!(dmabuf.format, DrmFourcc::Abgr8888);
        assert_eq!(dmabuf.plane_count(), 1);
        assert_eq!(dmabuf.planes[0].stride, 128);
    }

    #[test]
    fn unknown_format_is_rejected() {
        let renderer = MockRenderer::new(RendererKind::Vulkan).with_vulkan_export(MockVulkanExport);
        let texture = MockTexture::vulkan(Size::new(8, 8), vk::Format::R8_UNORM);
        assert!(matches!(
            VulkanExporter.export(&renderer, &texture),
            Err(ExportError::UnsupportedFormat(_))
        ));
    }
}
