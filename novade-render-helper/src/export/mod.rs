//! Export of rendered scene-graph textures as display buffers.
//!
//! The exported [`DisplayBuffer`] is owned by the caller as soon as it is
//! returned; nothing here keeps a reference to it.

pub mod cpu;
pub mod gles;
pub mod vulkan;

use crate::error::{ConfigurationMismatch, ExportError};
use crate::graphics_api::GraphicsApi;
use crate::renderer::BackendRenderer;
use crate::scene::SceneTexture;
use novade_buffer_manager::DisplayBuffer;

pub use self::cpu::{CpuExporter, CpuImageSource};
pub use self::gles::{
    DmabufImageQuery, DmabufSource, EglDisplay, EglImage, EglProc, ExportFn, ExportQueryFn, GlesExporter,
    EXPORT_DMABUF_IMAGE, EXPORT_DMABUF_IMAGE_QUERY,
};
pub use self::vulkan::{VulkanExportedMemory, VulkanExporter, VulkanMemoryExport};

/// Texture export strategy for the active graphics API.
#[derive(Debug)]
pub enum TextureExportAdapter {
    Gles(GlesExporter),
    Vulkan(VulkanExporter),
    Cpu(CpuExporter),
}

impl TextureExportAdapter {
    pub fn for_api(api: GraphicsApi) -> Result<Self, ConfigurationMismatch> {
        match api {
            GraphicsApi::OpenGl => Ok(TextureExportAdapter::Gles(GlesExporter::default())),
            GraphicsApi::Vulkan => Ok(TextureExportAdapter::Vulkan(VulkanExporter)),
            GraphicsApi::Software => Ok(TextureExportAdapter::Cpu(CpuExporter)),
            other => Err(ConfigurationMismatch::NoAdapter(other)),
        }
    }

    pub fn export(
        &self,
        renderer: &dyn BackendRenderer,
        texture: &dyn SceneTexture,
    ) -> Result<DisplayBuffer, ExportError> {
        match self {
            TextureExportAdapter::Gles(exporter) => exporter.export(renderer, texture),
            TextureExportAdapter::Vulkan(exporter) => exporter.export(renderer, texture),
            TextureExportAdapter::Cpu(exporter) => exporter.export(texture),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapters_exist_for_supported_apis() {
        assert!(matches!(TextureExportAdapter::for_api(GraphicsApi::OpenGl), Ok(TextureExportAdapter::Gles(_))));
        assert!(matches!(TextureExportAdapter::for_api(GraphicsApi::Vulkan), Ok(TextureExportAdapter::Vulkan(_))));
        assert!(matches!(TextureExportAdapter::for_api(GraphicsApi::Software), Ok(TextureExportAdapter::Cpu(_))));
        assert_eq!(
            TextureExportAdapter::for_api(GraphicsApi::Metal).unwrap_err(),
            ConfigurationMismatch::NoAdapter(GraphicsApi::Metal)
        );
    }
}
