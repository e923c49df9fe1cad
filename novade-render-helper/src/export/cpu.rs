//! Export of CPU-side textures for the software renderer.

use crate::error::{fatal_configuration_mismatch, ConfigurationMismatch, ExportError};
use crate::graphics_api::GraphicsApi;
use crate::scene::{CpuImage, CpuImageConversion, SceneTexture};
use drm_fourcc::DrmFourcc;
use novade_buffer_manager::{BufferSource, DataAccessFlags, DataPtrAccess, DisplayBuffer, ShmAttributes};
use tracing::debug;

/// Buffer source over a CPU image. Pixels are shared, not copied.
#[derive(Debug, Clone)]
pub struct CpuImageSource(pub CpuImage);

impl BufferSource for CpuImageSource {
    fn format(&self) -> DrmFourcc {
        self.0.format
    }

    fn shm(&self) -> Option<ShmAttributes> {
        Some(ShmAttributes {
            width: self.0.width,
            height: self.0.height,
            stride: self.0.stride,
            offset: 0,
            format: self.0.format,
        })
    }

    fn begin_data_ptr_access(&self, flags: DataAccessFlags) -> Option<DataPtrAccess> {
        Some(DataPtrAccess {
            memory: self.0.memory.clone(),
            format: self.0.format,
            stride: self.0.stride,
            flags,
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CpuExporter;

impl CpuExporter {
    /// Wraps the texture's image in a display buffer.
    ///
    /// A texture kind the software path cannot read back means the scene
    /// graph was built for another backend, which is fatal.
    pub fn export(&self, texture: &dyn SceneTexture) -> Result<DisplayBuffer, ExportError> {
        let image = match texture.to_cpu_image() {
            CpuImageConversion::Converted(image) if !image.is_null() => image,
            CpuImageConversion::Converted(_) | CpuImageConversion::Empty => return Err(ExportError::EmptyImage),
            CpuImageConversion::Unsupported => {
                fatal_configuration_mismatch(ConfigurationMismatch::TextureSubtype(GraphicsApi::Software))
            }
        };
        let (width, height) = (image.width, image.height);
        debug!(width, height, format = ?image.format, "Exported CPU image");
        Ok(DisplayBuffer::from_source(Box::new(CpuImageSource(image)), width, height)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTexture;
    use novade_buffer_manager::PixelMemory;
    use novade_compositor_core::Size;

    #[test]
    fn wraps_image_without_copying() {
        let texture = MockTexture::cpu(Size::new(8, 4));
        let buffer = CpuExporter.export(&texture).unwrap();
        let shm = buffer.shm().unwrap();
        assert_eq!((shm.width, shm.height, shm.stride), (8, 4, 32));
        assert_eq!(shm.format, DrmFourcc::Abgr8888);

        let access = buffer.begin_data_ptr_access(DataAccessFlags::READ).unwrap();
        assert!(PixelMemory::ptr_eq(&access.memory, &texture.cpu_memory().unwrap()));
        buffer.end_data_ptr_access();
    }

    #[test]
    fn empty_image_fails() {
        assert_eq!(CpuExporter.export(&MockTexture::empty()).unwrap_err(), ExportError::EmptyImage);
    }

    #[test]
    #[should_panic(expected = "graphics configuration mismatch")]
    fn unsupported_texture_is_fatal() {
        let _ = CpuExporter.export(&MockTexture::unsupported());
    }
}
