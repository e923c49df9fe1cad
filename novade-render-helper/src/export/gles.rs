//! DMA-BUF export of GL textures through `EGL_MESA_image_dma_buf_export`.

use crate::error::ExportError;
use crate::graphics_api::GraphicsApi;
use crate::renderer::BackendRenderer;
use crate::scene::{NativeTextureObject, SceneTexture};
use drm_fourcc::{DrmFourcc, DrmModifier};
use novade_buffer_manager::{BufferSource, DisplayBuffer, DmabufAttributes, DmabufPlane};
use once_cell::unsync::OnceCell;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, warn};

pub const EXPORT_DMABUF_IMAGE_QUERY: &str = "eglExportDMABUFImageQueryMESA";
pub const EXPORT_DMABUF_IMAGE: &str = "eglExportDMABUFImageMESA";

/// Opaque `EGLImage` handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EglImage(pub usize);

/// Layout reported by the export query entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmabufImageQuery {
    pub fourcc: DrmFourcc,
    pub num_planes: usize,
    pub modifier: DrmModifier,
}

pub type ExportQueryFn = Rc<dyn Fn(EglImage) -> Option<DmabufImageQuery>>;
pub type ExportFn = Rc<dyn Fn(EglImage, &DmabufImageQuery) -> Option<Vec<DmabufPlane>>>;

/// A resolved EGL extension entry point.
#[derive(Clone)]
pub enum EglProc {
    ExportDmabufImageQuery(ExportQueryFn),
    ExportDmabufImage(ExportFn),
}

/// The EGL display a GLES renderer draws with.
pub trait EglDisplay {
    fn create_image_from_texture(&self, texture: u32) -> Option<EglImage>;

    fn destroy_image(&self, image: EglImage);

    /// Looks up an extension entry point by name.
    fn get_proc_address(&self, name: &str) -> Option<EglProc>;
}

#[derive(Clone)]
struct ExportProcs {
    query: ExportQueryFn,
    export: ExportFn,
}

fn resolve_procs(egl: &dyn EglDisplay) -> Result<ExportProcs, ExportError> {
    let query = match egl.get_proc_address(EXPORT_DMABUF_IMAGE_QUERY) {
        Some(EglProc::ExportDmabufImageQuery(f)) => f,
        _ => return Err(ExportError::MissingEntryPoint(EXPORT_DMABUF_IMAGE_QUERY)),
    };
    let export = match egl.get_proc_address(EXPORT_DMABUF_IMAGE) {
        Some(EglProc::ExportDmabufImage(f)) => f,
        _ => return Err(ExportError::MissingEntryPoint(EXPORT_DMABUF_IMAGE)),
    };
    Ok(ExportProcs { query, export })
}

/// Destroys the image when the export is done, whatever its outcome.
struct ImageGuard<'a> {
    egl: &'a dyn EglDisplay,
    image: EglImage,
}

impl Drop for ImageGuard<'_> {
    fn drop(&mut self) {
        self.egl.destroy_image(self.image);
    }
}

/// Exports GL textures as DMA-BUF backed display buffers.
///
/// Entry points are resolved on first export. A missing entry point is
/// remembered and every later export fails immediately.
#[derive(Default)]
pub struct GlesExporter {
    procs: OnceCell<Result<ExportProcs, ExportError>>,
}

impl fmt::Debug for GlesExporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.procs.get() {
            None => "unresolved",
            Some(Ok(_)) => "resolved",
            Some(Err(_)) => "unavailable",
        };
        f.debug_struct("GlesExporter").field("entry_points", &state).finish()
    }
}

impl GlesExporter {
    pub fn export(&self, renderer: &dyn BackendRenderer, texture: &dyn SceneTexture) -> Result<DisplayBuffer, ExportError> {
        let NativeTextureObject::Gl { texture: gl_texture } = texture.native_object() else {
            return Err(ExportError::WrongTextureObject(GraphicsApi::OpenGl));
        };
        let egl = renderer.egl_display().ok_or(ExportError::NoEglDisplay)?;
        let procs = self
            .procs
            .get_or_init(|| {
                let resolved = resolve_procs(egl);
                if let Err(err) = &resolved {
                    warn!(error = %err, "DMA-BUF export unavailable");
                }
                resolved
            })
            .clone()?;

        let image = ImageGuard {
            egl,
            image: egl
                .create_image_from_texture(gl_texture)
                .ok_or(ExportError::ImageCreationFailed(gl_texture))?,
        };
        let query = (procs.query)(image.image).ok_or(ExportError::QueryFailed)?;
        let planes = (procs.export)(image.image, &query).ok_or(ExportError::ExportFailed)?;
        if planes.len() != query.num_planes {
            return Err(ExportError::ExportFailed);
        }

        let size = texture.pixel_size();
        let attributes = DmabufAttributes::new(size.width, size.height, query.fourcc, query.modifier, planes);
        debug!(
            texture = gl_texture,
            format = ?query.fourcc,
            planes = query.num_planes,
            "Exported GL texture as DMA-BUF"
        );
        Ok(DisplayBuffer::from_source(Box::new(DmabufSource(attributes)), size.width, size.height)?)
    }
}

/// Buffer source exposing exported DMA-BUF planes.
#[derive(Debug)]
pub struct DmabufSource(pub DmabufAttributes);

impl BufferSource for DmabufSource {
    fn format(&self) -> DrmFourcc {
        self.0.format
    }

    fn dmabuf(&self) -> Option<DmabufAttributes> {
        Some(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockEgl, MockRenderer, MockTexture};
    use crate::renderer::RendererKind;
    use novade_buffer_manager::BufferType;
    use novade_compositor_core::Size;

    fn gl_texture() -> MockTexture {
        MockTexture::gl(5, Size::new(256, 128))
    }

    #[test]
    fn exports_dmabuf_buffer() {
        let renderer = MockRenderer::new(RendererKind::Gles2).with_egl(MockEgl::with_export(1));
        let exporter = GlesExporter::default();
        let buffer = exporter.export(&renderer, &gl_texture()).unwrap();

        assert_eq!(buffer.buffer_type(), BufferType::Exported);
        assert_eq!((buffer.width(), buffer.height()), (256, 128));
        let dmabuf = buffer.dmabuf().unwrap();
        assert_eq!(dmabuf.plane_count(), 1);
        assert_eq!(dmabuf.format, DrmFourcc::Argb8888);

        let egl = renderer.mock_egl().unwrap();
        assert_eq!(egl.live_images(), 0);
    }

    #[test]
    fn missing_entry_point_fails_and_is_remembered() {
        let renderer = MockRenderer::new(RendererKind::Gles2).with_egl(MockEgl::without_export());
        let exporter = GlesExporter::default();

        assert_eq!(
            exporter.export(&renderer, &gl_texture()).unwrap_err(),
            ExportError::MissingEntryPoint(EXPORT_DMABUF_IMAGE_QUERY)
        );
        assert!(exporter.export(&renderer, &gl_texture()).is_err());

        let egl = renderer.mock_egl().unwrap();
        assert_eq!(egl.lookups(), vec![EXPORT_DMABUF_IMAGE_QUERY.to_string()]);
        assert_eq!(egl.images_created(), 0);
    }

    #[test]
    fn only_query_entry_point_is_not_enough() {
        let renderer = MockRenderer::new(RendererKind::Gles2).with_egl(MockEgl::query_only());
        let err = GlesExporter::default().export(&renderer, &gl_texture()).unwrap_err();
        assert_eq!(err, ExportError::MissingEntryPoint(EXPORT_DMABUF_IMAGE));
    }

    #[test]
    fn non_gl_texture_is_rejected() {
        let renderer = MockRenderer::new(RendererKind::Gles2).with_egl(MockEgl::with_export(1));
        let texture = MockTexture::cpu(Size::new(4, 4));
        assert_eq!(
            GlesExporter::default().export(&renderer, &texture).unwrap_err(),
            ExportError::WrongTextureObject(GraphicsApi::OpenGl)
        );
    }
}
