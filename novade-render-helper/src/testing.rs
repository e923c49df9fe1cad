//! Mock collaborators for exercising the render helper without a GPU or a
//! display.
//!
//! Compiled for unit tests and, through the `testing` feature, for
//! integration tests and downstream crates.

use crate::backend::gles::GL_RGBA8;
use crate::error::{ConstructionError, ExportError};
use crate::export::{
    DmabufImageQuery, EglDisplay, EglImage, EglProc, VulkanExportedMemory, VulkanMemoryExport,
    EXPORT_DMABUF_IMAGE, EXPORT_DMABUF_IMAGE_QUERY,
};
use crate::graphics_api::GraphicsApi;
use crate::output_helper::{OutputBackend, OutputCommit, OutputTransform, SwapchainBuffer, SwapchainHandle};
use crate::renderer::{BackendRenderer, GlObject, NativeBufferTexture, RendererFactory, RendererKind};
use crate::scene::{
    CpuImage, CpuImageConversion, NativeRhiObject, NativeTextureObject, RenderControl, Rhi, RhiError,
    RhiResource, RhiResourceId, RhiResourceKind, RhiTextureFormat, SceneTexture,
};
use ash::vk;
use ash::vk::Handle;
use drm_fourcc::{DrmFourcc, DrmModifier};
use image::RgbaImage;
use novade_buffer_manager::{
    BufferId, BufferManager, DataAccessFlags, DisplayBuffer, DmabufPlane, PixelMemory,
};
use novade_compositor_core::{Region, Size};
use std::cell::{Cell, RefCell};
use std::fs::File;
use std::os::fd::OwnedFd;
use std::rc::Rc;

/// Registers a tightly packed ARGB8888 shared-memory buffer.
pub fn shm_buffer(manager: &mut BufferManager, width: u32, height: u32) -> DisplayBuffer {
    manager
        .register_shm_buffer(width, height, width * 4, DrmFourcc::Argb8888, None)
        .expect("valid shm buffer parameters")
}

fn null_fd() -> Option<OwnedFd> {
    File::open("/dev/null").ok().map(OwnedFd::from)
}

// --- RHI ---

#[derive(Default)]
struct RhiLog {
    live: RefCell<Vec<(RhiResourceId, RhiResourceKind)>>,
    created: Cell<usize>,
    released: Cell<usize>,
    formats: RefCell<Vec<RhiTextureFormat>>,
}

struct MockRhiResource {
    id: RhiResourceId,
    kind: RhiResourceKind,
    log: Rc<RhiLog>,
}

impl RhiResource for MockRhiResource {
    fn id(&self) -> RhiResourceId {
        self.id
    }

    fn kind(&self) -> RhiResourceKind {
        self.kind
    }
}

impl Drop for MockRhiResource {
    fn drop(&mut self) {
        let mut live = self.log.live.borrow_mut();
        let index = live
            .iter()
            .position(|(id, _)| *id == self.id)
            .expect("RHI resource released twice");
        live.remove(index);
        self.log.released.set(self.log.released.get() + 1);
    }
}

/// RHI that records every object it creates and releases.
#[derive(Default)]
pub struct MockRhi {
    next_id: Cell<u64>,
    log: Rc<RhiLog>,
    fail: Cell<Option<RhiResourceKind>>,
}

impl MockRhi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes creation of `kind` objects fail.
    pub fn fail_on(&self, kind: RhiResourceKind) {
        self.fail.set(Some(kind));
    }

    pub fn fail_on_nothing(&self) {
        self.fail.set(None);
    }

    pub fn live_count(&self, kind: RhiResourceKind) -> usize {
        self.log.live.borrow().iter().filter(|(_, k)| *k == kind).count()
    }

    pub fn live_total(&self) -> usize {
        self.log.live.borrow().len()
    }

    pub fn created_count(&self) -> usize {
        self.log.created.get()
    }

    pub fn released_count(&self) -> usize {
        self.log.released.get()
    }

    pub fn wrapped_formats(&self) -> Vec<RhiTextureFormat> {
        self.log.formats.borrow().clone()
    }

    fn create(&self, kind: RhiResourceKind) -> Result<Box<dyn RhiResource>, RhiError> {
        if self.fail.get() == Some(kind) {
            return Err(RhiError(format!("{:?} creation disabled", kind)));
        }
        let id = RhiResourceId(self.next_id.get() + 1);
        self.next_id.set(id.0);
        self.log.live.borrow_mut().push((id, kind));
        self.log.created.set(self.log.created.get() + 1);
        Ok(Box::new(MockRhiResource {
            id,
            kind,
            log: self.log.clone(),
        }))
    }
}

impl Rhi for MockRhi {
    fn wrap_native_texture(
        &self,
        _object: NativeRhiObject,
        format: RhiTextureFormat,
        _size: Size,
        _sample_count: u32,
    ) -> Result<Box<dyn RhiResource>, RhiError> {
        let texture = self.create(RhiResourceKind::Texture)?;
        self.log.formats.borrow_mut().push(format);
        Ok(texture)
    }

    fn wrap_native_renderbuffer(
        &self,
        _renderbuffer: u32,
        format: RhiTextureFormat,
        _size: Size,
        _sample_count: u32,
    ) -> Result<Box<dyn RhiResource>, RhiError> {
        let renderbuffer = self.create(RhiResourceKind::Renderbuffer)?;
        self.log.formats.borrow_mut().push(format);
        Ok(renderbuffer)
    }

    fn create_depth_stencil(&self, _size: Size, _sample_count: u32) -> Result<Box<dyn RhiResource>, RhiError> {
        self.create(RhiResourceKind::DepthStencil)
    }

    fn create_texture_render_target(
        &self,
        _color: &dyn RhiResource,
        _depth_stencil: Option<&dyn RhiResource>,
    ) -> Result<Box<dyn RhiResource>, RhiError> {
        self.create(RhiResourceKind::RenderTarget)
    }

    fn create_render_pass(&self, _render_target: &dyn RhiResource) -> Result<Box<dyn RhiResource>, RhiError> {
        self.create(RhiResourceKind::RenderPass)
    }
}

/// Render control reporting a fixed API.
pub struct MockRenderControl {
    api: GraphicsApi,
    rhi: Option<Rc<MockRhi>>,
}

impl MockRenderControl {
    pub fn software() -> Self {
        Self { api: GraphicsApi::Software, rhi: None }
    }

    pub fn rhi(api: GraphicsApi, rhi: Rc<MockRhi>) -> Self {
        Self { api, rhi: Some(rhi) }
    }

    pub fn without_rhi(api: GraphicsApi) -> Self {
        Self { api, rhi: None }
    }
}

impl RenderControl for MockRenderControl {
    fn graphics_api(&self) -> GraphicsApi {
        self.api
    }

    fn rhi(&self) -> Option<&dyn Rhi> {
        self.rhi.as_deref().map(|rhi| rhi as &dyn Rhi)
    }
}

// --- EGL / Vulkan export ---

/// EGL display with configurable DMA-BUF export support.
pub struct MockEgl {
    query: bool,
    export: bool,
    num_planes: usize,
    lookups: RefCell<Vec<String>>,
    next_image: Cell<usize>,
    created: Cell<usize>,
    live: Cell<usize>,
}

impl MockEgl {
    fn new(query: bool, export: bool, num_planes: usize) -> Self {
        Self {
            query,
            export,
            num_planes,
            lookups: RefCell::new(Vec::new()),
            next_image: Cell::new(1),
            created: Cell::new(0),
            live: Cell::new(0),
        }
    }

    pub fn with_export(num_planes: usize) -> Self {
        Self::new(true, true, num_planes)
    }

    pub fn without_export() -> Self {
        Self::new(false, false, 0)
    }

    pub fn query_only() -> Self {
        Self::new(true, false, 1)
    }

    /// Entry point names looked up so far, in order.
    pub fn lookups(&self) -> Vec<String> {
        self.lookups.borrow().clone()
    }

    pub fn images_created(&self) -> usize {
        self.created.get()
    }

    pub fn live_images(&self) -> usize {
        self.live.get()
    }
}

impl EglDisplay for MockEgl {
    fn create_image_from_texture(&self, texture: u32) -> Option<EglImage> {
        if texture == 0 {
            return None;
        }
        let image = EglImage(self.next_image.get());
        self.next_image.set(image.0 + 1);
        self.created.set(self.created.get() + 1);
        self.live.set(self.live.get() + 1);
        Some(image)
    }

    fn destroy_image(&self, _image: EglImage) {
        self.live.set(self.live.get() - 1);
    }

    fn get_proc_address(&self, name: &str) -> Option<EglProc> {
        self.lookups.borrow_mut().push(name.to_string());
        let num_planes = self.num_planes;
        match name {
            EXPORT_DMABUF_IMAGE_QUERY if self.query => {
                Some(EglProc::ExportDmabufImageQuery(Rc::new(move |_image: EglImage| {
                    Some(DmabufImageQuery {
                        fourcc: DrmFourcc::Argb8888,
                        num_planes,
                        modifier: DrmModifier::Linear,
                    })
                })))
            }
            EXPORT_DMABUF_IMAGE if self.export => Some(EglProc::ExportDmabufImage(Rc::new(
                |_image: EglImage, query: &DmabufImageQuery| -> Option<Vec<DmabufPlane>> {
                    (0..query.num_planes)
                        .map(|index| {
                            null_fd().map(|fd| DmabufPlane {
                                fd,
                                offset: 0,
                                stride: 1024 * (index as u32 + 1),
                            })
                        })
                        .collect()
                },
            ))),
            _ => None,
        }
    }
}

/// Vulkan memory export backed by `/dev/null` descriptors.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockVulkanExport;

impl VulkanMemoryExport for MockVulkanExport {
    fn export_memory(&self, _image: vk::Image, _memory: vk::DeviceMemory) -> Result<VulkanExportedMemory, ExportError> {
        let fd = null_fd().ok_or(ExportError::ExportFailed)?;
        Ok(VulkanExportedMemory {
            fd,
            offset: 0,
            stride: 128,
            modifier: DrmModifier::Linear,
        })
    }
}

// --- Renderer ---

/// Renderer importing any buffer as a native object of its kind.
///
/// GL objects and Vulkan images are numbered after the buffer id; the CPU
/// renderer paints into the buffer's own pixel memory.
pub struct MockRenderer {
    kind: RendererKind,
    imports: Cell<usize>,
    pixman_memory: RefCell<Option<PixelMemory>>,
    egl: Option<MockEgl>,
    vulkan_export: Option<MockVulkanExport>,
}

impl MockRenderer {
    pub fn new(kind: RendererKind) -> Self {
        Self {
            kind,
            imports: Cell::new(0),
            pixman_memory: RefCell::new(None),
            egl: None,
            vulkan_export: None,
        }
    }

    pub fn with_egl(mut self, egl: MockEgl) -> Self {
        self.egl = Some(egl);
        self
    }

    pub fn with_vulkan_export(mut self, export: MockVulkanExport) -> Self {
        self.vulkan_export = Some(export);
        self
    }

    pub fn mock_egl(&self) -> Option<&MockEgl> {
        self.egl.as_ref()
    }

    pub fn import_count(&self) -> usize {
        self.imports.get()
    }

    /// Makes later CPU imports report `memory` instead of the buffer's own.
    pub fn override_pixman_memory(&self, memory: PixelMemory) {
        *self.pixman_memory.borrow_mut() = Some(memory);
    }
}

impl BackendRenderer for MockRenderer {
    fn kind(&self) -> RendererKind {
        self.kind
    }

    fn import_buffer(&self, buffer: &DisplayBuffer) -> Result<NativeBufferTexture, ConstructionError> {
        self.imports.set(self.imports.get() + 1);
        let raw = buffer.id().as_raw();
        Ok(match self.kind {
            RendererKind::Gles2 => NativeBufferTexture::Gles {
                object: GlObject::Texture(raw as u32),
                internal_format: GL_RGBA8,
                has_alpha: true,
            },
            RendererKind::Vulkan => NativeBufferTexture::Vulkan {
                image: vk::Image::from_raw(raw),
                layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                format: vk::Format::B8G8R8A8_UNORM,
            },
            RendererKind::Pixman => {
                let access = buffer.begin_data_ptr_access(DataAccessFlags::READ | DataAccessFlags::WRITE)?;
                buffer.end_data_ptr_access();
                let memory = self.pixman_memory.borrow().clone().unwrap_or(access.memory);
                NativeBufferTexture::Pixman {
                    memory,
                    width: buffer.width(),
                    height: buffer.height(),
                    stride: access.stride,
                    format: access.format,
                }
            }
        })
    }

    fn egl_display(&self) -> Option<&dyn EglDisplay> {
        self.egl.as_ref().map(|egl| egl as &dyn EglDisplay)
    }

    fn vulkan_memory_export(&self) -> Option<&dyn VulkanMemoryExport> {
        self.vulkan_export.as_ref().map(|export| export as &dyn VulkanMemoryExport)
    }
}

type CreateFn = Box<dyn Fn(RendererKind) -> Option<Rc<dyn BackendRenderer>>>;

/// Renderer factory delegating to a closure and recording requests.
pub struct MockRendererFactory {
    create: CreateFn,
    requests: RefCell<Vec<RendererKind>>,
}

impl MockRendererFactory {
    pub fn new(create: impl Fn(RendererKind) -> Option<Rc<dyn BackendRenderer>> + 'static) -> Self {
        Self {
            create: Box::new(create),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<RendererKind> {
        self.requests.borrow().clone()
    }
}

impl RendererFactory for MockRendererFactory {
    fn create(&self, kind: RendererKind) -> Option<Rc<dyn BackendRenderer>> {
        self.requests.borrow_mut().push(kind);
        (self.create)(kind)
    }
}

// --- Scene textures ---

/// Scene texture with a fixed native object and CPU readback.
pub struct MockTexture {
    size: Size,
    native: NativeTextureObject,
    cpu: CpuImageConversion,
}

impl MockTexture {
    pub fn gl(texture: u32, size: Size) -> Self {
        Self {
            size,
            native: NativeTextureObject::Gl { texture },
            cpu: CpuImageConversion::Unsupported,
        }
    }

    pub fn vulkan(size: Size, format: vk::Format) -> Self {
        Self {
            size,
            native: NativeTextureObject::Vulkan {
                image: vk::Image::from_raw(7),
                memory: vk::DeviceMemory::from_raw(9),
                format,
            },
            cpu: CpuImageConversion::Unsupported,
        }
    }

    /// A CPU texture holding a transparent RGBA image of `size`.
    pub fn cpu(size: Size) -> Self {
        Self {
            size,
            native: NativeTextureObject::None,
            cpu: CpuImageConversion::Converted(CpuImage::from(RgbaImage::new(size.width, size.height))),
        }
    }

    /// A CPU texture without content.
    pub fn empty() -> Self {
        Self {
            size: Size::default(),
            native: NativeTextureObject::None,
            cpu: CpuImageConversion::Empty,
        }
    }

    /// A texture kind the CPU path cannot read back.
    pub fn unsupported() -> Self {
        Self {
            size: Size::new(1, 1),
            native: NativeTextureObject::None,
            cpu: CpuImageConversion::Unsupported,
        }
    }

    pub fn cpu_memory(&self) -> Option<PixelMemory> {
        match &self.cpu {
            CpuImageConversion::Converted(image) => Some(image.memory.clone()),
            _ => None,
        }
    }
}

impl SceneTexture for MockTexture {
    fn pixel_size(&self) -> Size {
        self.size
    }

    fn native_object(&self) -> NativeTextureObject {
        self.native
    }

    fn to_cpu_image(&self) -> CpuImageConversion {
        self.cpu.clone()
    }
}

// --- Output backend ---

/// A commit as seen by [`MockOutput`].
#[derive(Debug, Clone)]
pub struct RecordedCommit {
    pub buffer: BufferId,
    pub damage: Region,
    pub scale: Option<f64>,
    pub transform: Option<OutputTransform>,
}

/// Output backend with a round-robin swapchain of shared-memory buffers.
pub struct MockOutput {
    name: String,
    size: Cell<Size>,
    swapchain_len: Cell<usize>,
    manager: RefCell<BufferManager>,
    swapchain: RefCell<Vec<DisplayBuffer>>,
    used: RefCell<Vec<BufferId>>,
    next: Cell<usize>,
    ready: Cell<bool>,
    reject: Cell<bool>,
    commits: RefCell<Vec<RecordedCommit>>,
}

impl MockOutput {
    pub fn new(name: &str, size: Size) -> Self {
        let output = Self {
            name: name.to_string(),
            size: Cell::new(size),
            swapchain_len: Cell::new(2),
            manager: RefCell::new(BufferManager::new()),
            swapchain: RefCell::new(Vec::new()),
            used: RefCell::new(Vec::new()),
            next: Cell::new(0),
            ready: Cell::new(false),
            reject: Cell::new(false),
            commits: RefCell::new(Vec::new()),
        };
        output.reallocate();
        output
    }

    pub fn with_swapchain_len(self, len: usize) -> Self {
        self.set_swapchain_len(len);
        self
    }

    /// Resizes the swapchain; zero leaves the output without buffers.
    pub fn set_swapchain_len(&self, len: usize) {
        self.swapchain_len.set(len);
        self.reallocate();
    }

    /// Changes the mode; the swapchain is destroyed and reallocated.
    pub fn set_pixel_size(&self, size: Size) {
        self.size.set(size);
        self.reallocate();
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.set(ready);
    }

    pub fn reject_commits(&self, reject: bool) {
        self.reject.set(reject);
    }

    pub fn commit_count(&self) -> usize {
        self.commits.borrow().len()
    }

    pub fn last_commit(&self) -> Option<RecordedCommit> {
        self.commits.borrow().last().cloned()
    }

    /// Buffers currently in the swapchain.
    pub fn swapchain_buffers(&self) -> Vec<DisplayBuffer> {
        self.swapchain.borrow().clone()
    }

    fn reallocate(&self) {
        let old = std::mem::take(&mut *self.swapchain.borrow_mut());
        let mut manager = self.manager.borrow_mut();
        for buffer in old {
            // Already-destroyed buffers are simply skipped.
            let _ = manager.destroy_buffer(buffer.id());
        }
        let size = self.size.get();
        let buffers = (0..self.swapchain_len.get())
            .map(|_| shm_buffer(&mut manager, size.width, size.height))
            .collect();
        *self.swapchain.borrow_mut() = buffers;
        self.used.borrow_mut().clear();
        self.next.set(0);
    }
}

impl OutputBackend for MockOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn pixel_size(&self) -> Size {
        self.size.get()
    }

    fn acquire_swapchain_buffer(&self) -> Option<SwapchainBuffer> {
        let swapchain = self.swapchain.borrow();
        if swapchain.is_empty() {
            return None;
        }
        let buffer = swapchain[self.next.get() % swapchain.len()].clone();
        self.next.set(self.next.get() + 1);
        let mut used = self.used.borrow_mut();
        let age = if used.contains(&buffer.id()) {
            swapchain.len() as u32
        } else {
            used.push(buffer.id());
            0
        };
        Some(SwapchainBuffer { buffer, age })
    }

    fn swapchain(&self) -> Option<SwapchainHandle> {
        (!self.swapchain.borrow().is_empty()).then_some(SwapchainHandle(1))
    }

    fn is_ready_for_frame(&self) -> bool {
        self.ready.get()
    }

    fn commit(&self, commit: &OutputCommit<'_>) -> bool {
        if self.reject.get() {
            return false;
        }
        self.commits.borrow_mut().push(RecordedCommit {
            buffer: commit.buffer.id(),
            damage: commit.damage.clone(),
            scale: commit.scale,
            transform: commit.transform,
        });
        true
    }
}
