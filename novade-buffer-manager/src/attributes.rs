//! Native storage descriptions for display buffers.

use bitflags::bitflags;
use drm_fourcc::{DrmFourcc, DrmModifier};
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::os::fd::OwnedFd;
use std::rc::Rc;

bitflags! {
    /// Requested access when mapping a buffer's pixel memory.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DataAccessFlags: u32 {
        /// The caller reads pixels.
        const READ = 1;
        /// The caller writes pixels.
        const WRITE = 2;
    }
}

/// CPU-visible pixel memory shared between a buffer and its users.
///
/// Clones share the same allocation; [`PixelMemory::ptr_eq`] tells whether
/// two handles refer to the same memory.
#[derive(Clone)]
pub struct PixelMemory(Rc<RefCell<Vec<u8>>>);

impl PixelMemory {
    /// Allocates `len` zeroed bytes.
    pub fn zeroed(len: usize) -> Self {
        Self(Rc::new(RefCell::new(vec![0; len])))
    }

    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self(Rc::new(RefCell::new(bytes)))
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bytes(&self) -> Ref<'_, Vec<u8>> {
        self.0.borrow()
    }

    pub fn bytes_mut(&self) -> RefMut<'_, Vec<u8>> {
        self.0.borrow_mut()
    }

    /// Address of the shared allocation, used as the memory's identity.
    pub fn as_ptr(&self) -> *const u8 {
        self.0.as_ptr() as *const u8
    }

    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.0, &b.0)
    }
}

impl fmt::Debug for PixelMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelMemory")
            .field("ptr", &self.as_ptr())
            .field("len", &self.len())
            .finish()
    }
}

/// A mapped view of a buffer's pixels, valid until the matching
/// `end_data_ptr_access`.
#[derive(Debug, Clone)]
pub struct DataPtrAccess {
    pub memory: PixelMemory,
    pub format: DrmFourcc,
    /// Bytes per row.
    pub stride: u32,
    pub flags: DataAccessFlags,
}

/// One plane of a DMA-BUF.
#[derive(Debug)]
pub struct DmabufPlane {
    pub fd: OwnedFd,
    pub offset: u32,
    pub stride: u32,
}

/// Cross-process shareable GPU buffer description.
///
/// The plane file descriptors are owned by the attributes and closed when the
/// last clone is dropped.
#[derive(Debug, Clone)]
pub struct DmabufAttributes {
    pub width: u32,
    pub height: u32,
    pub format: DrmFourcc,
    pub modifier: DrmModifier,
    pub planes: Rc<[DmabufPlane]>,
}

impl DmabufAttributes {
    pub fn new(
        width: u32,
        height: u32,
        format: DrmFourcc,
        modifier: DrmModifier,
        planes: Vec<DmabufPlane>,
    ) -> Self {
        Self {
            width,
            height,
            format,
            modifier,
            planes: planes.into(),
        }
    }

    pub fn plane_count(&self) -> usize {
        self.planes.len()
    }
}

/// Layout of a shared-memory buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShmAttributes {
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub offset: u32,
    pub format: DrmFourcc,
}

/// Backing implementation of a buffer created by the compositor rather than a
/// client, e.g. a texture exported from the scene graph.
///
/// A source describes itself either as a DMA-BUF, as shared memory, or by
/// giving direct access to its pixels. Unsupported capabilities keep the
/// default `None`.
pub trait BufferSource {
    fn format(&self) -> DrmFourcc;

    fn dmabuf(&self) -> Option<DmabufAttributes> {
        None
    }

    fn shm(&self) -> Option<ShmAttributes> {
        None
    }

    fn begin_data_ptr_access(&self, _flags: DataAccessFlags) -> Option<DataPtrAccess> {
        None
    }

    fn end_data_ptr_access(&self) {}
}

/// Bytes per pixel for the single-plane packed formats the buffer subsystem
/// accepts in shared memory.
pub fn bytes_per_pixel(format: DrmFourcc) -> Option<u32> {
    match format {
        DrmFourcc::Argb8888
        | DrmFourcc::Xrgb8888
        | DrmFourcc::Abgr8888
        | DrmFourcc::Xbgr8888
        | DrmFourcc::Rgba8888
        | DrmFourcc::Rgbx8888
        | DrmFourcc::Bgra8888
        | DrmFourcc::Bgrx8888 => Some(4),
        DrmFourcc::Rgb888 | DrmFourcc::Bgr888 => Some(3),
        DrmFourcc::Rgb565 | DrmFourcc::Bgr565 => Some(2),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn pixel_memory_identity_follows_allocation() {
        let a = PixelMemory::zeroed(16);
        let b = a.clone();
        let c = PixelMemory::zeroed(16);
        assert!(PixelMemory::ptr_eq(&a, &b));
        assert!(!PixelMemory::ptr_eq(&a, &c));
        assert_eq!(a.as_ptr(), b.as_ptr());

        b.bytes_mut()[0] = 0xff;
        assert_eq!(a.bytes()[0], 0xff);
    }

    #[test]
    fn dmabuf_attributes_share_planes_between_clones() {
        let fd = OwnedFd::from(File::open("/dev/null").unwrap());
        let attrs = DmabufAttributes::new(
            64,
            32,
            DrmFourcc::Argb8888,
            DrmModifier::Linear,
            vec![DmabufPlane { fd, offset: 0, stride: 256 }],
        );
        let copy = attrs.clone();
        assert_eq!(copy.plane_count(), 1);
        assert!(Rc::ptr_eq(&attrs.planes, &copy.planes));
    }

    #[test]
    fn packed_format_sizes() {
        assert_eq!(bytes_per_pixel(DrmFourcc::Xrgb8888), Some(4));
        assert_eq!(bytes_per_pixel(DrmFourcc::Rgb565), Some(2));
        assert_eq!(bytes_per_pixel(DrmFourcc::Nv12), None);
    }
}
