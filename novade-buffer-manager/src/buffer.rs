//! Display buffer handles, destruction notification and the buffer registry.

use crate::attributes::{
    bytes_per_pixel, BufferSource, DataAccessFlags, DataPtrAccess, DmabufAttributes, PixelMemory,
    ShmAttributes,
};
use crate::error::BufferError;
use drm_fourcc::DrmFourcc;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace, warn};

/// Represents a unique identifier for a Wayland client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(u64);

impl ClientId {
    /// Creates a new client ID.
    ///
    /// # Arguments
    /// * `id`: The raw `u64` value for this client ID.
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Represents a unique identifier for a buffer.
///
/// Identifiers are never reused within a process, so a `BufferId` names at
/// most one buffer over the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(u64);

impl BufferId {
    fn new_unique() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        BufferId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_raw(&self) -> u64 {
        self.0
    }
}

/// Identifies a destruction listener. Subscribing twice with the same id
/// collapses into one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Creates a new, unique `ListenerId`.
    pub fn new_unique() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        ListenerId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Specifies the underlying type or source of a buffer's memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferType {
    /// Buffer memory is managed via a shared memory mechanism (e.g., `wl_shm`).
    Shm,
    /// Buffer memory is represented by DMA buffer file descriptors.
    DmaBuf,
    /// Buffer produced by the compositor itself and backed by a [`BufferSource`].
    Exported,
}

/// Receives a notification when an observed buffer is destroyed.
///
/// The notification is delivered inline, before the buffer's native storage
/// is released.
pub trait BufferDestroyListener {
    fn buffer_destroyed(&self, id: BufferId);
}

enum BufferStorage {
    Dmabuf(DmabufAttributes),
    Shm {
        attributes: ShmAttributes,
        memory: PixelMemory,
    },
    Source(Box<dyn BufferSource>),
}

impl fmt::Debug for BufferStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferStorage::Dmabuf(attrs) => f.debug_tuple("Dmabuf").field(attrs).finish(),
            BufferStorage::Shm { attributes, memory } => f
                .debug_struct("Shm")
                .field("attributes", attributes)
                .field("memory", memory)
                .finish(),
            BufferStorage::Source(_) => f.write_str("Source(..)"),
        }
    }
}

struct BufferInner {
    id: BufferId,
    buffer_type: BufferType,
    width: u32,
    height: u32,
    format: DrmFourcc,
    client_owner_id: Option<ClientId>,
    storage: RefCell<Option<BufferStorage>>,
    listeners: RefCell<Vec<(ListenerId, Weak<dyn BufferDestroyListener>)>>,
    access: Cell<Option<DataAccessFlags>>,
    destroyed: Cell<bool>,
}

impl BufferInner {
    /// Marks the buffer destroyed and notifies every live listener. Returns
    /// `false` if the buffer was already destroyed.
    fn notify_destroyed(&self) -> bool {
        if self.destroyed.replace(true) {
            return false;
        }
        // Listeners may call back into the buffer, so the list is detached first.
        let listeners = std::mem::take(&mut *self.listeners.borrow_mut());
        debug!(buffer = ?self.id, listeners = listeners.len(), "Destroying buffer");
        for (_, listener) in listeners {
            if let Some(listener) = listener.upgrade() {
                listener.buffer_destroyed(self.id);
            }
        }
        true
    }
}

impl Drop for BufferInner {
    fn drop(&mut self) {
        self.notify_destroyed();
    }
}

/// Handle to a display buffer owned by the buffer subsystem.
///
/// Clones refer to the same buffer; equality and hashing use the buffer's
/// [`BufferId`]. When the last handle is dropped the buffer is destroyed
/// implicitly.
#[derive(Clone)]
pub struct DisplayBuffer(Rc<BufferInner>);

/// Non-owning reference to a [`DisplayBuffer`].
#[derive(Clone)]
pub struct WeakDisplayBuffer {
    id: BufferId,
    inner: Weak<BufferInner>,
}

impl DisplayBuffer {
    fn new(
        buffer_type: BufferType,
        width: u32,
        height: u32,
        format: DrmFourcc,
        client_owner_id: Option<ClientId>,
        storage: BufferStorage,
    ) -> Self {
        let id = BufferId::new_unique();
        trace!(buffer = ?id, ?buffer_type, width, height, ?format, "Creating display buffer");
        Self(Rc::new(BufferInner {
            id,
            buffer_type,
            width,
            height,
            format,
            client_owner_id,
            storage: RefCell::new(Some(storage)),
            listeners: RefCell::new(Vec::new()),
            access: Cell::new(None),
            destroyed: Cell::new(false),
        }))
    }

    /// Creates a buffer backed by a compositor-side [`BufferSource`].
    ///
    /// The returned handle is the only owner; the caller decides how long the
    /// buffer lives.
    pub fn from_source(
        source: Box<dyn BufferSource>,
        width: u32,
        height: u32,
    ) -> Result<Self, BufferError> {
        if width == 0 || height == 0 {
            return Err(BufferError::InvalidDimensions { width, height });
        }
        let format = source.format();
        Ok(Self::new(
            BufferType::Exported,
            width,
            height,
            format,
            None,
            BufferStorage::Source(source),
        ))
    }

    pub fn id(&self) -> BufferId {
        self.0.id
    }

    pub fn buffer_type(&self) -> BufferType {
        self.0.buffer_type
    }

    pub fn width(&self) -> u32 {
        self.0.width
    }

    pub fn height(&self) -> u32 {
        self.0.height
    }

    pub fn format(&self) -> DrmFourcc {
        self.0.format
    }

    pub fn client_owner_id(&self) -> Option<ClientId> {
        self.0.client_owner_id
    }

    pub fn is_destroyed(&self) -> bool {
        self.0.destroyed.get()
    }

    pub fn downgrade(&self) -> WeakDisplayBuffer {
        WeakDisplayBuffer {
            id: self.0.id,
            inner: Rc::downgrade(&self.0),
        }
    }

    /// DMA-BUF description of the buffer, if it has one.
    pub fn dmabuf(&self) -> Option<DmabufAttributes> {
        match self.0.storage.borrow().as_ref()? {
            BufferStorage::Dmabuf(attrs) => Some(attrs.clone()),
            BufferStorage::Source(source) => source.dmabuf(),
            BufferStorage::Shm { .. } => None,
        }
    }

    /// Shared-memory layout of the buffer, if it has one.
    pub fn shm(&self) -> Option<ShmAttributes> {
        match self.0.storage.borrow().as_ref()? {
            BufferStorage::Shm { attributes, .. } => Some(*attributes),
            BufferStorage::Source(source) => source.shm(),
            BufferStorage::Dmabuf(_) => None,
        }
    }

    /// Maps the buffer's pixel memory for CPU access.
    ///
    /// Only one access may be active at a time; it ends with
    /// [`DisplayBuffer::end_data_ptr_access`].
    pub fn begin_data_ptr_access(&self, flags: DataAccessFlags) -> Result<DataPtrAccess, BufferError> {
        let id = self.0.id;
        if self.0.access.get().is_some() {
            return Err(BufferError::AccessInProgress(id));
        }
        let storage = self.0.storage.borrow();
        let access = match storage.as_ref() {
            None => return Err(BufferError::Destroyed(id)),
            Some(BufferStorage::Shm { attributes, memory }) => DataPtrAccess {
                memory: memory.clone(),
                format: attributes.format,
                stride: attributes.stride,
                flags,
            },
            Some(BufferStorage::Source(source)) => source
                .begin_data_ptr_access(flags)
                .ok_or(BufferError::NoDataPtrAccess(id))?,
            Some(BufferStorage::Dmabuf(_)) => return Err(BufferError::NoDataPtrAccess(id)),
        };
        self.0.access.set(Some(flags));
        Ok(access)
    }

    pub fn end_data_ptr_access(&self) {
        if self.0.access.take().is_none() {
            warn!(buffer = ?self.0.id, "end_data_ptr_access without a matching begin");
            return;
        }
        if let Some(BufferStorage::Source(source)) = self.0.storage.borrow().as_ref() {
            source.end_data_ptr_access();
        }
    }

    /// Registers a weak destruction listener.
    ///
    /// Returns `false` if `listener_id` was already subscribed; the existing
    /// subscription is kept. Subscribing to a destroyed buffer is a no-op.
    pub fn subscribe_destroy(
        &self,
        listener_id: ListenerId,
        listener: Weak<dyn BufferDestroyListener>,
    ) -> bool {
        if self.is_destroyed() {
            return false;
        }
        let mut listeners = self.0.listeners.borrow_mut();
        listeners.retain(|(_, l)| l.strong_count() > 0);
        if listeners.iter().any(|(id, _)| *id == listener_id) {
            return false;
        }
        listeners.push((listener_id, listener));
        true
    }

    /// Removes a destruction listener. Returns whether it was subscribed.
    pub fn unsubscribe_destroy(&self, listener_id: ListenerId) -> bool {
        let mut listeners = self.0.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(id, _)| *id != listener_id);
        listeners.len() != before
    }

    /// Number of live destruction listeners.
    pub fn listener_count(&self) -> usize {
        self.0
            .listeners
            .borrow()
            .iter()
            .filter(|(_, l)| l.strong_count() > 0)
            .count()
    }

    /// Destroys the buffer: notifies listeners, then releases the native
    /// storage. Handles stay valid but the buffer no longer exposes storage.
    pub fn destroy(&self) {
        if self.0.notify_destroyed() {
            self.0.access.set(None);
            self.0.storage.borrow_mut().take();
        }
    }
}

impl PartialEq for DisplayBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for DisplayBuffer {}

impl std::hash::Hash for DisplayBuffer {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for DisplayBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisplayBuffer")
            .field("id", &self.0.id)
            .field("type", &self.0.buffer_type)
            .field("size", &(self.0.width, self.0.height))
            .field("format", &self.0.format)
            .field("destroyed", &self.0.destroyed.get())
            .finish()
    }
}

impl WeakDisplayBuffer {
    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn upgrade(&self) -> Option<DisplayBuffer> {
        self.inner.upgrade().map(DisplayBuffer)
    }
}

impl fmt::Debug for WeakDisplayBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WeakDisplayBuffer").field(&self.id).finish()
    }
}

/// Registry of client buffers known to the compositor.
///
/// The registry holds one handle per buffer; other components hold clones
/// (or weak references) for as long as they need them.
#[derive(Default)]
pub struct BufferManager {
    buffers: HashMap<BufferId, DisplayBuffer>,
}

impl BufferManager {
    /// Creates a new, empty `BufferManager`.
    pub fn new() -> Self {
        Self {
            buffers: HashMap::new(),
        }
    }

    /// Registers a shared-memory buffer and allocates its pixel memory.
    ///
    /// # Arguments
    /// * `width`, `height`: Dimensions in pixels. Must be positive.
    /// * `stride`: Bytes per row. Must cover `width` pixels of `format`.
    /// * `format`: A packed single-plane pixel format.
    /// * `client_owner_id`: Optional `ClientId` of the owner.
    ///
    /// # Returns
    /// A handle to the new buffer, or a `BufferError` describing the invalid
    /// parameter.
    pub fn register_shm_buffer(
        &mut self,
        width: u32,
        height: u32,
        stride: u32,
        format: DrmFourcc,
        client_owner_id: Option<ClientId>,
    ) -> Result<DisplayBuffer, BufferError> {
        if width == 0 || height == 0 {
            return Err(BufferError::InvalidDimensions { width, height });
        }
        let bpp = bytes_per_pixel(format).ok_or(BufferError::UnsupportedFormat(format))?;
        let required = width.saturating_mul(bpp);
        if stride < required {
            return Err(BufferError::InvalidStride { stride, required });
        }

        let attributes = ShmAttributes {
            width,
            height,
            stride,
            offset: 0,
            format,
        };
        let memory = PixelMemory::zeroed(stride as usize * height as usize);
        let buffer = DisplayBuffer::new(
            BufferType::Shm,
            width,
            height,
            format,
            client_owner_id,
            BufferStorage::Shm { attributes, memory },
        );
        self.buffers.insert(buffer.id(), buffer.clone());
        Ok(buffer)
    }

    /// Registers a DMA-BUF backed buffer.
    pub fn register_dmabuf_buffer(
        &mut self,
        attributes: DmabufAttributes,
        client_owner_id: Option<ClientId>,
    ) -> Result<DisplayBuffer, BufferError> {
        if attributes.width == 0 || attributes.height == 0 {
            return Err(BufferError::InvalidDimensions {
                width: attributes.width,
                height: attributes.height,
            });
        }
        if attributes.planes.is_empty() {
            return Err(BufferError::MissingPlanes);
        }
        let buffer = DisplayBuffer::new(
            BufferType::DmaBuf,
            attributes.width,
            attributes.height,
            attributes.format,
            client_owner_id,
            BufferStorage::Dmabuf(attributes),
        );
        self.buffers.insert(buffer.id(), buffer.clone());
        Ok(buffer)
    }

    /// Retrieves a buffer by its ID.
    pub fn get_buffer(&self, id: BufferId) -> Option<DisplayBuffer> {
        self.buffers.get(&id).cloned()
    }

    /// Destroys a registered buffer.
    ///
    /// Listeners are notified before the native storage is released. Other
    /// handles remain valid but observe a destroyed buffer.
    pub fn destroy_buffer(&mut self, id: BufferId) -> Result<(), BufferError> {
        let buffer = self.buffers.remove(&id).ok_or(BufferError::UnknownBuffer(id))?;
        buffer.destroy();
        Ok(())
    }

    /// Destroys every buffer owned by `client`, e.g. on client disconnect.
    pub fn destroy_client_buffers(&mut self, client: ClientId) -> usize {
        let ids: Vec<BufferId> = self
            .buffers
            .values()
            .filter(|b| b.client_owner_id() == Some(client))
            .map(DisplayBuffer::id)
            .collect();
        for id in &ids {
            if let Some(buffer) = self.buffers.remove(id) {
                buffer.destroy();
            }
        }
        ids.len()
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}
