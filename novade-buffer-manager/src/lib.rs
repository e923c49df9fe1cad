//! # Novade Buffer Manager
//!
//! This crate provides the display-buffer subsystem used by the compositor's
//! output path. It hands out [`DisplayBuffer`] handles whose identity is a
//! [`BufferId`], describes their native storage (DMA-BUF planes, shared memory,
//! or an arbitrary [`BufferSource`] for buffers manufactured by the compositor
//! itself), and delivers destruction notifications to weakly registered
//! listeners before the native storage is released.
//!
//! The buffers are single-threaded objects that live on the compositor's
//! render thread.

pub mod attributes;
pub mod buffer;
pub mod error;

// Re-export key types for convenience.
pub use attributes::{
    BufferSource, DataAccessFlags, DataPtrAccess, DmabufAttributes, DmabufPlane, PixelMemory,
    ShmAttributes,
};
pub use buffer::{
    BufferDestroyListener, BufferId, BufferManager, BufferType, ClientId, DisplayBuffer, ListenerId,
    WeakDisplayBuffer,
};
pub use error::BufferError;

pub use drm_fourcc::{DrmFourcc, DrmModifier};
