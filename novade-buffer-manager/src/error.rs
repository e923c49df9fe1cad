use crate::buffer::BufferId;
use drm_fourcc::DrmFourcc;
use thiserror::Error;

/// Errors raised by the buffer subsystem.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    #[error("Invalid buffer dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Stride {stride} is too small for the buffer (requires at least {required})")]
    InvalidStride { stride: u32, required: u32 },

    #[error("Unsupported pixel format: {0:?}")]
    UnsupportedFormat(DrmFourcc),

    #[error("DMA-BUF attributes carry no planes")]
    MissingPlanes,

    #[error("Buffer {0:?} is not registered")]
    UnknownBuffer(BufferId),

    #[error("Buffer {0:?} has already been destroyed")]
    Destroyed(BufferId),

    #[error("Buffer {0:?} does not expose its pixel memory")]
    NoDataPtrAccess(BufferId),

    #[error("A data pointer access is already in progress on buffer {0:?}")]
    AccessInProgress(BufferId),
}
