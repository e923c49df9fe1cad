//! Error types for render target construction, texture export and output
//! commits.

use crate::graphics_api::GraphicsApi;
use crate::renderer::RendererKind;
use novade_buffer_manager::{BufferError, BufferId};
use thiserror::Error;
use tracing::error;

/// A native render target or one of its auxiliary resources could not be
/// built. The caller skips compositing for this frame.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConstructionError {
    #[error("Working size is empty")]
    EmptySize,

    #[error("Buffer {0:?} has already been destroyed")]
    BufferDestroyed(BufferId),

    #[error("Renderer failed to import buffer {buffer:?}: {reason}")]
    ImportFailed { buffer: BufferId, reason: String },

    #[error("Render control does not expose an RHI for {0:?}")]
    MissingRhi(GraphicsApi),

    #[error("Failed to create {resource}: {reason}")]
    ResourceCreationFailed { resource: &'static str, reason: String },

    #[error("Native texture does not match the {expected:?} renderer")]
    NativeMismatch { expected: RendererKind },

    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),
}

/// A rendered texture could not be turned into a display buffer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExportError {
    #[error("Required EGL entry point {0} is unavailable")]
    MissingEntryPoint(&'static str),

    #[error("Renderer exposes no EGL display")]
    NoEglDisplay,

    #[error("Failed to create an EGL image from texture {0}")]
    ImageCreationFailed(u32),

    #[error("DMA-BUF export query failed")]
    QueryFailed,

    #[error("DMA-BUF export failed")]
    ExportFailed,

    #[error("Texture export is not implemented for {0:?}")]
    Unimplemented(GraphicsApi),

    #[error("Texture did not produce an image")]
    EmptyImage,

    #[error("Texture has no native {0:?} object")]
    WrongTextureObject(GraphicsApi),

    #[error("Unsupported export format: {0}")]
    UnsupportedFormat(String),

    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),
}

/// The graphics backend and the objects handed to it do not belong together.
///
/// Always a build or deployment error, never a transient condition; see
/// [`fatal_configuration_mismatch`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationMismatch {
    #[error("No render target adapter for graphics API {0:?}")]
    NoAdapter(GraphicsApi),

    #[error("No renderer available for graphics API {0:?}")]
    NoRenderer(GraphicsApi),

    #[error("Graphics API {api:?} requires a {expected:?} renderer, got {actual:?}")]
    RendererKind {
        api: GraphicsApi,
        expected: RendererKind,
        actual: RendererKind,
    },

    #[error("Texture cannot be converted to an image under {0:?}")]
    TextureSubtype(GraphicsApi),
}

/// Errors reported by the output helper.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OutputHelperError {
    #[error("Output {output} has no rendered buffer to commit")]
    NothingToCommit { output: String },

    #[error("Output {output} rejected the committed buffer")]
    CommitRejected { output: String },
}

/// Terminates on a configuration mismatch.
///
/// Release builds abort on panic, so this ends the process.
#[track_caller]
pub fn fatal_configuration_mismatch(mismatch: ConfigurationMismatch) -> ! {
    error!(error = %mismatch, "Fatal graphics configuration mismatch");
    panic!("graphics configuration mismatch: {mismatch}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_errors_convert_into_construction_errors() {
        let err: ConstructionError = BufferError::MissingPlanes.into();
        assert!(matches!(err, ConstructionError::Buffer(BufferError::MissingPlanes)));
    }

    #[test]
    fn mismatch_messages_name_both_kinds() {
        let err = ConfigurationMismatch::RendererKind {
            api: GraphicsApi::Vulkan,
            expected: RendererKind::Vulkan,
            actual: RendererKind::Gles2,
        };
        let message = err.to_string();
        assert!(message.contains("Vulkan"));
        assert!(message.contains("Gles2"));
    }

    #[test]
    #[should_panic(expected = "graphics configuration mismatch")]
    fn fatal_mismatch_panics() {
        fatal_configuration_mismatch(ConfigurationMismatch::TextureSubtype(GraphicsApi::Software));
    }
}
