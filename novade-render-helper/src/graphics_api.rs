//! Identification of the graphics API the scene graph renders with.
//!
//! The process-wide value is resolved once, on first use, and stays fixed for
//! the lifetime of the process. Components take it by value afterwards.

use once_cell::sync::OnceCell;
use serde::Deserialize;
use std::fmt;
use tracing::{debug, info, warn};

/// Environment variable overriding the detected graphics API.
pub const GRAPHICS_API_ENV: &str = "NOVADE_GRAPHICS_API";

/// Graphics APIs a scene-graph render control can report.
///
/// Only [`GraphicsApi::OpenGl`], [`GraphicsApi::Vulkan`] and
/// [`GraphicsApi::Software`] have a matching renderer in the compositor; the
/// others exist so that a mismatching render control can be named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphicsApi {
    #[serde(rename = "opengl")]
    OpenGl,
    Vulkan,
    Software,
    Direct3D11,
    Metal,
    Null,
}

impl GraphicsApi {
    /// Whether rendering goes through the hardware interface layer (RHI),
    /// which needs its own render target objects on top of native handles.
    pub fn is_rhi_based(self) -> bool {
        matches!(
            self,
            GraphicsApi::OpenGl | GraphicsApi::Vulkan | GraphicsApi::Direct3D11 | GraphicsApi::Metal
        )
    }

    /// Parses the names accepted in configuration and the environment.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "opengl" | "gl" | "gles" | "gles2" => Some(GraphicsApi::OpenGl),
            "vulkan" | "vk" => Some(GraphicsApi::Vulkan),
            "software" | "pixman" => Some(GraphicsApi::Software),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            GraphicsApi::OpenGl => "opengl",
            GraphicsApi::Vulkan => "vulkan",
            GraphicsApi::Software => "software",
            GraphicsApi::Direct3D11 => "direct3d11",
            GraphicsApi::Metal => "metal",
            GraphicsApi::Null => "null",
        }
    }
}

impl fmt::Display for GraphicsApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

static PROCESS_GRAPHICS_API: OnceCell<GraphicsApi> = OnceCell::new();

/// Fixes the process-wide graphics API.
///
/// The first caller wins. Returns the value in effect, which differs from
/// `api` if it had already been resolved.
pub fn init_graphics_api(api: GraphicsApi) -> GraphicsApi {
    let effective = *PROCESS_GRAPHICS_API.get_or_init(|| {
        info!(%api, "Graphics API selected");
        api
    });
    if effective != api {
        warn!(requested = %api, %effective, "Graphics API already initialized; keeping existing value");
    }
    effective
}

/// The process-wide graphics API, detected on first use.
///
/// Detection honours [`GRAPHICS_API_ENV`] and falls back to OpenGL.
pub fn graphics_api() -> GraphicsApi {
    *PROCESS_GRAPHICS_API.get_or_init(|| {
        let api = detect_from_env(std::env::var(GRAPHICS_API_ENV).ok().as_deref());
        info!(%api, "Graphics API detected");
        api
    })
}

fn detect_from_env(value: Option<&str>) -> GraphicsApi {
    match value {
        Some(name) => GraphicsApi::from_name(name).unwrap_or_else(|| {
            warn!(value = name, "Unknown {} value, using OpenGL", GRAPHICS_API_ENV);
            GraphicsApi::OpenGl
        }),
        None => {
            debug!("No graphics API override, using OpenGL");
            GraphicsApi::OpenGl
        }
    }
}
