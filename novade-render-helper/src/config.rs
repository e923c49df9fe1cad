//! `[render]` configuration section and the compositor configuration document
//! that embeds it next to the core `[logging]` section.

use crate::graphics_api::{self, GraphicsApi};
use novade_core::config::{ConfigLoader, LoggingConfig};
use novade_core::error::{ConfigError, CoreError};
use serde::Deserialize;
use std::path::Path;

fn default_sample_count() -> u32 {
    1
}

fn default_device_pixel_ratio() -> f64 {
    1.0
}

/// Settings for render target construction.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenderHelperConfig {
    /// Overrides the detected graphics API. One of "opengl", "vulkan",
    /// "software".
    #[serde(default)]
    pub graphics_api: Option<GraphicsApi>,
    /// Multisample count for RHI render targets and their depth/stencil
    /// attachment.
    #[serde(default = "default_sample_count")]
    pub sample_count: u32,
    /// Device pixel ratio stamped into every render target.
    #[serde(default = "default_device_pixel_ratio")]
    pub device_pixel_ratio: f64,
}

impl Default for RenderHelperConfig {
    fn default() -> Self {
        Self {
            graphics_api: None,
            sample_count: default_sample_count(),
            device_pixel_ratio: default_device_pixel_ratio(),
        }
    }
}

impl RenderHelperConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        if let Some(api) = self.graphics_api {
            if !matches!(api, GraphicsApi::OpenGl | GraphicsApi::Vulkan | GraphicsApi::Software) {
                return Err(validation_error(format!(
                    "Invalid graphics_api: '{}'. Must be one of opengl, vulkan, software.",
                    api
                )));
            }
        }
        if !matches!(self.sample_count, 1 | 2 | 4 | 8) {
            return Err(validation_error(format!(
                "Invalid sample_count: {}. Must be 1, 2, 4 or 8.",
                self.sample_count
            )));
        }
        if !(self.device_pixel_ratio.is_finite() && self.device_pixel_ratio > 0.0) {
            return Err(validation_error(format!(
                "Invalid device_pixel_ratio: {}. Must be a positive number.",
                self.device_pixel_ratio
            )));
        }
        Ok(())
    }

    /// Resolves the process-wide graphics API, applying the configured
    /// override if the value has not been fixed yet.
    pub fn resolve_graphics_api(&self) -> GraphicsApi {
        match self.graphics_api {
            Some(api) => graphics_api::init_graphics_api(api),
            None => graphics_api::graphics_api(),
        }
    }
}

fn validation_error(message: String) -> CoreError {
    CoreError::Config(ConfigError::ValidationError(message))
}

/// Root configuration document of the compositor.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompositorConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub render: RenderHelperConfig,
}

impl CompositorConfig {
    /// Loads and validates the document at `path`. A missing file yields
    /// the defaults.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let mut config: Self = ConfigLoader::load_document(path)?;
        ConfigLoader::validate_logging(&mut config.logging, path.parent())?;
        config.render.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, CoreError> {
        let mut config: Self = ConfigLoader::parse_document(content)?;
        ConfigLoader::validate_logging(&mut config.logging, None)?;
        config.render.validate()?;
        Ok(config)
    }
}
