//! # NovaDE Core Library (`novade-core`)
//!
//! Foundational services shared by the NovaDE output rendering crates.
//!
//! - **Error Handling**: [`CoreError`] and the more specific [`ConfigError`] and
//!   [`LoggingError`].
//! - **Configuration Management**: TOML configuration loaded through
//!   [`config::ConfigLoader`] into [`config::CoreConfig`]. Other crates embed their
//!   own sections next to `[logging]` and reuse the loader's helpers.
//! - **Logging**: a `tracing` based setup with console and optional rolling file
//!   output, see [`logging`].
//!
//! ```rust,ignore
//! use novade_core::config::ConfigLoader;
//! use novade_core::logging::init_logging;
//!
//! fn main() -> Result<(), novade_core::CoreError> {
//!     let config = ConfigLoader::load_from_path("/etc/novade/render.toml")?;
//!     init_logging(&config.logging, false)?;
//!     tracing::info!("NovaDE core initialized");
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod utils;

pub use error::{ConfigError, CoreError, LoggingError};
