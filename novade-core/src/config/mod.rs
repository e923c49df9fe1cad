//! Configuration Management for NovaDE Core.
//!
//! - [`types`]: the schema ([`CoreConfig`], [`LoggingConfig`]).
//! - [`defaults`]: default values used by `serde` when a field is missing.
//! - [`loader`]: [`ConfigLoader`], which reads TOML documents, falls back to
//!   defaults when the file does not exist, and validates the result.
//!
//! Crates that need their own section (for example `[render]`) define a root
//! document type that embeds [`LoggingConfig`] and load it through
//! [`ConfigLoader::load_document`], then call
//! [`ConfigLoader::validate_logging`] on the embedded section.

pub mod defaults;
pub mod loader;
pub mod types;

pub use loader::ConfigLoader;
pub use types::{CoreConfig, LoggingConfig};
