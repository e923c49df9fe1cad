//! Small helpers shared by the core modules.

pub mod fs;
