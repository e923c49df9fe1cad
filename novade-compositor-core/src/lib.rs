//! # Novade Compositor Core
//!
//! Geometry primitives used across the compositor's output path:
//! - [`Size`] and [`Rectangle`] in physical pixels.
//! - [`Region`]: a set of disjoint rectangles, used to accumulate damage between
//!   committed frames.

pub mod geometry;
pub mod region;

pub use geometry::{Rectangle, Size};
pub use region::Region;
