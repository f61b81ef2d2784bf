//! Utility types and functions for scenepack.
//!
//! This module contains fundamental types used throughout the library:
//! - [`Error`] / [`Result`] - Error handling
//! - Math type re-exports from glam plus the Z-up to Y-up re-basing

mod error;
mod math;

pub use error::*;
pub use math::*;
