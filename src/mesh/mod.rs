//! Mesh extraction: one draw-ready mesh per material index.
//!
//! - [`capabilities`] - which optional vertex channels a mesh carries
//! - [`extract`](mod@extract) - material split, vertex dedup, array assembly
//! - [`skin`] - vertex groups to bone influences
//! - [`tangent`] - per-vertex tangent generation

pub mod capabilities;
pub mod extract;
pub mod skin;
pub mod tangent;

pub use capabilities::Capabilities;
pub use extract::{extract, ExtractOptions, MeshPart};
pub use skin::{Influences, SkinBinding};
pub use tangent::compute_tangents;
