//! # scenepack
//!
//! Flattens a hierarchical 3D scene snapshot into a relocatable binary
//! document: typed entity collections plus one flat list of relations.
//!
//! A host application hands over a read-only [`Scene`] (geometry already
//! deformed and triangulated). The exporter walks it once, gives every
//! source entity a stable identity, splits meshes per material, bakes
//! actions into compressed keyframe clips, copies textures and sounds, and
//! writes everything in Y-up convention.
//!
//! ## Modules
//!
//! - [`util`] - Errors and the Z-up to Y-up re-basing
//! - [`core`] - Identity registry and compression
//! - [`scene`] - Scene snapshot, pose evaluation, host collaborator traits
//! - [`document`] - Output entities and the append-only builder
//! - [`mesh`] - Material split, vertex dedup, tangents, skinning
//! - [`animation`] - Keyframe sampling with run-length compression
//! - [`export`] - Export orchestration, assets, texture conversion
//! - [`format`] - Binary document encoding and decoding
//!
//! ## Example
//!
//! ```ignore
//! use scenepack::{export_scene, format, ExportConfig, Scene};
//!
//! let scene = Scene::from_json_file("scene.json")?;
//! let outcome = export_scene(&scene, &ExportConfig::default())?;
//! format::write_document("scene.spak", &outcome.document, -1)?;
//! ```

pub mod util;
pub mod core;
pub mod scene;
pub mod document;
pub mod mesh;
pub mod animation;
pub mod export;
pub mod format;

// Re-export commonly used types
pub use util::{Error, Result};
pub use core::{IdentityRegistry, SourceKey};
pub use document::{Document, DocumentBuilder, Strictness};
pub use export::{export_scene, ExportConfig, ExportOutcome, ExportReport, Exporter};
pub use scene::Scene;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::document::*;
    pub use crate::export::{export_scene, ExportConfig, ExportOutcome, Exporter};
    pub use crate::scene::{AssetLocator, FrameContext, MaterialResolver, Scene};
    pub use crate::util::{Error, Result};
    pub use crate::core::{EntityClass, IdentityRegistry, SourceKey};
}
