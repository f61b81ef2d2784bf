//! Source side of an export: the scene snapshot and its evaluation.
//!
//! - [`snapshot`] - serde model of the host scene
//! - [`pose`] - explicit frame evaluation ([`FrameContext`])
//! - [`resolver`] - material and asset seams towards the host

pub mod pose;
pub mod resolver;
pub mod snapshot;

pub use pose::{transform_key, FrameContext, FramePose, SampleTarget};
pub use resolver::{
    AssetLocator, AssetPayload, LocatedAsset, MaterialResolver, ResolvedMaterial,
    SnapshotAssetLocator, SnapshotMaterialResolver,
};
pub use snapshot::*;
