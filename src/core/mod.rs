//! Core run-wide services.
//!
//! - [`identity`] - Stable identities and dirty tracking ([`IdentityRegistry`])
//! - [`compression`] - zlib compression of document bodies

pub mod compression;
pub mod identity;

pub use identity::{is_well_formed, EntityClass, IdentityRegistry, SourceKey};
