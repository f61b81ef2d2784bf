//! Writing texture and audio payloads next to the document.

use std::path::{Path, PathBuf};

use crate::scene::{AssetPayload, LocatedAsset};
use crate::util::{Error, Result};

/// Places located assets under an output root, keeping their relative path.
#[derive(Debug, Clone)]
pub struct AssetWriter {
    root: PathBuf,
    enabled: bool,
}

impl AssetWriter {
    /// With `enabled == false` nothing is written; destinations are still computed.
    pub fn new(root: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            root: root.into(),
            enabled,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Output location of `rpath`.
    pub fn destination(&self, rpath: &str) -> PathBuf {
        self.root.join(rpath)
    }

    /// Extract packed bytes or copy the source file to its destination.
    ///
    /// Returns the written path, or `None` when writing is disabled. Any I/O
    /// failure is reported as [`Error::Asset`] carrying `id`.
    pub fn write(&self, id: &str, asset: &LocatedAsset) -> Result<Option<PathBuf>> {
        if !self.enabled {
            return Ok(None);
        }
        let dest = self.destination(&asset.rpath);
        let fail = |path: &Path, source: std::io::Error| Error::Asset {
            id: id.to_string(),
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| fail(parent, e))?;
        }

        match &asset.payload {
            AssetPayload::Packed(bytes) => {
                tracing::debug!("extract packed asset '{}' to {:?}", id, dest);
                std::fs::write(&dest, bytes).map_err(|e| fail(&dest, e))?;
            }
            AssetPayload::File(src) => {
                if same_file(src, &dest) {
                    tracing::debug!("asset '{}' already in place at {:?}", id, dest);
                } else {
                    tracing::debug!("copy asset '{}' from {:?} to {:?}", id, src, dest);
                    std::fs::copy(src, &dest).map_err(|e| fail(src, e))?;
                }
            }
        }
        Ok(Some(dest))
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
