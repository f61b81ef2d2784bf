//! Export settings

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::document::Strictness;
use crate::mesh::ExtractOptions;
use crate::util::{Error, Result};

/// Settings of one export run. Missing fields in a config file take their
/// default value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    // Selection
    pub export_selection: bool,

    // Geometry
    pub export_tangents: bool,
    pub remove_doubles: bool,
    pub max_bone_influences: usize,

    // Animation
    pub flush_trailing_keyframe: bool,

    // Document
    pub strictness: Strictness,
    pub compression_level: i32,  // -1 = off, 0-9 zlib level

    // Assets
    pub assets_path: PathBuf,
    pub copy_assets: bool,

    // Texture conversion
    pub textures_to_dds: bool,
    pub dds_writer: Option<PathBuf>,
    pub dds_batch_size: usize,
    pub dds_concurrency: usize,
    pub dds_multires: Option<String>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            export_selection: false,
            export_tangents: false,
            remove_doubles: true,
            max_bone_influences: 4,
            flush_trailing_keyframe: true,
            strictness: Strictness::Permissive,
            compression_level: -1,
            assets_path: PathBuf::from("."),
            copy_assets: true,
            textures_to_dds: false,
            dds_writer: None,
            dds_batch_size: 16,
            dds_concurrency: 1,
            dds_multires: None,
        }
    }
}

impl ExportConfig {
    /// Load settings from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::FileNotFound(path.to_path_buf()),
            _ => Error::Io(e),
        })?;
        let mut config: Self = serde_json::from_str(&text)?;

        // Zero workers or zero-sized batches would never finish
        config.dds_batch_size = config.dds_batch_size.max(1);
        config.dds_concurrency = config.dds_concurrency.max(1);
        if !(-1..=9).contains(&config.compression_level) {
            tracing::warn!(
                "compression level {} out of range, compression disabled",
                config.compression_level
            );
            config.compression_level = -1;
        }

        Ok(config)
    }

    /// Save settings to a JSON file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            export_tangents: self.export_tangents,
            remove_doubles: self.remove_doubles,
        }
    }

    /// Whether copied textures should be converted to DDS.
    pub fn converts_textures(&self) -> bool {
        self.textures_to_dds && self.copy_assets
    }
}
