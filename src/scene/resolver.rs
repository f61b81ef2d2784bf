//! Seams towards the host: material resolution and asset lookup.

use std::path::{Path, PathBuf};

use super::snapshot::{ImageData, MaterialData, ResolvedProperty, SoundData};
use crate::util::{Error, Result};

/// Exportable view of a source material.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMaterial {
    /// Shading model path; empty when no exportable material was found.
    pub mat_id: String,
    pub properties: Vec<ResolvedProperty>,
}

/// Turns a source material into a flat property list.
///
/// Node-graph evaluation belongs to the implementor; the exporter only sees
/// the result.
pub trait MaterialResolver: Send + Sync {
    fn resolve(&self, material: &MaterialData) -> Result<ResolvedMaterial>;
}

/// Resolver for snapshots that already carry resolved properties.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotMaterialResolver;

impl MaterialResolver for SnapshotMaterialResolver {
    fn resolve(&self, material: &MaterialData) -> Result<ResolvedMaterial> {
        Ok(ResolvedMaterial {
            mat_id: material.mat_id.clone().unwrap_or_default(),
            properties: material.properties.clone(),
        })
    }
}

/// Where an asset's bytes come from.
#[derive(Debug, Clone, PartialEq)]
pub enum AssetPayload {
    /// Bytes embedded in the host file.
    Packed(Vec<u8>),
    /// File on disk.
    File(PathBuf),
}

/// An asset located on the host side, with its output-relative path.
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedAsset {
    /// `Textures/<name>.<ext>` or `Sounds/<name>.<ext>`.
    pub rpath: String,
    /// Lower-case extension without the dot; may be empty.
    pub extension: String,
    pub payload: AssetPayload,
}

pub trait AssetLocator: Send + Sync {
    fn locate_image(&self, image: &ImageData) -> Result<LocatedAsset>;
    fn locate_sound(&self, sound: &SoundData) -> Result<LocatedAsset>;
}

/// Locator that reads packed bytes and file paths straight from the snapshot.
///
/// Relative file paths are resolved against `base_dir`.
#[derive(Debug, Clone, Default)]
pub struct SnapshotAssetLocator {
    pub base_dir: PathBuf,
}

impl SnapshotAssetLocator {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn payload(&self, name: &str, packed: &Option<Vec<u8>>, filepath: &Option<PathBuf>) -> Result<AssetPayload> {
        if let Some(bytes) = packed {
            return Ok(AssetPayload::Packed(bytes.clone()));
        }
        match filepath {
            Some(path) if path.is_absolute() => Ok(AssetPayload::File(path.clone())),
            Some(path) => Ok(AssetPayload::File(self.base_dir.join(path))),
            None => Err(Error::invalid(format!("asset '{}' has neither data nor path", name))),
        }
    }
}

impl AssetLocator for SnapshotAssetLocator {
    fn locate_image(&self, image: &ImageData) -> Result<LocatedAsset> {
        let extension = image
            .file_format
            .as_deref()
            .filter(|f| !f.is_empty())
            .map(str::to_ascii_lowercase)
            .or_else(|| image.filepath.as_deref().and_then(path_extension))
            .or_else(|| path_extension(Path::new(&image.name)))
            .map(|e| normalize_image_extension(&e).to_string())
            .unwrap_or_default();
        Ok(LocatedAsset {
            rpath: relative_path("Textures", &image.name, &extension),
            payload: self.payload(&image.name, &image.packed, &image.filepath)?,
            extension,
        })
    }

    fn locate_sound(&self, sound: &SoundData) -> Result<LocatedAsset> {
        let extension = sound
            .filepath
            .as_deref()
            .and_then(path_extension)
            .or_else(|| path_extension(Path::new(&sound.name)))
            .unwrap_or_default();
        Ok(LocatedAsset {
            rpath: relative_path("Sounds", &sound.name, &extension),
            payload: self.payload(&sound.name, &sound.packed, &sound.filepath)?,
            extension,
        })
    }
}

fn path_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(str::to_ascii_lowercase)
}

/// Map host format names to conventional file extensions.
pub fn normalize_image_extension(ext: &str) -> &str {
    match ext {
        "targa" | "targa_raw" => "tga",
        "jpeg" => "jpg",
        other => other,
    }
}

/// `<folder>/<name>.<ext>`, with path separators in `name` replaced and a
/// trailing `.<ext>` on the name not repeated.
pub fn relative_path(folder: &str, name: &str, extension: &str) -> String {
    let mut base: String = name
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect();
    if !extension.is_empty() {
        let suffix = format!(".{}", extension);
        if base.to_ascii_lowercase().ends_with(&suffix) {
            base.truncate(base.len() - suffix.len());
        }
        format!("{}/{}{}", folder, base, suffix)
    } else {
        format!("{}/{}", folder, base)
    }
}
