//! Error types for the scenepack library.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for scenepack operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Two distinct source entities resolved to the same identity string.
    #[error("Identity collision: '{id}' claimed by {first} and {second}")]
    IdentityCollision {
        id: String,
        first: String,
        second: String,
    },

    /// An entity with this id is already part of the document.
    #[error("Duplicate entity id: {0}")]
    DuplicateEntity(String),

    /// Relation references an id that no entity carries.
    #[error("Dangling relation: '{ref1}' -> '{ref2}'")]
    DanglingRelation { ref1: String, ref2: String },

    /// Identity string is empty or contains whitespace/control characters.
    #[error("Malformed identity: {0:?}")]
    MalformedIdentity(String),

    /// Source configuration the exporter cannot express.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Copying or extracting an asset payload failed.
    #[error("Asset '{id}' at {path:?}: {source}")]
    Asset {
        id: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Invalid magic bytes at start of file
    #[error("Invalid document: expected SPAK magic bytes")]
    InvalidMagic,

    /// Unsupported document format version
    #[error("Unsupported document version: {0}")]
    UnsupportedVersion(u16),

    /// Document is truncated or corrupted
    #[error("Unexpected end of data at position {0}")]
    UnexpectedEof(u64),

    /// Invalid data structure in document or scene
    #[error("Invalid structure: {0}")]
    InvalidStructure(String),

    /// Memory mapping failed
    #[error("Memory mapping failed: {0}")]
    MmapFailed(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (scene snapshot or config) error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// UTF-8 conversion error
    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an invalid structure error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidStructure(msg.into())
    }

    /// Create an unsupported-configuration error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Whether this error must abort the whole export run.
    ///
    /// Everything else is reported per entity and the run continues.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::IdentityCollision { .. }
                | Self::DuplicateEntity(_)
                | Self::DanglingRelation { .. }
                | Self::MalformedIdentity(_)
        )
    }
}

/// Result type alias for scenepack operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::InvalidMagic;
        assert!(e.to_string().contains("magic"));

        let e = Error::IdentityCollision {
            id: "me3_0".into(),
            first: "mesh#3".into(),
            second: "mesh#30".into(),
        };
        assert!(e.to_string().contains("me3_0"));
        assert!(e.to_string().contains("mesh#30"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_fatal_classification() {
        assert!(Error::DuplicateEntity("ob1".into()).is_fatal());
        assert!(!Error::unsupported("action root 'SHAPEKEY'").is_fatal());
        assert!(!Error::other("x").is_fatal());
    }
}
