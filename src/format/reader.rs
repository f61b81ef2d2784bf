//! Document decoding and file input.

use std::borrow::Cow;
use std::fs::File;
use std::io::Cursor;
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};

use super::constants::*;
use super::record::BodyReader;
use crate::core::compression;
use crate::document::Document;
use crate::util::{Error, Result};

/// Parsed file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u16,
    pub flags: u8,
    /// Length of the uncompressed body.
    pub body_len: u64,
}

impl Header {
    pub fn is_compressed(&self) -> bool {
        self.flags & FLAG_COMPRESSED != 0
    }
}

/// Parse and validate the file header.
pub fn parse_header(data: &[u8]) -> Result<Header> {
    if data.len() < HEADER_SIZE {
        return Err(Error::UnexpectedEof(data.len() as u64));
    }
    if &data[..MAGIC.len()] != MAGIC {
        return Err(Error::InvalidMagic);
    }

    let mut cursor = Cursor::new(&data[VERSION_OFFSET..HEADER_SIZE]);
    let version = cursor.read_u16::<LittleEndian>()?;
    if version != CURRENT_VERSION {
        return Err(Error::UnsupportedVersion(version));
    }
    let flags = cursor.read_u8()?;
    let _reserved = cursor.read_u8()?;
    let body_len = cursor.read_u64::<LittleEndian>()?;

    Ok(Header {
        version,
        flags,
        body_len,
    })
}

/// Decode a complete document file.
pub fn decode(data: &[u8]) -> Result<Document> {
    let header = parse_header(data)?;
    let payload = &data[HEADER_SIZE..];

    let body: Cow<'_, [u8]> = if header.is_compressed() {
        Cow::Owned(compression::decompress(payload, header.body_len)?)
    } else {
        if payload.len() as u64 != header.body_len {
            return Err(Error::invalid(format!(
                "body is {} bytes, header says {}",
                payload.len(),
                header.body_len
            )));
        }
        Cow::Borrowed(payload)
    };

    decode_body(&body)
}

/// Decode a body produced by [`encode_body`](super::encode_body).
pub fn decode_body(body: &[u8]) -> Result<Document> {
    let mut doc = Document::default();
    let mut r = BodyReader::new(body);
    let mut seen = 0u32;

    while !r.is_empty() {
        let tag = r.u8()?;
        if !(section::OBJECTS..=section::RELATIONS).contains(&tag) {
            return Err(Error::invalid(format!(
                "unknown section tag {} at offset {}",
                tag,
                r.position() - 1
            )));
        }
        let bit = 1u32 << tag;
        if seen & bit != 0 {
            return Err(Error::invalid(format!("section {} appears twice", tag)));
        }
        seen |= bit;

        match tag {
            section::OBJECTS => doc.objects = r.seq()?,
            section::MESHES => doc.meshes = r.seq()?,
            section::MATERIALS => doc.materials = r.seq()?,
            section::LIGHTS => doc.lights = r.seq()?,
            section::SKELETONS => doc.skeletons = r.seq()?,
            section::ANIMATIONS => doc.animations = r.seq()?,
            section::RIGID_BODIES => doc.rigid_bodies = r.seq()?,
            section::CONSTRAINTS => doc.constraints = r.seq()?,
            section::SPEAKERS => doc.speakers = r.seq()?,
            section::CUSTOM_PARAMS => doc.custom_params = r.seq()?,
            section::FORCE_FIELDS => doc.force_fields = r.seq()?,
            section::COLLISION_PLANES => doc.collision_planes = r.seq()?,
            _ => doc.relations = r.seq()?,
        }
    }
    Ok(doc)
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::FileNotFound(path.to_path_buf())
        } else {
            Error::Io(e)
        }
    })
}

/// Read and decode a document file, memory-mapping it.
#[cfg(feature = "mmap")]
pub fn read_document(path: impl AsRef<Path>) -> Result<Document> {
    let path = path.as_ref();
    let file = open(path)?;
    let size = file.metadata()?.len();
    if size < HEADER_SIZE as u64 {
        return Err(Error::UnexpectedEof(size));
    }
    // Safety: the file is opened read-only and the map is dropped before returning.
    let mmap = unsafe { memmap2::Mmap::map(&file) }.map_err(|e| Error::MmapFailed(e.to_string()))?;
    tracing::debug!("mapped {} ({} bytes)", path.display(), size);
    decode(&mmap)
}

/// Read and decode a document file.
#[cfg(not(feature = "mmap"))]
pub fn read_document(path: impl AsRef<Path>) -> Result<Document> {
    use std::io::Read;

    let path = path.as_ref();
    let mut file = open(path)?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;
    decode(&data)
}

/// Read only the header of a document file.
pub fn read_header(path: impl AsRef<Path>) -> Result<Header> {
    use std::io::Read;

    let path = path.as_ref();
    let mut file = open(path)?;
    let mut buf = [0u8; HEADER_SIZE];
    file.read_exact(&mut buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::UnexpectedEof(0)
        } else {
            Error::Io(e)
        }
    })?;
    parse_header(&buf)
}
