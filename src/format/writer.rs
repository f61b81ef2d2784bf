//! Document encoding and file output.

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};

use super::constants::*;
use super::record::BodyWriter;
use crate::core::compression;
use crate::document::Document;
use crate::util::Result;

/// Encode the document body: every section in fixed order, empty ones included.
pub fn encode_body(doc: &Document) -> Result<Vec<u8>> {
    let mut w = BodyWriter::new();

    macro_rules! section {
        ($tag:expr, $items:expr) => {
            w.u8($tag)?;
            w.seq(&$items)?;
        };
    }

    section!(section::OBJECTS, doc.objects);
    section!(section::MESHES, doc.meshes);
    section!(section::MATERIALS, doc.materials);
    section!(section::LIGHTS, doc.lights);
    section!(section::SKELETONS, doc.skeletons);
    section!(section::ANIMATIONS, doc.animations);
    section!(section::RIGID_BODIES, doc.rigid_bodies);
    section!(section::CONSTRAINTS, doc.constraints);
    section!(section::SPEAKERS, doc.speakers);
    section!(section::CUSTOM_PARAMS, doc.custom_params);
    section!(section::FORCE_FIELDS, doc.force_fields);
    section!(section::COLLISION_PLANES, doc.collision_planes);
    section!(section::RELATIONS, doc.relations);

    Ok(w.into_inner())
}

/// Encode a complete document file (header + body).
///
/// Pure: identical documents encode to identical bytes. `level` follows
/// [`compression::level_for`]; a body that does not shrink is stored as-is.
pub fn encode(doc: &Document, level: i32) -> Result<Vec<u8>> {
    let body = encode_body(doc)?;
    let compressed = compression::compress(&body, level)?;

    let flags = if compressed.is_some() { FLAG_COMPRESSED } else { 0 };
    let payload = compressed.as_deref().unwrap_or(&body);

    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
    out.extend_from_slice(MAGIC);
    out.write_u16::<LittleEndian>(CURRENT_VERSION)?;
    out.write_u8(flags)?;
    out.write_u8(0)?;
    out.write_u64::<LittleEndian>(body.len() as u64)?;
    out.extend_from_slice(payload);
    Ok(out)
}

/// Encode and write a document file. Returns the number of bytes written.
pub fn write_document(path: impl AsRef<Path>, doc: &Document, level: i32) -> Result<u64> {
    let path = path.as_ref();
    let bytes = encode(doc, level)?;

    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    let mut writer = BufWriter::with_capacity(2 * 1024 * 1024, file);
    writer.write_all(&bytes)?;
    writer.flush()?;

    tracing::info!(
        "wrote {} ({} bytes, {} entities, {} relations)",
        path.display(),
        bytes.len(),
        doc.entity_count(),
        doc.relations.len()
    );
    Ok(bytes.len() as u64)
}
