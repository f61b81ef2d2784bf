//! Optional zlib compression of document bodies.
//!
//! The header flag records whether a body was compressed, so unlike a
//! sniffing decoder this one never has to guess.

use std::io::{Read, Write};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::util::{Error, Result};

/// Largest body the decoder is willing to inflate.
const MAX_INFLATED_SIZE: u64 = 4 * 1024 * 1024 * 1024;

/// Map a user level (-1..=9) onto the zlib level of the same number.
///
/// Returns `None` when compression is off; level 0 stores, so it is off too.
/// Levels above 9 are clamped.
pub fn level_for(level: i32) -> Option<Compression> {
    match level {
        i32::MIN..=0 => None,
        _ => Some(Compression::new(level.min(9) as u32)),
    }
}

/// Compress data using zlib.
///
/// Returns `None` if compression is disabled for `level` or does not save
/// space; the caller then stores the body as-is.
pub fn compress(data: &[u8], level: i32) -> Result<Option<Vec<u8>>> {
    let Some(compression) = level_for(level) else {
        return Ok(None);
    };
    if data.is_empty() {
        return Ok(None);
    }

    let mut encoder = ZlibEncoder::new(Vec::new(), compression);
    encoder.write_all(data)?;
    let compressed = encoder.finish()?;

    if compressed.len() >= data.len() {
        return Ok(None);
    }
    Ok(Some(compressed))
}

/// Inflate a body that was written compressed.
pub fn decompress(data: &[u8], expected_len: u64) -> Result<Vec<u8>> {
    if expected_len > MAX_INFLATED_SIZE {
        return Err(Error::invalid(format!(
            "inflated body of {} bytes exceeds limit",
            expected_len
        )));
    }

    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::with_capacity(expected_len as usize);
    decoder.read_to_end(&mut out)?;

    if out.len() as u64 != expected_len {
        return Err(Error::invalid(format!(
            "inflated body is {} bytes, header says {}",
            out.len(),
            expected_len
        )));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_decompress() {
        let original = b"vertex data vertex data vertex data ".repeat(100);

        let compressed = compress(&original, 6).unwrap().unwrap();
        assert!(compressed.len() < original.len());

        let inflated = decompress(&compressed, original.len() as u64).unwrap();
        assert_eq!(inflated, original);
    }

    #[test]
    fn test_no_compression_level_zero() {
        assert!(compress(b"Short data", 0).unwrap().is_none());
        assert!(compress(b"Short data", -1).unwrap().is_none());
    }

    #[test]
    fn test_every_level_is_honored() {
        assert!(level_for(-1).is_none());
        assert!(level_for(0).is_none());
        for level in 1..=9 {
            assert_eq!(level_for(level).unwrap().level(), level as u32);
        }
        assert_eq!(level_for(42).unwrap().level(), 9);
    }

    #[test]
    fn test_no_compression_if_larger() {
        assert!(compress(b"Hi", 9).unwrap().is_none());
    }

    #[test]
    fn test_length_mismatch_is_rejected() {
        let original = b"abcabcabcabcabcabcabcabcabcabc".repeat(10);
        let compressed = compress(&original, 9).unwrap().unwrap();
        assert!(decompress(&compressed, 7).is_err());
    }
}
