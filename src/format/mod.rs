//! Binary document format.
//!
//! ```text
//! offset  size  field
//! 0       4     magic "SPAK"
//! 4       2     version (u16, currently 1)
//! 6       1     flags (bit 0: body is zlib compressed)
//! 7       1     reserved
//! 8       8     uncompressed body length (u64)
//! 16      ..    body
//! ```
//!
//! The body is a sequence of sections `tag: u8, count: u32, records...` in
//! a fixed order. Record layouts live in [`record`].

pub mod constants;
pub mod reader;
pub mod record;
pub mod writer;

pub use reader::{decode, decode_body, parse_header, read_document, read_header, Header};
pub use writer::{encode, encode_body, write_document};
