//! Document file layout constants.

/// Magic bytes at the start of a document file.
pub const MAGIC: &[u8; 4] = b"SPAK";

/// Current format version.
pub const CURRENT_VERSION: u16 = 1;

/// Size of the file header in bytes: magic, version, flags, reserved, body length.
pub const HEADER_SIZE: usize = 16;

/// Offset of the version in the header.
pub const VERSION_OFFSET: usize = 4;

/// Offset of the flags byte in the header.
pub const FLAGS_OFFSET: usize = 6;

/// Offset of the (uncompressed) body length in the header.
pub const BODY_LEN_OFFSET: usize = 8;

/// Flag bit: the body is zlib compressed.
pub const FLAG_COMPRESSED: u8 = 0x01;

/// Section tags, in the order the encoder writes them.
pub mod section {
    pub const OBJECTS: u8 = 1;
    pub const MESHES: u8 = 2;
    pub const MATERIALS: u8 = 3;
    pub const LIGHTS: u8 = 4;
    pub const SKELETONS: u8 = 5;
    pub const ANIMATIONS: u8 = 6;
    pub const RIGID_BODIES: u8 = 7;
    pub const CONSTRAINTS: u8 = 8;
    pub const SPEAKERS: u8 = 9;
    pub const CUSTOM_PARAMS: u8 = 10;
    pub const FORCE_FIELDS: u8 = 11;
    pub const COLLISION_PLANES: u8 = 12;
    pub const RELATIONS: u8 = 13;
}
