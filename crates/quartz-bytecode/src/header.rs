//! Compiled-unit file header (16 bytes, little-endian).
//!
//! - 0-3: magic `QZBC`
//! - 4-7: format version
//! - 8-11: CRC32 of the payload
//! - 12-15: payload size in bytes

pub const MAGIC: [u8; 4] = *b"QZBC";
pub const VERSION: u32 = 1;
pub const HEADER_SIZE: usize = 16;

/// First [`HEADER_SIZE`] bytes of a compiled-unit file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    pub magic: [u8; 4],
    pub version: u32,
    /// CRC32 of everything after the header.
    pub checksum: u32,
    pub payload_size: u32,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            checksum: 0,
            payload_size: 0,
        }
    }
}

impl Header {
    /// Header for `payload`, with checksum and size filled in.
    pub fn for_payload(payload: &[u8]) -> Self {
        Self {
            checksum: crc32fast::hash(payload),
            payload_size: payload.len() as u32,
            ..Self::default()
        }
    }

    /// Decode from the first [`HEADER_SIZE`] bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        assert!(bytes.len() >= HEADER_SIZE, "header too short");

        Self {
            magic: [bytes[0], bytes[1], bytes[2], bytes[3]],
            version: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            checksum: u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
            payload_size: u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]),
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4..8].copy_from_slice(&self.version.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.checksum.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.payload_size.to_le_bytes());
        bytes
    }

    pub fn validate_magic(&self) -> bool {
        self.magic == MAGIC
    }

    pub fn validate_version(&self) -> bool {
        self.version == VERSION
    }
}
