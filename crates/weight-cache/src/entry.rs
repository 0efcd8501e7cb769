//! On-disk framing of a cache entry.
//!
//! ```text
//! offset  size  field
//!      0     4  magic "RGCE"
//!      4     4  format version (u32 LE)
//!      8     8  payload length (u64 LE)
//!     16     4  CRC32 of payload (u32 LE)
//!     20     4  reserved, zero
//!     24     n  payload
//! ```
//!
//! The header is 24 bytes so a payload starting on a page boundary stays
//! 8-byte aligned.

use thiserror::Error;

pub const MAGIC: &[u8; 4] = b"RGCE";
pub const FORMAT_VERSION: u32 = 1;
pub const HEADER_LEN: usize = 24;

/// Why an entry failed to decode.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EntryError {
    #[error("invalid magic bytes")]
    InvalidMagic,

    #[error("unsupported entry version {0}")]
    UnsupportedVersion(u32),

    #[error("truncated entry: expected {expected} bytes, got {actual}")]
    InvalidSize { expected: usize, actual: usize },

    #[error("checksum mismatch: stored {stored:08x}, computed {computed:08x}")]
    ChecksumMismatch { stored: u32, computed: u32 },
}

/// Frame a payload for storage.
pub fn encode(payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    bytes.extend_from_slice(&crc32fast::hash(payload).to_le_bytes());
    bytes.extend_from_slice(&[0u8; 4]);
    bytes.extend_from_slice(payload);
    bytes
}

/// Check the framing and checksum, returning the payload.
pub fn decode(bytes: &[u8]) -> Result<&[u8], EntryError> {
    if bytes.len() < HEADER_LEN {
        return Err(EntryError::InvalidSize {
            expected: HEADER_LEN,
            actual: bytes.len(),
        });
    }
    if &bytes[0..4] != MAGIC {
        return Err(EntryError::InvalidMagic);
    }

    let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if version != FORMAT_VERSION {
        return Err(EntryError::UnsupportedVersion(version));
    }

    let mut len = [0u8; 8];
    len.copy_from_slice(&bytes[8..16]);
    let payload_len = u64::from_le_bytes(len) as usize;
    let expected = HEADER_LEN.saturating_add(payload_len);
    if bytes.len() != expected {
        return Err(EntryError::InvalidSize {
            expected,
            actual: bytes.len(),
        });
    }

    let stored = u32::from_le_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
    let payload = &bytes[HEADER_LEN..];
    let computed = crc32fast::hash(payload);
    if stored != computed {
        return Err(EntryError::ChecksumMismatch { stored, computed });
    }

    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() {
        let framed = encode(b"weights");
        assert_eq!(framed.len(), HEADER_LEN + 7);
        assert_eq!(decode(&framed).unwrap(), b"weights");
    }

    #[test]
    fn test_empty_payload() {
        let framed = encode(&[]);
        assert_eq!(decode(&framed).unwrap(), b"");
    }

    #[test]
    fn test_flipped_byte_detected() {
        let mut framed = encode(&[1, 2, 3, 4, 5]);
        framed[HEADER_LEN + 2] ^= 0xff;
        assert!(matches!(
            decode(&framed),
            Err(EntryError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_truncated() {
        let framed = encode(&[0u8; 64]);
        assert!(matches!(
            decode(&framed[..40]),
            Err(EntryError::InvalidSize { .. })
        ));
        assert!(matches!(decode(&framed[..10]), Err(EntryError::InvalidSize { .. })));
    }

    #[test]
    fn test_bad_magic_and_version() {
        let mut framed = encode(b"x");
        framed[0] = b'X';
        assert_eq!(decode(&framed), Err(EntryError::InvalidMagic));

        let mut framed = encode(b"x");
        framed[4] = 9;
        assert_eq!(decode(&framed), Err(EntryError::UnsupportedVersion(9)));
    }
}
