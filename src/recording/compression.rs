//! Chunk body encoding
//!
//! Chunk bodies are stored either raw or LZ4 compressed with a prepended
//! size. Either way the stored bytes carry a CRC32 in the chunk header.

use crate::recording::error::{RecordingError, RecordingResult};
use crate::recording::format::{ChunkHeader, FEATURE_LZ4};

/// Checksum over stored body bytes
pub fn body_checksum(stored: &[u8]) -> u32 {
    crc32fast::hash(stored)
}

/// Encode a raw body for storage, returning the stored bytes and feature bits
pub fn encode_body(raw: &[u8], compress: bool) -> (Vec<u8>, u32) {
    if compress {
        (lz4_flex::compress_prepend_size(raw), FEATURE_LZ4)
    } else {
        (raw.to_vec(), 0)
    }
}

/// Verify and decode the stored body of a chunk
pub fn decode_body(header: &ChunkHeader, stored: &[u8]) -> RecordingResult<Vec<u8>> {
    let actual = body_checksum(stored);
    if actual != header.body_checksum {
        return Err(RecordingError::malformed(format!(
            "Checksum mismatch: expected {:08x}, got {:08x}",
            header.body_checksum, actual
        )));
    }

    if header.is_compressed() {
        lz4_flex::decompress_size_prepended(stored).map_err(|e| {
            RecordingError::malformed(format!("LZ4 decompression failed: {}", e))
        })
    } else {
        Ok(stored.to_vec())
    }
}
