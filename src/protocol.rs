//! Utilities for working with v0/v1 message frames.
//!
//! # Message Frame Layout
//!
//! ```text
//! Offset  Size  Field
//! 0       8     offset
//! 8       4     message_size
//! 12      4     crc
//! 16      1     magic
//! 17      1     attributes
//! 18      8     timestamp (magic 1 only)
//! ..      4+n   key (nullable bytes)
//! ..      4+n   value (nullable bytes)
//! ```
//!
//! The CRC covers every byte after the CRC field up to the end of the frame.

use bytes::{BufMut, BytesMut};

use crate::constants::{
    FRAME_CRC_SIZE, FRAME_HEADER_SIZE, FRAME_OFFSET_SIZE, MAGIC_V0, MAGIC_V1,
};

// CRC-32 (IEEE 802.3) polynomial, reflected, as used by v0/v1 messages
const CRC32_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;
        while j < 8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xEDB88320;
            } else {
                crc >>= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

/// Compute a CRC-32 checksum (IEEE polynomial).
pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = !0u32;
    for &byte in data {
        let index = ((crc ^ byte as u32) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}

/// Result of CRC validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrcValidationResult {
    Valid,
    Invalid { expected: u32, actual: u32 },
    /// Frame is too small to contain a CRC.
    TooSmall,
}

/// Validate the CRC of a single message frame (header included).
///
/// # Example
/// ```
/// use chunklog::protocol::{build_message, validate_message_crc, CrcValidationResult};
///
/// let frame = build_message(0, None, Some(b"hello"));
/// assert_eq!(validate_message_crc(&frame), CrcValidationResult::Valid);
/// ```
pub fn validate_message_crc(frame: &[u8]) -> CrcValidationResult {
    let data_start = FRAME_HEADER_SIZE + FRAME_CRC_SIZE;
    if frame.len() < data_start {
        return CrcValidationResult::TooSmall;
    }

    let stored_crc = u32::from_be_bytes([
        frame[FRAME_HEADER_SIZE],
        frame[FRAME_HEADER_SIZE + 1],
        frame[FRAME_HEADER_SIZE + 2],
        frame[FRAME_HEADER_SIZE + 3],
    ]);
    let computed_crc = crc32(&frame[data_start..]);

    if stored_crc == computed_crc {
        CrcValidationResult::Valid
    } else {
        CrcValidationResult::Invalid {
            expected: stored_crc,
            actual: computed_crc,
        }
    }
}

/// Read the offset stamped at the start of a frame.
pub fn read_offset(frame: &[u8]) -> Option<i64> {
    let bytes = frame.get(..FRAME_OFFSET_SIZE)?;
    Some(i64::from_be_bytes(bytes.try_into().ok()?))
}

/// Read the declared message size of a frame.
pub fn read_message_size(frame: &[u8]) -> Option<i32> {
    let bytes = frame.get(FRAME_OFFSET_SIZE..FRAME_HEADER_SIZE)?;
    Some(i32::from_be_bytes(bytes.try_into().ok()?))
}

/// Overwrite the offset field of a frame.
///
/// The offset is outside the CRC-covered region, so the CRC stays valid.
pub fn patch_offset(frame: &mut [u8], offset: i64) {
    if frame.len() >= FRAME_OFFSET_SIZE {
        frame[..FRAME_OFFSET_SIZE].copy_from_slice(&offset.to_be_bytes());
    }
}

/// Build a magic 0 message frame with a valid CRC.
///
/// Producers send frames with an arbitrary offset; the broker stamps the real
/// one on append.
pub fn build_message(offset: i64, key: Option<&[u8]>, value: Option<&[u8]>) -> BytesMut {
    build_frame(offset, MAGIC_V0, 0, None, key, value)
}

/// Build a magic 1 message frame carrying a timestamp.
pub fn build_message_v1(
    offset: i64,
    timestamp: i64,
    key: Option<&[u8]>,
    value: Option<&[u8]>,
) -> BytesMut {
    build_frame(offset, MAGIC_V1, 0, Some(timestamp), key, value)
}

/// Build a frame from its raw fields. Used directly by tests that need
/// unsupported attributes or format markers.
pub fn build_frame(
    offset: i64,
    magic: i8,
    attributes: i8,
    timestamp: Option<i64>,
    key: Option<&[u8]>,
    value: Option<&[u8]>,
) -> BytesMut {
    let mut body = BytesMut::new();
    body.put_i8(magic);
    body.put_i8(attributes);
    if let Some(ts) = timestamp {
        body.put_i64(ts);
    }
    put_nullable_bytes(&mut body, key);
    put_nullable_bytes(&mut body, value);

    let crc = crc32(&body);
    let mut frame = BytesMut::with_capacity(FRAME_HEADER_SIZE + FRAME_CRC_SIZE + body.len());
    frame.put_i64(offset);
    frame.put_i32((FRAME_CRC_SIZE + body.len()) as i32);
    frame.put_u32(crc);
    frame.put_slice(&body);
    frame
}

fn put_nullable_bytes(buffer: &mut BytesMut, data: Option<&[u8]>) {
    match data {
        Some(data) => {
            buffer.put_i32(data.len() as i32);
            buffer.put_slice(data);
        }
        None => buffer.put_i32(-1),
    }
}
