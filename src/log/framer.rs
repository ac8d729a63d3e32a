//! Message set validation and offset stamping.
//!
//! A produce payload is a concatenation of message frames. Every frame is
//! checked before any of them is accepted: one bad message rejects the whole
//! batch, and a rejected batch never reaches the log.

use bytes::BytesMut;

use crate::constants::{
    FRAME_CRC_SIZE, FRAME_HEADER_SIZE, MAGIC_V0, MAGIC_V1, MIN_MESSAGE_SIZE,
};
use crate::error::KafkaCode;
use crate::log::chunk::{ChunkFiller, Frame};
use crate::protocol::{CrcValidationResult, patch_offset, read_message_size, validate_message_crc};

/// Validate `message_set` and stamp offsets onto its frames, starting at
/// `initial_offset` and incrementing by one per frame.
///
/// Errors:
/// - [`KafkaCode::InvalidMessageSize`] when a size is negative or too small
///   to hold the CRC and format marker.
/// - [`KafkaCode::CorruptMessage`] on a CRC mismatch or a frame running past
///   the end of the batch.
/// - [`KafkaCode::Unknown`] for a compressed magic 1 message or an
///   unrecognised format marker.
pub fn prepare_message_set(
    mut message_set: BytesMut,
    initial_offset: i64,
) -> Result<ChunkFiller, KafkaCode> {
    let mut frames = Vec::new();
    let mut next_offset = initial_offset;
    let mut position = 0;

    while position < message_set.len() {
        let remaining = &message_set[position..];
        let message_size = read_message_size(remaining).ok_or(KafkaCode::CorruptMessage)?;
        if message_size < MIN_MESSAGE_SIZE {
            return Err(KafkaCode::InvalidMessageSize);
        }

        let frame_size = FRAME_HEADER_SIZE + message_size as usize;
        let frame = remaining
            .get(..frame_size)
            .ok_or(KafkaCode::CorruptMessage)?;

        match validate_message_crc(frame) {
            CrcValidationResult::Valid => {}
            CrcValidationResult::Invalid { expected, actual } => {
                tracing::debug!(offset = next_offset, expected, actual, "CRC mismatch");
                return Err(KafkaCode::CorruptMessage);
            }
            CrcValidationResult::TooSmall => return Err(KafkaCode::CorruptMessage),
        }

        let magic_index = FRAME_HEADER_SIZE + FRAME_CRC_SIZE;
        let magic = frame[magic_index] as i8;
        if magic == MAGIC_V1 {
            let attributes = frame
                .get(magic_index + 1)
                .map(|b| *b as i8)
                .ok_or(KafkaCode::InvalidMessageSize)?;
            if attributes != 0 {
                tracing::debug!(attributes, "compressed messages are not supported");
                return Err(KafkaCode::Unknown);
            }
        } else if magic != MAGIC_V0 {
            tracing::debug!(magic, "unsupported message format");
            return Err(KafkaCode::Unknown);
        }

        frames.push(Frame {
            start: position,
            size: frame_size,
        });
        position += frame_size;
        next_offset += 1;
    }

    for (i, frame) in frames.iter().enumerate() {
        patch_offset(
            &mut message_set[frame.start..frame.end()],
            initial_offset + i as i64,
        );
    }

    Ok(ChunkFiller::new(message_set, frames))
}
