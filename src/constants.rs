//! Centralized protocol and configuration constants.
//!
//! # Categories
//!
//! - **Message Frame Layout**: byte positions inside a v0/v1 message frame
//! - **Protocol Constants**: wire limits and sentinel values
//! - **Broker Defaults**: values used when the environment leaves them unset

// =============================================================================
// Message Frame Layout
// =============================================================================
//
// Offset  Size  Field
// 0       8     offset (assigned by the broker)
// 8       4     message_size (bytes following this field)
// 12      4     crc (CRC-32 of the bytes following this field)
// 16      1     magic (format marker, 0 or 1)
// 17      1     attributes (checked for magic 1 only)
// ...           key / value payload

/// Width of the broker-assigned offset field.
pub const FRAME_OFFSET_SIZE: usize = 8;

/// Width of the message size field.
pub const FRAME_SIZE_FIELD_SIZE: usize = 4;

/// Width of the CRC field.
pub const FRAME_CRC_SIZE: usize = 4;

/// Bytes preceding the message body: offset plus size.
pub const FRAME_HEADER_SIZE: usize = FRAME_OFFSET_SIZE + FRAME_SIZE_FIELD_SIZE;

/// Smallest message body: a CRC and a format marker.
pub const MIN_MESSAGE_SIZE: i32 = (FRAME_CRC_SIZE + 1) as i32;

/// Smallest possible frame, and therefore the smallest usable chunk.
pub const MIN_FRAME_SIZE: usize = FRAME_HEADER_SIZE + MIN_MESSAGE_SIZE as usize;

/// Original message format marker.
pub const MAGIC_V0: i8 = 0;

/// Message format marker that adds a timestamp; attributes must be zero
/// because compression is not supported.
pub const MAGIC_V1: i8 = 1;

// =============================================================================
// Protocol Constants
// =============================================================================

/// Maximum allowed array size in protocol messages.
///
/// Bounds memory allocated while parsing a hostile array length.
pub const MAX_PROTOCOL_ARRAY_SIZE: i32 = 100_000;

/// ListOffsets timestamp asking for the earliest available offset.
pub const EARLIEST_TIMESTAMP: i64 = -2;

/// ListOffsets timestamp asking for the latest offset.
pub const LATEST_TIMESTAMP: i64 = -1;

/// Produce acks value meaning "do not reply".
pub const ACKS_NONE: i16 = 0;

/// The only API version served, for client and internal requests alike.
pub const SUPPORTED_API_VERSION: i16 = 0;

/// Node id advertised for the single broker in Metadata responses.
pub const BROKER_ID: i32 = 333;

// =============================================================================
// Broker Defaults
// =============================================================================

/// Default chunk byte capacity (64 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 9092;

/// Default maximum client request frame (100 MB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 100 * 1024 * 1024;

/// Default global connection cap. 0 disables the cap.
pub const DEFAULT_MAX_CONNECTIONS: usize = 10_000;

/// Default SlateDB write-ahead log flush interval. Acknowledged appends wait
/// for the next flush.
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 10;

/// Depth of each partition actor's mailbox.
pub const PARTITION_MAILBOX_SIZE: usize = 1024;

/// Concurrent sub-request sends per fanned-out client request.
pub const MAX_CONCURRENT_PARTITION_SENDS: usize = 16;
