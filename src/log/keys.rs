//! Key encoding for partition storage.
//!
//! Each partition log owns its own key-value store, so keys only need to be
//! unique within a partition.
//!
//! ## Chunk Keys
//!
//! Format: `c<offset_start:8>` (9 bytes total)
//! - Prefix: `c` (0x63) - 1 byte
//! - Offset: Big-endian i64 - 8 bytes
//!
//! Big-endian encoding keeps lexicographic order equal to numeric order.
//!
//! ## Metadata Keys
//!
//! Metadata keys start with underscore (`_`) to separate them from chunk keys:
//! - `_cursor` - next offset plus the list of chunk start offsets

use crate::types::PartitionId;

/// Prefix byte for chunk keys.
pub const CHUNK_KEY_PREFIX: u8 = b'c';

/// Key holding the persisted cursor.
pub const CURSOR_KEY: &[u8] = b"_cursor";

/// Encode the key of the chunk whose first offset is `offset_start`.
pub fn encode_chunk_key(offset_start: i64) -> [u8; 9] {
    let mut key = [0u8; 9];
    key[0] = CHUNK_KEY_PREFIX;
    key[1..9].copy_from_slice(&offset_start.to_be_bytes());
    key
}

/// Decode the start offset from a chunk key.
pub fn decode_chunk_offset(key: &[u8]) -> Option<i64> {
    if key.len() >= 9 && key[0] == CHUNK_KEY_PREFIX {
        let bytes: [u8; 8] = key[1..9].try_into().ok()?;
        Some(i64::from_be_bytes(bytes))
    } else {
        None
    }
}

/// Object store path of a partition's database.
///
/// Hex of the partition's storage key, so any topic name maps to a valid,
/// collision-free path segment.
pub fn partition_dir_name(id: &PartitionId) -> String {
    id.storage_key()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
