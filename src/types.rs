//! Partition identity value type.
//!
//! A partition is named by its topic and index. The pair is used directly as
//! a routing key by the connection multiplexer and as the storage namespace
//! of each partition log, so it carries a total order and a stable binary
//! encoding instead of being flattened into a string.

use bytes::{BufMut, Bytes, BytesMut};
use std::{fmt, sync::Arc};

use crate::encode::ToByte;
use crate::error::Result;

/// The `(topic, index)` pair uniquely naming one log.
///
/// Cloning is cheap: the topic name is shared.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartitionId {
    topic: Arc<str>,
    index: i32,
}

impl PartitionId {
    pub fn new(topic: impl Into<Arc<str>>, index: i32) -> Self {
        Self {
            topic: topic.into(),
            index,
        }
    }

    #[inline]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[inline]
    pub fn index(&self) -> i32 {
        self.index
    }

    /// Stable binary form: topic as a length-prefixed string, then the
    /// big-endian index.
    pub fn storage_key(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(2 + self.topic.len() + 4);
        // Encoding into a BytesMut cannot fail.
        let _ = self.encode(&mut buf);
        buf.freeze()
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.topic, self.index)
    }
}

impl ToByte for PartitionId {
    fn encode<T: BufMut>(&self, buffer: &mut T) -> Result<()> {
        self.topic().encode(buffer)?;
        self.index.encode(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_partition_id_display() {
        assert_eq!(PartitionId::new("orders", 3).to_string(), "orders-3");
    }

    #[test]
    fn test_partition_id_accessors() {
        let id = PartitionId::new(String::from("t"), 7);
        assert_eq!(id.topic(), "t");
        assert_eq!(id.index(), 7);
    }

    #[test]
    fn test_partition_id_ordering() {
        let ids: BTreeSet<_> = [
            PartitionId::new("b", 0),
            PartitionId::new("a", 2),
            PartitionId::new("a", 1),
        ]
        .into_iter()
        .collect();
        let ordered: Vec<_> = ids.iter().map(|id| id.to_string()).collect();
        assert_eq!(ordered, vec!["a-1", "a-2", "b-0"]);
    }

    #[test]
    fn test_storage_key_is_unambiguous() {
        // Both display as "a--1".
        let a = PartitionId::new("a-", 1);
        let b = PartitionId::new("a", -1);
        assert_eq!(a.to_string(), b.to_string());
        assert_ne!(a.storage_key(), b.storage_key());
        assert_eq!(
            PartitionId::new("ab", 1).storage_key().as_ref(),
            &[0, 2, b'a', b'b', 0, 0, 0, 1]
        );
    }
}
