//! Fetch response encoding (Version: 0).

use bytes::{BufMut, Bytes};

use crate::client::PartitionSlots;
use crate::encode::{ToByte, encode_array};
use crate::error::{KafkaCode, Result};
use crate::internal::InternalFetchResponse;
use crate::server::request::FetchRequestData;
use crate::types::PartitionId;

/// Fetch response data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponseData {
    pub topics: Vec<FetchTopicResponse>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTopicResponse {
    pub name: String,
    pub partitions: Vec<FetchPartitionResponse>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FetchPartitionResponse {
    pub partition_index: i32,
    pub error_code: KafkaCode,
    pub high_watermark: i64,
    pub message_set: Bytes,
}

impl FetchResponseData {
    /// A response shaped like `request` with every partition set to
    /// `error_code`, high watermark 0 and no data.
    pub fn stub(request: &FetchRequestData, error_code: KafkaCode) -> Self {
        Self {
            topics: request
                .topics
                .iter()
                .map(|topic| FetchTopicResponse {
                    name: topic.name.clone(),
                    partitions: topic
                        .partitions
                        .iter()
                        .map(|partition| FetchPartitionResponse {
                            partition_index: partition.partition_index,
                            error_code,
                            high_watermark: 0,
                            message_set: Bytes::new(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

impl PartitionSlots for FetchResponseData {
    type Slot = InternalFetchResponse;

    fn slots(&self) -> Vec<PartitionId> {
        self.topics
            .iter()
            .flat_map(|topic| {
                topic
                    .partitions
                    .iter()
                    .map(|partition| PartitionId::new(topic.name.as_str(), partition.partition_index))
            })
            .collect()
    }

    fn fill(&mut self, position: usize, value: InternalFetchResponse) -> bool {
        let slot = self
            .topics
            .iter_mut()
            .flat_map(|topic| topic.partitions.iter_mut())
            .nth(position);
        let Some(slot) = slot else {
            return false;
        };
        slot.error_code = value.error_code;
        slot.high_watermark = value.high_watermark;
        slot.message_set = value.message_set;
        true
    }
}

impl ToByte for FetchResponseData {
    fn encode<W: BufMut>(&self, buffer: &mut W) -> Result<()> {
        encode_array(buffer, &self.topics)
    }
}

impl ToByte for FetchTopicResponse {
    fn encode<W: BufMut>(&self, buffer: &mut W) -> Result<()> {
        self.name.encode(buffer)?;
        encode_array(buffer, &self.partitions)
    }
}

impl ToByte for FetchPartitionResponse {
    fn encode<W: BufMut>(&self, buffer: &mut W) -> Result<()> {
        self.partition_index.encode(buffer)?;
        self.error_code.encode(buffer)?;
        self.high_watermark.encode(buffer)?;
        self.message_set.encode(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_partition_response_encode() {
        let partition = FetchPartitionResponse {
            partition_index: 2,
            error_code: KafkaCode::OffsetOutOfRange,
            high_watermark: 9,
            message_set: Bytes::from_static(b"xyz"),
        };

        let mut buffer = Vec::new();
        partition.encode(&mut buffer).unwrap();

        // index (4) + error (2) + high watermark (8) + size (4) + data (3)
        assert_eq!(buffer.len(), 21);
        assert_eq!(&buffer[4..6], &1i16.to_be_bytes());
        assert_eq!(&buffer[14..18], &3i32.to_be_bytes());
        assert_eq!(&buffer[18..], b"xyz");
    }

    #[test]
    fn test_fill_keeps_partition_index() {
        let mut response = FetchResponseData {
            topics: vec![FetchTopicResponse {
                name: "t".to_string(),
                partitions: vec![FetchPartitionResponse {
                    partition_index: 5,
                    ..Default::default()
                }],
            }],
        };
        assert!(response.fill(
            0,
            InternalFetchResponse {
                error_code: KafkaCode::None,
                high_watermark: 11,
                message_set: Bytes::from_static(b"m"),
            },
        ));
        let partition = &response.topics[0].partitions[0];
        assert_eq!(partition.partition_index, 5);
        assert_eq!(partition.high_watermark, 11);
        assert_eq!(partition.message_set.as_ref(), b"m");
    }
}
