//! Produce response encoding (Version: 0).

use bytes::BufMut;

use crate::client::PartitionSlots;
use crate::encode::{ToByte, encode_array};
use crate::error::{KafkaCode, Result};
use crate::internal::InternalProduceResponse;
use crate::server::request::ProduceRequestData;
use crate::types::PartitionId;

/// Produce response data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProduceResponseData {
    pub topics: Vec<ProduceTopicResponse>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProduceTopicResponse {
    pub name: String,
    pub partitions: Vec<ProducePartitionResponse>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProducePartitionResponse {
    pub partition_index: i32,
    pub error_code: KafkaCode,
    pub base_offset: i64,
}

impl ProduceResponseData {
    /// A response shaped like `request` with every partition set to
    /// `error_code` and base offset 0.
    pub fn stub(request: &ProduceRequestData, error_code: KafkaCode) -> Self {
        Self {
            topics: request
                .topics
                .iter()
                .map(|topic| ProduceTopicResponse {
                    name: topic.name.clone(),
                    partitions: topic
                        .partitions
                        .iter()
                        .map(|partition| ProducePartitionResponse {
                            partition_index: partition.partition_index,
                            error_code,
                            base_offset: 0,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

impl PartitionSlots for ProduceResponseData {
    type Slot = InternalProduceResponse;

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

    fn fill(&mut self, position: usize, value: InternalProduceResponse) -> bool {
        let slot = self
            .topics
            .iter_mut()
            .flat_map(|topic| topic.partitions.iter_mut())
            .nth(position);
        match slot {
            Some(slot) => {
                slot.error_code = value.error_code;
                slot.base_offset = value.base_offset;
                true
            }
            None => false,
        }
    }
}

impl ToByte for ProduceResponseData {
    fn encode<W: BufMut>(&self, buffer: &mut W) -> Result<()> {
        encode_array(buffer, &self.topics)
    }
}

impl ToByte for ProduceTopicResponse {
    fn encode<W: BufMut>(&self, buffer: &mut W) -> Result<()> {
        self.name.encode(buffer)?;
        encode_array(buffer, &self.partitions)
    }
}

impl ToByte for ProducePartitionResponse {
    fn encode<W: BufMut>(&self, buffer: &mut W) -> Result<()> {
        self.partition_index.encode(buffer)?;
        self.error_code.encode(buffer)?;
        self.base_offset.encode(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::request::{ProducePartitionData, ProduceTopicData};
    use bytes::Bytes;

    fn request() -> ProduceRequestData {
        ProduceRequestData {
            acks: 1,
            timeout_ms: 1000,
            topics: vec![ProduceTopicData {
                name: "events".to_string(),
                partitions: vec![
                    ProducePartitionData {
                        partition_index: 0,
                        message_set: Bytes::new(),
                    },
                    ProducePartitionData {
                        partition_index: 3,
                        message_set: Bytes::new(),
                    },
                ],
            }],
        }
    }

    #[test]
    fn test_stub_mirrors_request_shape() {
        let stub = ProduceResponseData::stub(&request(), KafkaCode::Unknown);
        assert_eq!(
            stub.slots(),
            vec![PartitionId::new("events", 0), PartitionId::new("events", 3)]
        );
        assert!(stub.topics[0].partitions.iter().all(|p| p.error_code == KafkaCode::Unknown));
    }

    #[test]
    fn test_fill_slot() {
        let mut response = ProduceResponseData::stub(&request(), KafkaCode::None);
        let filled = response.fill(
            1,
            InternalProduceResponse {
                error_code: KafkaCode::CorruptMessage,
                base_offset: 0,
            },
        );
        assert!(filled);
        assert_eq!(response.topics[0].partitions[1].error_code, KafkaCode::CorruptMessage);
        assert_eq!(response.topics[0].partitions[1].partition_index, 3);
        assert!(!response.fill(2, InternalProduceResponse::default()));
    }

    #[test]
    fn test_produce_response_encode() {
        let response = ProduceResponseData {
            topics: vec![ProduceTopicResponse {
                name: "t".to_string(),
                partitions: vec![ProducePartitionResponse {
                    partition_index: 1,
                    error_code: KafkaCode::None,
                    base_offset: 12345,
                }],
            }],
        };

        let mut buffer = Vec::new();
        response.encode(&mut buffer).unwrap();

        // topics (4) + name (2 + 1) + partitions (4) + index (4) + error (2) + offset (8)
        assert_eq!(buffer.len(), 25);
        assert_eq!(&buffer[buffer.len() - 8..], &12345i64.to_be_bytes());
    }
}
