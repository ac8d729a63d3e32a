//! ListOffsets response encoding (Version: 0).

use bytes::BufMut;

use crate::client::PartitionSlots;
use crate::encode::{ToByte, encode_array};
use crate::error::{KafkaCode, Result};
use crate::internal::InternalListOffsetsResponse;
use crate::server::request::ListOffsetsRequestData;
use crate::types::PartitionId;

/// ListOffsets response data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOffsetsResponseData {
    pub topics: Vec<ListOffsetsTopicResponse>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOffsetsTopicResponse {
    pub name: String,
    pub partitions: Vec<ListOffsetsPartitionResponse>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListOffsetsPartitionResponse {
    pub partition_index: i32,
    pub error_code: KafkaCode,
    pub offsets: Vec<i64>,
}

impl ListOffsetsResponseData {
    pub fn stub(request: &ListOffsetsRequestData, error_code: KafkaCode) -> Self {
        Self {
            topics: request
                .topics
                .iter()
                .map(|topic| ListOffsetsTopicResponse {
                    name: topic.name.clone(),
                    partitions: topic
                        .partitions
                        .iter()
                        .map(|partition| ListOffsetsPartitionResponse {
                            partition_index: partition.partition_index,
                            error_code,
                            offsets: Vec::new(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

impl PartitionSlots for ListOffsetsResponseData {
    type Slot = InternalListOffsetsResponse;

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

    fn fill(&mut self, position: usize, value: InternalListOffsetsResponse) -> bool {
        let slot = self
            .topics
            .iter_mut()
            .flat_map(|topic| topic.partitions.iter_mut())
            .nth(position);
        let Some(slot) = slot else {
            return false;
        };
        slot.error_code = value.error_code;
        slot.offsets = value.offsets;
        true
    }
}

impl ToByte for ListOffsetsResponseData {
    fn encode<W: BufMut>(&self, buffer: &mut W) -> Result<()> {
        encode_array(buffer, &self.topics)
    }
}

impl ToByte for ListOffsetsTopicResponse {
    fn encode<W: BufMut>(&self, buffer: &mut W) -> Result<()> {
        self.name.encode(buffer)?;
        encode_array(buffer, &self.partitions)
    }
}

impl ToByte for ListOffsetsPartitionResponse {
    fn encode<W: BufMut>(&self, buffer: &mut W) -> Result<()> {
        self.partition_index.encode(buffer)?;
        self.error_code.encode(buffer)?;
        encode_array(buffer, &self.offsets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_offsets_partition_encode() {
        let partition = ListOffsetsPartitionResponse {
            partition_index: 0,
            error_code: KafkaCode::None,
            offsets: vec![10, 9],
        };
        let mut buffer = Vec::new();
        partition.encode(&mut buffer).unwrap();

        // index (4) + error (2) + count (4) + 2 offsets (16)
        assert_eq!(buffer.len(), 26);
        assert_eq!(&buffer[6..10], &2i32.to_be_bytes());
        assert_eq!(&buffer[10..18], &10i64.to_be_bytes());
    }
}
