//! Metadata response encoding (Version: 0).

use bytes::BufMut;

use crate::encode::{ToByte, encode_array};
use crate::error::{KafkaCode, Result};

/// Metadata response data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataResponseData {
    pub brokers: Vec<BrokerData>,
    pub topics: Vec<TopicMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerData {
    pub node_id: i32,
    pub host: String,
    pub port: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicMetadata {
    pub error_code: KafkaCode,
    pub name: String,
    pub partitions: Vec<PartitionMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionMetadata {
    pub error_code: KafkaCode,
    pub partition_index: i32,
    pub leader_id: i32,
    pub replica_nodes: Vec<i32>,
    pub isr_nodes: Vec<i32>,
}

impl ToByte for MetadataResponseData {
    fn encode<W: BufMut>(&self, buffer: &mut W) -> Result<()> {
        encode_array(buffer, &self.brokers)?;
        encode_array(buffer, &self.topics)
    }
}

impl ToByte for BrokerData {
    fn encode<W: BufMut>(&self, buffer: &mut W) -> Result<()> {
        self.node_id.encode(buffer)?;
        self.host.encode(buffer)?;
        self.port.encode(buffer)
    }
}

impl ToByte for TopicMetadata {
    fn encode<W: BufMut>(&self, buffer: &mut W) -> Result<()> {
        self.error_code.encode(buffer)?;
        self.name.encode(buffer)?;
        encode_array(buffer, &self.partitions)
    }
}

impl ToByte for PartitionMetadata {
    fn encode<W: BufMut>(&self, buffer: &mut W) -> Result<()> {
        self.error_code.encode(buffer)?;
        self.partition_index.encode(buffer)?;
        self.leader_id.encode(buffer)?;
        encode_array(buffer, &self.replica_nodes)?;
        encode_array(buffer, &self.isr_nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broker_data_encode() {
        let broker = BrokerData {
            node_id: 333,
            host: "localhost".to_string(),
            port: 9092,
        };

        let mut buffer = Vec::new();
        broker.encode(&mut buffer).unwrap();

        // node_id (4) + host (2 + 9) + port (4)
        assert_eq!(buffer.len(), 19);
        assert_eq!(&buffer[..4], &333i32.to_be_bytes());
    }

    #[test]
    fn test_unknown_topic_encode() {
        let topic = TopicMetadata {
            error_code: KafkaCode::UnknownTopicOrPartition,
            name: "nope".to_string(),
            partitions: vec![],
        };

        let mut buffer = Vec::new();
        topic.encode(&mut buffer).unwrap();

        assert_eq!(&buffer[..2], &3i16.to_be_bytes());
        assert_eq!(&buffer[buffer.len() - 4..], &0i32.to_be_bytes());
    }

    #[test]
    fn test_partition_metadata_encode() {
        let partition = PartitionMetadata {
            error_code: KafkaCode::None,
            partition_index: 1,
            leader_id: 333,
            replica_nodes: vec![],
            isr_nodes: vec![],
        };

        let mut buffer = Vec::new();
        partition.encode(&mut buffer).unwrap();

        // error (2) + index (4) + leader (4) + two empty arrays (8)
        assert_eq!(buffer.len(), 18);
    }
}
