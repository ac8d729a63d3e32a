//! Static cluster directory.
//!
//! The broker serves a fixed set of topics loaded at startup. Every
//! partition is led by the single broker, with empty replica and ISR lists.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::constants::BROKER_ID;
use crate::error::{KafkaCode, Result};
use crate::server::response::{BrokerData, MetadataResponseData, PartitionMetadata, TopicMetadata};

/// Topics and partitions known to the cluster.
///
/// ```json
/// {"topics": [{"name": "events", "partitions": [{"index": 0}, {"index": 1}]}]}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMetadata {
    #[serde(default)]
    pub topics: Vec<TopicConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicConfig {
    pub name: String,
    #[serde(default)]
    pub partitions: Vec<PartitionConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionConfig {
    pub index: i32,
}

impl ClusterMetadata {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn topic(&self, name: &str) -> Option<&TopicConfig> {
        self.topics.iter().find(|topic| topic.name == name)
    }

    /// Problems that make the directory ambiguous.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let mut names = HashSet::new();

        for topic in &self.topics {
            if topic.name.is_empty() {
                errors.push("topic name must not be empty".to_string());
            }
            if !names.insert(topic.name.as_str()) {
                errors.push(format!("duplicate topic '{}'", topic.name));
            }

            let mut indexes = HashSet::new();
            for partition in &topic.partitions {
                if partition.index < 0 {
                    errors.push(format!(
                        "topic '{}' has negative partition index {}",
                        topic.name, partition.index
                    ));
                }
                if !indexes.insert(partition.index) {
                    errors.push(format!(
                        "topic '{}' lists partition {} more than once",
                        topic.name, partition.index
                    ));
                }
            }
        }
        errors
    }
}

/// Answers Metadata requests for one advertised broker.
#[derive(Debug, Clone)]
pub struct MetadataDirectory {
    broker: BrokerData,
    cluster: ClusterMetadata,
}

impl MetadataDirectory {
    pub fn new(host: impl Into<String>, port: u16, cluster: ClusterMetadata) -> Self {
        Self {
            broker: BrokerData {
                node_id: BROKER_ID,
                host: host.into(),
                port: port as i32,
            },
            cluster,
        }
    }

    pub fn cluster(&self) -> &ClusterMetadata {
        &self.cluster
    }

    /// Describe `topics`, or every topic when the list is empty. Unknown
    /// topics are reported with `UnknownTopicOrPartition` and no partitions.
    pub fn describe(&self, topics: &[String]) -> MetadataResponseData {
        let topics = if topics.is_empty() {
            self.cluster.topics.iter().map(describe_topic).collect()
        } else {
            topics
                .iter()
                .map(|name| match self.cluster.topic(name) {
                    Some(topic) => describe_topic(topic),
                    None => TopicMetadata {
                        error_code: KafkaCode::UnknownTopicOrPartition,
                        name: name.clone(),
                        partitions: Vec::new(),
                    },
                })
                .collect()
        };

        MetadataResponseData {
            brokers: vec![self.broker.clone()],
            topics,
        }
    }
}

fn describe_topic(topic: &TopicConfig) -> TopicMetadata {
    TopicMetadata {
        error_code: KafkaCode::None,
        name: topic.name.clone(),
        partitions: topic
            .partitions
            .iter()
            .map(|partition| PartitionMetadata {
                error_code: KafkaCode::None,
                partition_index: partition.index,
                leader_id: BROKER_ID,
                replica_nodes: Vec::new(),
                isr_nodes: Vec::new(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster() -> ClusterMetadata {
        ClusterMetadata::from_json(
            r#"{"topics":[
                {"name":"events","partitions":[{"index":0},{"index":1}]},
                {"name":"audit","partitions":[{"index":0}]}
            ]}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_from_json() {
        let cluster = cluster();
        assert_eq!(cluster.topics.len(), 2);
        assert_eq!(cluster.topic("events").unwrap().partitions[1].index, 1);
        assert!(cluster.topic("missing").is_none());

        assert_eq!(ClusterMetadata::from_json("{}").unwrap(), ClusterMetadata::default());
        assert!(ClusterMetadata::from_json("not json").is_err());
    }

    #[test]
    fn test_describe_all_topics() {
        let directory = MetadataDirectory::new("broker.local", 9092, cluster());
        let response = directory.describe(&[]);

        assert_eq!(
            response.brokers,
            vec![BrokerData {
                node_id: 333,
                host: "broker.local".to_string(),
                port: 9092,
            }]
        );
        assert_eq!(response.topics.len(), 2);
        let events = &response.topics[0];
        assert_eq!(events.error_code, KafkaCode::None);
        assert_eq!(events.partitions.len(), 2);
        assert!(events.partitions.iter().all(|p| p.leader_id == 333));
        assert!(events.partitions.iter().all(|p| p.replica_nodes.is_empty()));
    }

    #[test]
    fn test_describe_unknown_topic() {
        let directory = MetadataDirectory::new("h", 1, cluster());
        let response = directory.describe(&["audit".to_string(), "nope".to_string()]);

        assert_eq!(response.topics[0].name, "audit");
        assert_eq!(response.topics[1].name, "nope");
        assert_eq!(response.topics[1].error_code, KafkaCode::UnknownTopicOrPartition);
        assert!(response.topics[1].partitions.is_empty());
    }

    #[test]
    fn test_validate() {
        assert!(cluster().validate().is_empty());

        let bad = ClusterMetadata::from_json(
            r#"{"topics":[
                {"name":"a","partitions":[{"index":0},{"index":0},{"index":-1}]},
                {"name":"a"}
            ]}"#,
        )
        .unwrap();
        let errors = bad.validate();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.contains("duplicate topic")));
        assert!(errors.iter().any(|e| e.contains("negative")));
        assert!(errors.iter().any(|e| e.contains("more than once")));
    }
}
