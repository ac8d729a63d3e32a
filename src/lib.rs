//! # Chunklog
//! A Kafka v0 wire-compatible broker core.
//!
//! Each partition is an append-only log of size-bounded chunks held in a
//! key-value store and owned by a single actor task, so operations on one
//! partition never interleave. Client requests are split into per-partition
//! sub-requests, sent over one connection per partition, and the
//! sub-responses are merged back into one Kafka response.
//!
//! ## Layout
//! - [`log`]: message framing, chunks, the partition log and long-poll fetch.
//! - [`internal`]: the sub-request protocol spoken between client side and
//!   partitions.
//! - [`partition`]: partition actors and the in-process dialer.
//! - [`client`]: connection multiplexer, response aggregation and the
//!   request coordinator.
//! - [`server`]: the Kafka v0 TCP server.
//!
//! ## Running a broker
//! ```rust,no_run
//! use std::sync::Arc;
//! use chunklog::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//!     let registry = Arc::new(PartitionRegistry::new(
//!         Arc::new(SlateStoreProvider::in_memory()),
//!         64 * 1024,
//!     ));
//!     let cluster = ClusterMetadata::from_json(
//!         r#"{"topics":[{"name":"test","partitions":[{"index":0}]}]}"#,
//!     )?;
//!     let metadata = Arc::new(MetadataDirectory::new("127.0.0.1", 9092, cluster));
//!     let server = KafkaServer::new("127.0.0.1:9092", registry, metadata).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Resources
//! - [Kafka Protocol Spec](https://kafka.apache.org/protocol.html)
//! - [Confluence Docs](https://cwiki.apache.org/confluence/display/KAFKA/A+Guide+To+The+Kafka+Protocol)

#![forbid(unsafe_code)]

mod encode;
pub mod error;
mod parser;
pub mod protocol;
pub mod types;

pub mod client;
pub mod config;
pub mod constants;
pub mod internal;
pub mod log;
pub mod metadata;
pub mod partition;
pub mod server;
pub mod telemetry;

pub mod prelude {
    //! Main exports for running a broker.
    pub use crate::config::BrokerConfig;
    pub use crate::error::{Error, KafkaCode, Result};
    pub use crate::log::{MemoryStoreProvider, SlateStoreProvider, StoreProvider};
    pub use crate::metadata::{ClusterMetadata, MetadataDirectory};
    pub use crate::partition::PartitionRegistry;
    pub use crate::server::KafkaServer;
    pub use crate::types::PartitionId;

    pub use bytes;
}
