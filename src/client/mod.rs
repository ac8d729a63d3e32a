//! The client side of partition traffic.
//!
//! - [`multiplexer`]: one connection per partition, shared by concurrent
//!   senders.
//! - [`aggregator`]: fills a response template from sub-responses.
//! - [`pending`]: per-API pending requests built on the aggregator.
//! - [`coordinator`]: fans client requests out and routes replies back.

pub mod aggregator;
pub mod coordinator;
pub mod multiplexer;
pub mod pending;

pub use aggregator::{IncrementalResponse, PartitionSlots};
pub use coordinator::{PendingRequests, RequestCoordinator};
pub use multiplexer::{
    ConnectionMultiplexer, LinkGeneration, PartitionDialer, PartitionHandler, PartitionLink,
};
pub use pending::{
    PendingFetch, PendingListOffsets, PendingProduce, PendingRequest, PendingResponse, SubResponse,
};
