//! Fan-out of client requests to partitions and fan-in of their replies.
//!
//! One [`RequestCoordinator`] serves one client connection. Every request
//! that expects a reply is registered under its client correlation id; the
//! same id tags each sub-request, so sub-responses arriving in any order are
//! routed back to the request that is waiting for them.

use bytes::Bytes;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::StreamExt;
use futures::stream;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::client::multiplexer::{
    ConnectionMultiplexer, LinkGeneration, PartitionDialer, PartitionHandler,
};
use crate::client::pending::{PendingFetch, PendingListOffsets, PendingProduce, PendingRequest};
use crate::constants::{ACKS_NONE, MAX_CONCURRENT_PARTITION_SENDS};
use crate::error::{Error, KafkaCode, Result};
use crate::internal::{
    InternalFetchRequest, InternalListOffsetsRequest, InternalProduceRequest,
    InternalRequestHeader, PartitionApiKey, encode_internal_request, split_correlation_id,
};
use crate::server::request::{
    FetchRequestData, ListOffsetsRequestData, ProduceRequestData, RequestHeader,
};
use crate::server::response::{FetchResponseData, ListOffsetsResponseData, ProduceResponseData};
use crate::types::PartitionId;

struct Registered {
    id: u64,
    request: Box<dyn PendingRequest>,
    timer: Option<JoinHandle<()>>,
    /// The connection each partition's sub-request went out on.
    links: HashMap<PartitionId, LinkGeneration>,
}

impl Drop for Registered {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

/// Requests waiting on partitions, keyed by client correlation id.
#[derive(Default)]
pub struct PendingRequests {
    requests: DashMap<i32, Registered>,
    next_id: AtomicU64,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Register `request` under `correlation_id`. Returns a registration id
    /// that identifies this particular request among reuses of the same
    /// correlation id.
    fn register(&self, correlation_id: i32, request: Box<dyn PendingRequest>) -> Result<u64> {
        match self.requests.entry(correlation_id) {
            Entry::Occupied(_) => Err(Error::DuplicateCorrelationId(correlation_id)),
            Entry::Vacant(entry) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                entry.insert(Registered {
                    id,
                    request,
                    timer: None,
                    links: HashMap::new(),
                });
                Ok(id)
            }
        }
    }

    fn start_timer(self: &Arc<Self>, correlation_id: i32, id: u64, timeout: Duration) {
        let requests: Weak<Self> = Arc::downgrade(self);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(requests) = requests.upgrade() {
                requests.time_out(correlation_id, id);
            }
        });
        match self.requests.get_mut(&correlation_id) {
            Some(mut entry) if entry.id == id => entry.timer = Some(timer),
            _ => timer.abort(),
        }
    }

    fn time_out(&self, correlation_id: i32, id: u64) {
        if let Some(mut entry) = self.requests.get_mut(&correlation_id) {
            if entry.id != id {
                return;
            }
            tracing::debug!(correlation_id, "Request timed out");
            entry.request.handle_timeout();
        }
        self.remove_settled(correlation_id);
    }

    fn remove(&self, correlation_id: i32, id: u64) {
        self.requests.remove_if(&correlation_id, |_, entry| entry.id == id);
    }

    fn remove_settled(&self, correlation_id: i32) {
        self.requests
            .remove_if(&correlation_id, |_, entry| entry.request.is_settled());
    }

    /// Note that the sub-request for `partition` was sent on connection
    /// `generation`.
    fn record_link(&self, correlation_id: i32, id: u64, partition: &PartitionId, generation: LinkGeneration) {
        if let Some(mut entry) = self.requests.get_mut(&correlation_id) {
            if entry.id == id {
                entry.links.insert(partition.clone(), generation);
            }
        }
    }

    /// Fail the request's slots for `partition`, whose connection closed
    /// before its generation was recorded.
    fn fail_link(&self, correlation_id: i32, id: u64, partition: &PartitionId) {
        if let Some(mut entry) = self.requests.get_mut(&correlation_id) {
            if entry.id == id {
                entry.request.handle_partition_close(partition);
            }
        }
        self.remove_settled(correlation_id);
    }

    /// Drop the registration if it already completed.
    fn release_if_settled(&self, correlation_id: i32, id: u64) {
        self.requests.remove_if(&correlation_id, |_, entry| {
            entry.id == id && entry.request.is_settled()
        });
    }

    /// Abort every registered request. Their callers observe
    /// [`Error::Aborted`].
    pub fn abort_all(&self) {
        for mut entry in self.requests.iter_mut() {
            entry.request.abort();
        }
        self.requests.clear();
    }
}

impl PartitionHandler for PendingRequests {
    fn handle_partition_message(&self, partition: &PartitionId, message: Bytes) {
        let Some((correlation_id, body)) = split_correlation_id(message) else {
            tracing::warn!(partition = %partition, "Sub-response without correlation id");
            return;
        };
        match self.requests.get_mut(&correlation_id) {
            Some(mut entry) => entry.request.handle_partition_message(partition, body),
            None => {
                tracing::debug!(
                    partition = %partition,
                    correlation_id,
                    "Couldn't match sub-response to pending request"
                );
                return;
            }
        }
        self.remove_settled(correlation_id);
    }

    fn handle_partition_close(&self, partition: &PartitionId, generation: LinkGeneration) {
        for mut entry in self.requests.iter_mut() {
            if entry.links.get(partition) == Some(&generation) {
                entry.request.handle_partition_close(partition);
            }
        }
        self.requests.retain(|_, entry| !entry.request.is_settled());
    }
}

pub struct RequestCoordinator {
    pending: Arc<PendingRequests>,
    multiplexer: ConnectionMultiplexer,
}

impl RequestCoordinator {
    pub fn new(dialer: Arc<dyn PartitionDialer>) -> Self {
        let pending = Arc::new(PendingRequests::new());
        let multiplexer = ConnectionMultiplexer::new(dialer, pending.clone());
        Self {
            pending,
            multiplexer,
        }
    }

    /// Requests currently waiting on partitions.
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    /// Fan a Produce request out to its partitions. Resolves to `None` once
    /// every sub-request is sent when no acknowledgment was requested.
    pub async fn produce(
        &self,
        header: &RequestHeader,
        request: &ProduceRequestData,
    ) -> Result<Option<ProduceResponseData>> {
        let correlation_id = header.correlation_id;
        let registration = if request.acks != ACKS_NONE {
            let template = ProduceResponseData::stub(request, KafkaCode::None);
            let (pending, receiver) = PendingProduce::new(template);
            let id = self.pending.register(correlation_id, Box::new(pending))?;
            let timeout = Duration::from_millis(request.timeout_ms.max(0) as u64);
            self.pending.start_timer(correlation_id, id, timeout);
            Some((id, receiver))
        } else {
            None
        };

        let internal_header = &InternalRequestHeader::new(
            PartitionApiKey::Produce,
            correlation_id,
            header.client_id.clone(),
        );
        let messages = request
            .topics
            .iter()
            .flat_map(|topic| {
                topic.partitions.iter().map(move |partition| {
                    let body = InternalProduceRequest {
                        acks: request.acks,
                        message_set: partition.message_set.clone(),
                    };
                    (
                        PartitionId::new(topic.name.as_str(), partition.partition_index),
                        encode_internal_request(internal_header, &body),
                    )
                })
            })
            .collect();

        self.dispatch(correlation_id, registration.as_ref().map(|(id, _)| *id), messages)
            .await?;

        match registration {
            Some((_, receiver)) => receiver.await.map(Some).map_err(|_| Error::Aborted),
            None => Ok(None),
        }
    }

    /// Fan a Fetch request out to its partitions. Every partition receives the
    /// client's wait time and minimum bytes.
    pub async fn fetch(
        &self,
        header: &RequestHeader,
        request: &FetchRequestData,
    ) -> Result<FetchResponseData> {
        let correlation_id = header.correlation_id;
        let template = FetchResponseData::stub(request, KafkaCode::None);
        let (pending, receiver) = PendingFetch::new(template);
        let id = self.pending.register(correlation_id, Box::new(pending))?;

        let internal_header = &InternalRequestHeader::new(
            PartitionApiKey::Fetch,
            correlation_id,
            header.client_id.clone(),
        );
        let messages = request
            .topics
            .iter()
            .flat_map(|topic| {
                topic.partitions.iter().map(move |partition| {
                    let body = InternalFetchRequest {
                        max_wait_ms: request.max_wait_ms,
                        fetch_offset: partition.fetch_offset,
                        min_bytes: request.min_bytes,
                        max_bytes: partition.max_bytes,
                    };
                    (
                        PartitionId::new(topic.name.as_str(), partition.partition_index),
                        encode_internal_request(internal_header, &body),
                    )
                })
            })
            .collect();

        self.dispatch(correlation_id, Some(id), messages).await?;
        receiver.await.map_err(|_| Error::Aborted)
    }

    pub async fn list_offsets(
        &self,
        header: &RequestHeader,
        request: &ListOffsetsRequestData,
    ) -> Result<ListOffsetsResponseData> {
        let correlation_id = header.correlation_id;
        let template = ListOffsetsResponseData::stub(request, KafkaCode::None);
        let (pending, receiver) = PendingListOffsets::new(template);
        let id = self.pending.register(correlation_id, Box::new(pending))?;

        let internal_header = &InternalRequestHeader::new(
            PartitionApiKey::ListOffsets,
            correlation_id,
            header.client_id.clone(),
        );
        let messages = request
            .topics
            .iter()
            .flat_map(|topic| {
                topic.partitions.iter().map(move |partition| {
                    let body = InternalListOffsetsRequest {
                        timestamp: partition.timestamp,
                        max_num_offsets: partition.max_num_offsets,
                    };
                    (
                        PartitionId::new(topic.name.as_str(), partition.partition_index),
                        encode_internal_request(internal_header, &body),
                    )
                })
            })
            .collect();

        self.dispatch(correlation_id, Some(id), messages).await?;
        receiver.await.map_err(|_| Error::Aborted)
    }

    /// Send every sub-request. On the first failure the registration, if
    /// any, is dropped and the error returned. A registration that is
    /// already complete, such as one for zero partitions, is released.
    async fn dispatch(
        &self,
        correlation_id: i32,
        registration: Option<u64>,
        messages: Vec<(PartitionId, Result<Bytes>)>,
    ) -> Result<()> {
        let results: Vec<Result<()>> = stream::iter(messages)
            .map(|(partition, message)| async move {
                let message = message?;
                let generation = self.multiplexer.send(&partition, message).await.map_err(|e| {
                    tracing::warn!(partition = %partition, correlation_id, error = %e, "Failed to send sub-request");
                    e
                })?;
                if let Some(id) = registration {
                    self.pending.record_link(correlation_id, id, &partition, generation);
                    if !self.multiplexer.is_live(&partition, generation) {
                        self.pending.fail_link(correlation_id, id, &partition);
                    }
                }
                Ok(())
            })
            .buffer_unordered(MAX_CONCURRENT_PARTITION_SENDS)
            .collect()
            .await;

        if let Some(error) = results.into_iter().find_map(|result| result.err()) {
            if let Some(id) = registration {
                self.pending.remove(correlation_id, id);
            }
            return Err(error);
        }
        if let Some(id) = registration {
            self.pending.release_if_settled(correlation_id, id);
        }
        Ok(())
    }

    /// Abort every registered request and close all partition connections.
    pub fn close(&self) {
        self.pending.abort_all();
        self.multiplexer.close();
    }
}

impl Drop for RequestCoordinator {
    fn drop(&mut self) {
        self.close();
    }
}
