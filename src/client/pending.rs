//! Client requests waiting on partition sub-responses.

use bytes::Bytes;
use tokio::sync::oneshot;

use crate::client::aggregator::{IncrementalResponse, PartitionSlots};
use crate::error::{KafkaCode, Result};
use crate::internal::{InternalFetchResponse, InternalListOffsetsResponse, InternalProduceResponse};
use crate::server::response::{FetchResponseData, ListOffsetsResponseData, ProduceResponseData};
use crate::types::PartitionId;

/// A decoded partition sub-response.
pub trait SubResponse: Sized + Clone + Send {
    fn parse(data: Bytes) -> Result<Self>;

    /// Placeholder for a partition whose connection closed mid-request.
    fn network_exception() -> Self;

    /// Placeholder for a partition that did not answer before the deadline.
    fn request_timed_out() -> Self;
}

impl SubResponse for InternalProduceResponse {
    fn parse(data: Bytes) -> Result<Self> {
        InternalProduceResponse::parse(data)
    }

    fn network_exception() -> Self {
        InternalProduceResponse::error(KafkaCode::NetworkException)
    }

    fn request_timed_out() -> Self {
        InternalProduceResponse::error(KafkaCode::RequestTimedOut)
    }
}

impl SubResponse for InternalFetchResponse {
    fn parse(data: Bytes) -> Result<Self> {
        InternalFetchResponse::parse(data)
    }

    fn network_exception() -> Self {
        InternalFetchResponse::error(KafkaCode::NetworkException, 0)
    }

    fn request_timed_out() -> Self {
        InternalFetchResponse::error(KafkaCode::RequestTimedOut, 0)
    }
}

impl SubResponse for InternalListOffsetsResponse {
    fn parse(data: Bytes) -> Result<Self> {
        InternalListOffsetsResponse::parse(data)
    }

    fn network_exception() -> Self {
        InternalListOffsetsResponse::error(KafkaCode::NetworkException)
    }

    fn request_timed_out() -> Self {
        InternalListOffsetsResponse::error(KafkaCode::RequestTimedOut)
    }
}

/// A registered client request, as seen by the coordinator.
pub trait PendingRequest: Send + Sync {
    /// A sub-response from `partition`, with the correlation id removed.
    fn handle_partition_message(&mut self, partition: &PartitionId, message: Bytes);

    /// The connection this request's sub-requests to `partition` went out on
    /// closed. A no-op if they were all answered.
    fn handle_partition_close(&mut self, partition: &PartitionId);

    /// The request deadline passed.
    fn handle_timeout(&mut self);

    fn abort(&mut self);

    fn is_settled(&self) -> bool;
}

/// A client response being filled in from sub-responses.
pub struct PendingResponse<R: PartitionSlots> {
    response: IncrementalResponse<R>,
}

pub type PendingProduce = PendingResponse<ProduceResponseData>;
pub type PendingFetch = PendingResponse<FetchResponseData>;
pub type PendingListOffsets = PendingResponse<ListOffsetsResponseData>;

impl<R: PartitionSlots> PendingResponse<R> {
    pub fn new(template: R) -> (Self, oneshot::Receiver<R>) {
        let (response, receiver) = IncrementalResponse::new(template);
        (Self { response }, receiver)
    }
}

impl<R> PendingRequest for PendingResponse<R>
where
    R: PartitionSlots + Send + Sync,
    R::Slot: SubResponse + Sync,
{
    fn handle_partition_message(&mut self, partition: &PartitionId, message: Bytes) {
        match R::Slot::parse(message) {
            Ok(value) => self.response.add_partition(partition, value),
            Err(e) => {
                tracing::warn!(partition = %partition, error = %e, "Malformed sub-response");
                self.response
                    .add_partition(partition, R::Slot::network_exception());
            }
        }
    }

    fn handle_partition_close(&mut self, partition: &PartitionId) {
        self.response
            .fail_partition(partition, R::Slot::network_exception());
    }

    fn handle_timeout(&mut self) {
        self.response.cancel(R::Slot::request_timed_out());
    }

    fn abort(&mut self) {
        self.response.abort();
    }

    fn is_settled(&self) -> bool {
        self.response.is_settled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::ToByte;
    use crate::server::request::{ProducePartitionData, ProduceRequestData, ProduceTopicData};

    fn template(indexes: &[i32]) -> ProduceResponseData {
        ProduceResponseData::stub(
            &ProduceRequestData {
                acks: 1,
                timeout_ms: 100,
                topics: vec![ProduceTopicData {
                    name: "t".to_string(),
                    partitions: indexes
                        .iter()
                        .map(|&partition_index| ProducePartitionData {
                            partition_index,
                            message_set: Bytes::new(),
                        })
                        .collect(),
                }],
            },
            KafkaCode::None,
        )
    }

    fn encoded(response: InternalProduceResponse) -> Bytes {
        let mut buf = Vec::new();
        response.encode(&mut buf).unwrap();
        Bytes::from(buf)
    }

    #[tokio::test]
    async fn test_sub_responses_fill_template() {
        let (mut pending, receiver) = PendingProduce::new(template(&[0, 1]));
        pending.handle_partition_message(
            &PartitionId::new("t", 1),
            encoded(InternalProduceResponse {
                error_code: KafkaCode::None,
                base_offset: 40,
            }),
        );
        pending.handle_partition_close(&PartitionId::new("t", 0));
        assert!(pending.is_settled());

        let response = receiver.await.unwrap();
        let partitions = &response.topics[0].partitions;
        assert_eq!(partitions[0].error_code, KafkaCode::NetworkException);
        assert_eq!(partitions[0].base_offset, 0);
        assert_eq!(partitions[1].base_offset, 40);
    }

    #[tokio::test]
    async fn test_close_of_unrelated_partition_is_ignored() {
        let (mut pending, _receiver) = PendingProduce::new(template(&[0]));
        pending.handle_partition_close(&PartitionId::new("other", 0));
        assert!(!pending.is_settled());
    }

    #[tokio::test]
    async fn test_timeout_marks_missing_partitions() {
        let (mut pending, receiver) = PendingProduce::new(template(&[0, 1]));
        pending.handle_partition_message(
            &PartitionId::new("t", 0),
            encoded(InternalProduceResponse {
                error_code: KafkaCode::None,
                base_offset: 3,
            }),
        );
        pending.handle_timeout();

        let response = receiver.await.unwrap();
        let partitions = &response.topics[0].partitions;
        assert_eq!(partitions[0].error_code, KafkaCode::None);
        assert_eq!(partitions[1].error_code, KafkaCode::RequestTimedOut);
    }

    #[tokio::test]
    async fn test_fetch_close_yields_empty_network_exception() {
        let (mut pending, receiver) = PendingFetch::new(FetchResponseData {
            topics: vec![crate::server::response::FetchTopicResponse {
                name: "t".to_string(),
                partitions: vec![crate::server::response::FetchPartitionResponse {
                    partition_index: 2,
                    ..Default::default()
                }],
            }],
        });
        pending.handle_partition_close(&PartitionId::new("t", 2));

        let response = receiver.await.unwrap();
        let partition = &response.topics[0].partitions[0];
        assert_eq!(partition.error_code, KafkaCode::NetworkException);
        assert_eq!(partition.high_watermark, 0);
        assert!(partition.message_set.is_empty());
    }

    #[tokio::test]
    async fn test_abort() {
        let (mut pending, receiver) = PendingListOffsets::new(ListOffsetsResponseData {
            topics: vec![crate::server::response::ListOffsetsTopicResponse {
                name: "t".to_string(),
                partitions: vec![Default::default()],
            }],
        });
        pending.abort();
        assert!(pending.is_settled());
        assert!(receiver.await.is_err());
    }
}
