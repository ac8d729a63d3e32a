//! Per-connection request handling.
//!
//! A [`Session`] owns the [`RequestCoordinator`] for one client connection.
//! Produce, Fetch and ListOffsets are fanned out to partitions; Metadata is
//! answered from the static directory.

use bytes::Bytes;
use std::sync::Arc;
use std::time::Instant;

use crate::client::{PartitionDialer, RequestCoordinator};
use crate::encode::ToByte;
use crate::error::{Error, KafkaCode, Result};
use crate::metadata::MetadataDirectory;

use super::request::{Request, RequestHeader};
use super::response::{
    FetchResponseData, ListOffsetsResponseData, ProduceResponseData, Response,
};

pub struct Session {
    coordinator: RequestCoordinator,
    metadata: Arc<MetadataDirectory>,
}

impl Session {
    pub fn new(dialer: Arc<dyn PartitionDialer>, metadata: Arc<MetadataDirectory>) -> Self {
        Self {
            coordinator: RequestCoordinator::new(dialer),
            metadata,
        }
    }

    /// Requests of this session still waiting on partitions.
    pub fn pending_requests(&self) -> usize {
        self.coordinator.pending_requests()
    }

    /// Handle one request frame (without its size prefix).
    ///
    /// Returns the size-prefixed response frame, or `None` when the request
    /// gets no response: undecodable requests, unsupported versions,
    /// Produce with `acks == 0`, and requests aborted by [`Session::close`].
    pub async fn handle_request(&self, data: Bytes) -> Result<Option<Bytes>> {
        let request = match Request::parse(data) {
            Ok(request) => request,
            Err(e @ (Error::UnsupportedVersion { .. } | Error::UnknownApiKey(_))) => {
                tracing::warn!(error = %e, "Dropping unsupported request");
                return Ok(None);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed request");
                return Ok(None);
            }
        };

        let header = request.header().clone();
        let start = Instant::now();

        let response = match request {
            Request::Produce(header, body) => {
                match self.coordinator.produce(&header, &body).await {
                    Ok(Some(response)) => Some(encode(&header, &response)?),
                    Ok(None) => None,
                    Err(e) => failed(&header, e, || {
                        ProduceResponseData::stub(&body, KafkaCode::Unknown)
                    })?,
                }
            }
            Request::Fetch(header, body) => match self.coordinator.fetch(&header, &body).await {
                Ok(response) => Some(encode(&header, &response)?),
                Err(e) => failed(&header, e, || {
                    FetchResponseData::stub(&body, KafkaCode::Unknown)
                })?,
            },
            Request::ListOffsets(header, body) => {
                match self.coordinator.list_offsets(&header, &body).await {
                    Ok(response) => Some(encode(&header, &response)?),
                    Err(e) => failed(&header, e, || {
                        ListOffsetsResponseData::stub(&body, KafkaCode::Unknown)
                    })?,
                }
            }
            Request::Metadata(header, body) => {
                Some(encode(&header, &self.metadata.describe(&body.topics))?)
            }
        };

        tracing::debug!(
            api = header.api_key.as_str(),
            correlation_id = header.correlation_id,
            elapsed_us = start.elapsed().as_micros() as u64,
            responded = response.is_some(),
            "Handled request"
        );

        Ok(response)
    }

    /// Abort every pending request and close partition connections.
    /// Aborted requests produce no response.
    pub fn close(&self) {
        self.coordinator.close();
    }
}

fn encode<T: ToByte>(header: &RequestHeader, body: &T) -> Result<Bytes> {
    Response::new(header.correlation_id, body)?.encode_with_size()
}

/// Abort means the connection is going away. Any other failure is reported
/// with every partition set to `Unknown`.
fn failed<T, F>(header: &RequestHeader, error: Error, stub: F) -> Result<Option<Bytes>>
where
    T: ToByte,
    F: FnOnce() -> T,
{
    match error {
        Error::Aborted => Ok(None),
        e => {
            tracing::warn!(
                api = header.api_key.as_str(),
                correlation_id = header.correlation_id,
                error = %e,
                "Request failed"
            );
            encode(header, &stub()).map(Some)
        }
    }
}
