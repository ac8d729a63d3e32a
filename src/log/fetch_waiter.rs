//! Long-poll fetch state.
//!
//! A [`PendingFetch`] collects whole frames from chunks as they become
//! available, starting at the requested offset, until either enough bytes
//! have accumulated or the wait deadline passes. It completes exactly once.
//! Dropping it without completing aborts the fetch: the receiver observes a
//! closed channel and no response is produced.

use bytes::BytesMut;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::KafkaCode;
use crate::internal::{InternalFetchRequest, InternalFetchResponse};
use crate::log::chunk::Chunk;

/// Identifies a pending fetch within one partition log.
pub type FetchId = u64;

/// Identifies the connection a fetch arrived on.
pub type ConnectionId = u64;

#[derive(Debug)]
pub struct PendingFetch {
    connection: ConnectionId,
    min_bytes: i32,
    max_bytes: usize,
    high_watermark: i64,
    next_offset: i64,
    message_set: BytesMut,
    done: Option<oneshot::Sender<InternalFetchResponse>>,
    timer: Option<JoinHandle<()>>,
}

impl PendingFetch {
    /// Create a pending fetch and start its deadline timer. When the timer
    /// fires, `id` is sent on `expired`; the owner is expected to call
    /// [`PendingFetch::complete`].
    pub fn new(
        id: FetchId,
        connection: ConnectionId,
        request: &InternalFetchRequest,
        high_watermark: i64,
        expired: mpsc::UnboundedSender<FetchId>,
    ) -> (Self, oneshot::Receiver<InternalFetchResponse>) {
        let (done, receiver) = oneshot::channel();
        let max_bytes = request.max_bytes.max(0) as usize;
        let wait = Duration::from_millis(request.max_wait_ms.max(0) as u64);

        let timer = tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            let _ = expired.send(id);
        });

        let pending = Self {
            connection,
            min_bytes: request.min_bytes,
            max_bytes,
            high_watermark,
            next_offset: request.fetch_offset,
            message_set: BytesMut::with_capacity(max_bytes.min(1 << 20)),
            done: Some(done),
            timer: Some(timer),
        };
        (pending, receiver)
    }

    #[inline]
    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.done.is_none()
    }

    #[inline]
    pub fn bytes_written(&self) -> usize {
        self.message_set.len()
    }

    /// Feed chunks in offset order. Returns true once the fetch has completed.
    pub fn add_chunks<'a>(
        &mut self,
        high_watermark: i64,
        chunks: impl IntoIterator<Item = &'a Chunk>,
    ) -> bool {
        if self.is_complete() {
            return true;
        }
        self.high_watermark = high_watermark;

        for chunk in chunks {
            let full = self.read_chunk(chunk);
            // A frame may be too large to fit between min and max bytes, in
            // which case the buffer is full before min_bytes is reached.
            if full || self.satisfied() {
                self.complete();
                return true;
            }
        }

        if self.satisfied() {
            self.complete();
            return true;
        }
        false
    }

    fn satisfied(&self) -> bool {
        self.message_set.len() as i64 >= self.min_bytes as i64
    }

    /// Copy whole frames from `chunk` starting at the read cursor. Returns
    /// true if a frame had to be left out because it would exceed
    /// `max_bytes`.
    fn read_chunk(&mut self, chunk: &Chunk) -> bool {
        if chunk.is_empty() || !chunk.contains(self.next_offset) {
            return false;
        }

        let first = (self.next_offset - chunk.offset_start()) as usize;
        for position in first..chunk.frame_count() {
            let Some(frame) = chunk.frame_bytes(position) else {
                break;
            };
            if self.message_set.len() + frame.len() > self.max_bytes {
                return true;
            }
            self.message_set.extend_from_slice(frame);
            self.next_offset += 1;
        }
        false
    }

    /// Resolve with whatever has been collected. Later calls are no-ops.
    pub fn complete(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        if let Some(done) = self.done.take() {
            let response = InternalFetchResponse {
                error_code: KafkaCode::None,
                high_watermark: self.high_watermark,
                message_set: self.message_set.split().freeze(),
            };
            // The requester may already be gone.
            let _ = done.send(response);
        }
    }
}

impl Drop for PendingFetch {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}
