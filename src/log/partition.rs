//! The partition log: append, read and list offsets over chunked storage.
//!
//! A `PartitionLog` is owned by exactly one task, so nothing here locks.
//! Storage faults never escape: they are logged and reported as
//! [`KafkaCode::Unknown`] in the sub-response.

use bytes::{Bytes, BytesMut};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use crate::constants::EARLIEST_TIMESTAMP;
use crate::error::{Error, KafkaCode, Result};
use crate::internal::{
    InternalFetchRequest, InternalFetchResponse, InternalListOffsetsRequest,
    InternalListOffsetsResponse, InternalProduceResponse,
};
use crate::log::chunk::Chunk;
use crate::log::cursor::Cursor;
use crate::log::fetch_waiter::{ConnectionId, FetchId, PendingFetch};
use crate::log::framer::prepare_message_set;
use crate::log::keys::{CURSOR_KEY, encode_chunk_key};
use crate::log::store::{KvStore, WriteBatch};
use crate::types::PartitionId;

pub struct PartitionLog {
    partition: PartitionId,
    store: Arc<dyn KvStore>,
    chunk_size: usize,
    cursor: Option<Cursor>,
    pending: HashMap<FetchId, PendingFetch>,
    next_fetch_id: FetchId,
    expired: mpsc::UnboundedSender<FetchId>,
}

impl PartitionLog {
    /// Create a log over `store`. Fetch deadlines are reported on `expired`;
    /// the owner passes each id back to [`PartitionLog::expire_fetch`].
    pub fn new(
        partition: PartitionId,
        store: Arc<dyn KvStore>,
        chunk_size: usize,
        expired: mpsc::UnboundedSender<FetchId>,
    ) -> Self {
        Self {
            partition,
            store,
            chunk_size,
            cursor: None,
            pending: HashMap::new(),
            next_fetch_id: 0,
            expired,
        }
    }

    pub fn partition(&self) -> &PartitionId {
        &self.partition
    }

    /// Number of fetches waiting for data.
    pub fn pending_fetches(&self) -> usize {
        self.pending.len()
    }

    /// The next offset that will be assigned.
    pub async fn high_watermark(&mut self) -> Result<i64> {
        Ok(self.cursor().await?.next_offset)
    }

    async fn cursor(&mut self) -> Result<Cursor> {
        if let Some(cursor) = &self.cursor {
            return Ok(cursor.clone());
        }
        let cursor = match self.store.get(CURSOR_KEY).await? {
            Some(data) => Cursor::from_bytes(data)?,
            None => Cursor::default(),
        };
        self.cursor = Some(cursor.clone());
        Ok(cursor)
    }

    async fn load_chunk(&self, offset_start: i64) -> Result<Chunk> {
        let data = self
            .store
            .get(&encode_chunk_key(offset_start))
            .await?
            .ok_or_else(|| Error::Storage(format!("missing chunk {offset_start}")))?;
        Chunk::from_bytes(data)
    }

    /// Validate `message_set`, place its frames into chunks and persist them
    /// together with the cursor, then feed waiting fetches.
    pub async fn append(&mut self, message_set: Bytes) -> InternalProduceResponse {
        match self.try_append(message_set).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(partition = %self.partition, error = %e, "Append failed");
                InternalProduceResponse::error(KafkaCode::Unknown)
            }
        }
    }

    async fn try_append(&mut self, message_set: Bytes) -> Result<InternalProduceResponse> {
        let mut cursor = self.cursor().await?;
        let base_offset = cursor.next_offset;

        let mut filler = match prepare_message_set(BytesMut::from(&message_set[..]), base_offset) {
            Ok(filler) => filler,
            Err(code) => {
                tracing::debug!(partition = %self.partition, error = ?code, "Rejected message set");
                return Ok(InternalProduceResponse::error(code));
            }
        };
        if filler.is_done() {
            return Ok(InternalProduceResponse {
                error_code: KafkaCode::None,
                base_offset,
            });
        }
        if filler.largest_frame() > self.chunk_size {
            tracing::debug!(
                partition = %self.partition,
                frame_size = filler.largest_frame(),
                chunk_size = self.chunk_size,
                "Message larger than chunk capacity"
            );
            return Ok(InternalProduceResponse::error(KafkaCode::MessageSizeTooLarge));
        }

        let mut chunk = match cursor.current_chunk() {
            Some(offset_start) => self.load_chunk(offset_start).await?,
            None => Chunk::new(cursor.next_offset, self.chunk_size),
        };
        let mut touched = Vec::new();
        loop {
            let written = filler.fill_chunk(&mut chunk);
            cursor.next_offset += written as i64;
            if cursor.current_chunk() != Some(chunk.offset_start()) {
                cursor.chunk_offsets.push(chunk.offset_start());
            }
            if written > 0 {
                touched.push(chunk);
            }
            if filler.is_done() {
                break;
            }
            chunk = Chunk::new(cursor.next_offset, self.chunk_size);
        }

        let mut batch = WriteBatch::new();
        for chunk in &touched {
            batch.put(
                Bytes::copy_from_slice(&encode_chunk_key(chunk.offset_start())),
                chunk.to_bytes()?,
            );
        }
        batch.put(Bytes::from_static(CURSOR_KEY), cursor.to_bytes()?);
        self.store.write_batch(batch).await?;

        tracing::debug!(
            partition = %self.partition,
            base_offset,
            next_offset = cursor.next_offset,
            chunks = touched.len(),
            "Appended message set"
        );

        let high_watermark = cursor.next_offset;
        self.cursor = Some(cursor);
        self.pending
            .retain(|_, pending| !pending.add_chunks(high_watermark, touched.iter()));

        Ok(InternalProduceResponse {
            error_code: KafkaCode::None,
            base_offset,
        })
    }

    /// Start a read. The receiver resolves immediately when the offset is out
    /// of range, or once enough data arrives or the wait deadline passes. If
    /// the fetch is aborted the sender is dropped without a value.
    pub async fn read(
        &mut self,
        connection: ConnectionId,
        request: &InternalFetchRequest,
    ) -> oneshot::Receiver<InternalFetchResponse> {
        match self.try_read(connection, request).await {
            Ok(receiver) => receiver,
            Err(e) => {
                tracing::error!(partition = %self.partition, error = %e, "Read failed");
                immediate(InternalFetchResponse::error(KafkaCode::Unknown, 0))
            }
        }
    }

    async fn try_read(
        &mut self,
        connection: ConnectionId,
        request: &InternalFetchRequest,
    ) -> Result<oneshot::Receiver<InternalFetchResponse>> {
        let cursor = self.cursor().await?;
        if request.fetch_offset < 0 || request.fetch_offset > cursor.next_offset {
            return Ok(immediate(InternalFetchResponse::error(
                KafkaCode::OffsetOutOfRange,
                cursor.next_offset,
            )));
        }

        let max_bytes = request.max_bytes.max(0) as usize;
        let max_chunks = max_bytes.div_ceil(self.chunk_size.max(1)) + 1;
        let mut chunks = Vec::new();
        if let Some(start) = cursor.start_chunk_index(request.fetch_offset) {
            for offset_start in cursor.chunk_offsets.iter().skip(start).take(max_chunks) {
                chunks.push(self.load_chunk(*offset_start).await?);
            }
        }

        let id = self.next_fetch_id;
        self.next_fetch_id += 1;
        let (mut pending, receiver) = PendingFetch::new(
            id,
            connection,
            request,
            cursor.next_offset,
            self.expired.clone(),
        );
        if !pending.add_chunks(cursor.next_offset, chunks.iter()) {
            tracing::debug!(
                partition = %self.partition,
                fetch_offset = request.fetch_offset,
                min_bytes = request.min_bytes,
                "Fetch waiting for data"
            );
            self.pending.insert(id, pending);
        }
        Ok(receiver)
    }

    /// Complete a fetch whose deadline passed with whatever it has collected.
    pub fn expire_fetch(&mut self, id: FetchId) {
        if let Some(mut pending) = self.pending.remove(&id) {
            pending.complete();
        }
    }

    /// Abort every fetch that arrived on `connection`. No response is sent.
    pub fn abort_fetches(&mut self, connection: ConnectionId) {
        let before = self.pending.len();
        self.pending
            .retain(|_, pending| pending.connection() != connection);
        let aborted = before - self.pending.len();
        if aborted > 0 {
            tracing::debug!(partition = %self.partition, connection, aborted, "Aborted fetches");
        }
    }

    /// Abort every waiting fetch and close the store.
    pub async fn close(&mut self) -> Result<()> {
        self.pending.clear();
        self.store.close().await
    }

    /// Offsets counting down from the high watermark, most recent first.
    /// Only the earliest sentinel is distinguished; every other timestamp is
    /// answered as "latest".
    pub async fn list_offsets(
        &mut self,
        request: &InternalListOffsetsRequest,
    ) -> InternalListOffsetsResponse {
        if request.timestamp == EARLIEST_TIMESTAMP {
            return InternalListOffsetsResponse {
                error_code: KafkaCode::None,
                offsets: vec![0],
            };
        }

        let next_offset = match self.cursor().await {
            Ok(cursor) => cursor.next_offset,
            Err(e) => {
                tracing::error!(partition = %self.partition, error = %e, "ListOffsets failed");
                return InternalListOffsetsResponse::error(KafkaCode::Unknown);
            }
        };

        let stop = next_offset - request.max_num_offsets as i64;
        let stop = if stop < 0 { -1 } else { stop };
        InternalListOffsetsResponse {
            error_code: KafkaCode::None,
            offsets: ((stop + 1)..=next_offset).rev().collect(),
        }
    }
}

fn immediate(response: InternalFetchResponse) -> oneshot::Receiver<InternalFetchResponse> {
    let (sender, receiver) = oneshot::channel();
    let _ = sender.send(response);
    receiver
}
