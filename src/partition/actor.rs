//! The task that owns one partition log.

use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::constants::ACKS_NONE;
use crate::encode::ToByte;
use crate::internal::{InternalRequest, encode_internal_response};
use crate::log::{ConnectionId, FetchId, PartitionLog, StoreProvider};
use crate::types::PartitionId;

/// Inbound traffic for a partition actor.
#[derive(Debug)]
pub enum PartitionCommand {
    /// One internal sub-request. Replies, if any, go to `reply`.
    Request {
        connection: ConnectionId,
        message: Bytes,
        reply: mpsc::UnboundedSender<Bytes>,
    },
    /// The client side of `connection` went away.
    Disconnect { connection: ConnectionId },
}

pub(crate) struct PartitionActor {
    log: PartitionLog,
    mailbox: mpsc::Receiver<PartitionCommand>,
    expired: mpsc::UnboundedReceiver<FetchId>,
}

impl PartitionActor {
    /// Open the partition's store and process the mailbox until every sender
    /// is gone. If the store cannot be opened the actor exits immediately,
    /// which closes every connection to it.
    pub(crate) async fn run(
        partition: PartitionId,
        stores: Arc<dyn StoreProvider>,
        chunk_size: usize,
        mailbox: mpsc::Receiver<PartitionCommand>,
    ) {
        let store = match stores.open(&partition).await {
            Ok(store) => store,
            Err(e) => {
                tracing::error!(partition = %partition, error = %e, "Failed to open partition store");
                return;
            }
        };

        let (expired_tx, expired) = mpsc::unbounded_channel();
        let actor = PartitionActor {
            log: PartitionLog::new(partition, store, chunk_size, expired_tx),
            mailbox,
            expired,
        };
        actor.process().await;
    }

    async fn process(mut self) {
        tracing::debug!(partition = %self.log.partition(), "Partition actor started");
        loop {
            tokio::select! {
                command = self.mailbox.recv() => match command {
                    Some(PartitionCommand::Request { connection, message, reply }) => {
                        self.handle_request(connection, message, reply).await;
                    }
                    Some(PartitionCommand::Disconnect { connection }) => {
                        self.log.abort_fetches(connection);
                    }
                    None => break,
                },
                Some(id) = self.expired.recv() => {
                    self.log.expire_fetch(id);
                }
            }
        }
        if let Err(e) = self.log.close().await {
            tracing::warn!(partition = %self.log.partition(), error = %e, "Failed to close partition store");
        }
        tracing::debug!(partition = %self.log.partition(), "Partition actor stopped");
    }

    async fn handle_request(
        &mut self,
        connection: ConnectionId,
        message: Bytes,
        reply: mpsc::UnboundedSender<Bytes>,
    ) {
        let request = match InternalRequest::parse(message) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(
                    partition = %self.log.partition(),
                    connection,
                    error = %e,
                    "Dropping malformed sub-request"
                );
                return;
            }
        };

        let correlation_id = request.header().correlation_id;
        tracing::debug!(
            partition = %self.log.partition(),
            connection,
            correlation_id,
            api_key = request.header().api_key.as_str(),
            "Handling sub-request"
        );

        match request {
            InternalRequest::Produce(_, body) => {
                let response = self.log.append(body.message_set).await;
                if body.acks != ACKS_NONE {
                    self.respond(&reply, correlation_id, &response);
                }
            }
            InternalRequest::Fetch(_, body) => {
                let receiver = self.log.read(connection, &body).await;
                let partition = self.log.partition().clone();
                tokio::spawn(async move {
                    // An aborted fetch drops its sender and produces nothing.
                    if let Ok(response) = receiver.await {
                        send_response(&partition, &reply, correlation_id, &response);
                    }
                });
            }
            InternalRequest::ListOffsets(_, body) => {
                let response = self.log.list_offsets(&body).await;
                self.respond(&reply, correlation_id, &response);
            }
        }
    }

    fn respond<B: ToByte>(
        &self,
        reply: &mpsc::UnboundedSender<Bytes>,
        correlation_id: i32,
        body: &B,
    ) {
        send_response(self.log.partition(), reply, correlation_id, body);
    }
}

fn send_response<B: ToByte>(
    partition: &PartitionId,
    reply: &mpsc::UnboundedSender<Bytes>,
    correlation_id: i32,
    body: &B,
) {
    match encode_internal_response(correlation_id, body) {
        Ok(bytes) => {
            if reply.send(bytes).is_err() {
                tracing::debug!(partition = %partition, correlation_id, "Connection gone before reply");
            }
        }
        Err(e) => {
            tracing::error!(partition = %partition, correlation_id, error = %e, "Failed to encode sub-response");
        }
    }
}
