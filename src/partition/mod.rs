//! Partition hosting.
//!
//! Each partition identity is served by exactly one actor task that owns its
//! [`PartitionLog`](crate::log::PartitionLog), so operations on a partition
//! never interleave. The [`PartitionRegistry`] spawns actors on first use and
//! hands out in-process connections to them through the
//! [`PartitionDialer`] interface.

mod actor;

pub use actor::PartitionCommand;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

use crate::client::{PartitionDialer, PartitionLink};
use crate::constants::PARTITION_MAILBOX_SIZE;
use crate::error::Result;
use crate::log::{ConnectionId, StoreProvider};
use crate::types::PartitionId;

use actor::PartitionActor;

pub struct PartitionRegistry {
    stores: Arc<dyn StoreProvider>,
    chunk_size: usize,
    actors: DashMap<PartitionId, mpsc::Sender<PartitionCommand>>,
    next_connection: AtomicU64,
}

impl PartitionRegistry {
    pub fn new(stores: Arc<dyn StoreProvider>, chunk_size: usize) -> Self {
        Self {
            stores,
            chunk_size,
            actors: DashMap::new(),
            next_connection: AtomicU64::new(0),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of partitions with a live actor.
    pub fn active_partitions(&self) -> usize {
        self.actors.iter().filter(|entry| !entry.value().is_closed()).count()
    }

    /// The mailbox of the actor serving `partition`, spawning it if there is
    /// none or the previous one has exited.
    fn mailbox(&self, partition: &PartitionId) -> mpsc::Sender<PartitionCommand> {
        match self.actors.entry(partition.clone()) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_closed() {
                    tracing::debug!(partition = %partition, "Restarting partition actor");
                    entry.insert(self.spawn_actor(partition));
                }
                entry.get().clone()
            }
            Entry::Vacant(entry) => entry.insert(self.spawn_actor(partition)).clone(),
        }
    }

    fn spawn_actor(&self, partition: &PartitionId) -> mpsc::Sender<PartitionCommand> {
        let (tx, rx) = mpsc::channel(PARTITION_MAILBOX_SIZE);
        tokio::spawn(PartitionActor::run(
            partition.clone(),
            self.stores.clone(),
            self.chunk_size,
            rx,
        ));
        tx
    }

    /// Open a connection to the actor serving `partition`.
    pub fn connect(&self, partition: &PartitionId) -> PartitionLink {
        let mailbox = self.mailbox(partition);
        let connection = self.next_connection.fetch_add(1, Ordering::Relaxed);
        let (sender, outbound) = mpsc::unbounded_channel();
        let (reply, receiver) = mpsc::unbounded_channel();

        tokio::spawn(pump(connection, outbound, reply, mailbox));
        tracing::debug!(partition = %partition, connection, "Opened partition connection");

        PartitionLink { sender, receiver }
    }
}

/// Forward one connection's sub-requests into the actor mailbox until either
/// side goes away, then tell the actor the connection is gone.
async fn pump(
    connection: ConnectionId,
    mut outbound: mpsc::UnboundedReceiver<Bytes>,
    reply: mpsc::UnboundedSender<Bytes>,
    mailbox: mpsc::Sender<PartitionCommand>,
) {
    loop {
        tokio::select! {
            message = outbound.recv() => match message {
                Some(message) => {
                    let command = PartitionCommand::Request {
                        connection,
                        message,
                        reply: reply.clone(),
                    };
                    if mailbox.send(command).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            _ = mailbox.closed() => break,
        }
    }
    let _ = mailbox.send(PartitionCommand::Disconnect { connection }).await;
}

#[async_trait]
impl PartitionDialer for PartitionRegistry {
    async fn dial(&self, partition: &PartitionId) -> Result<PartitionLink> {
        Ok(self.connect(partition))
    }
}
