//! One outbound connection per partition.
//!
//! The multiplexer keeps, per partition identity, either an established
//! connection or the single in-flight connect attempt that every concurrent
//! sender shares. Inbound messages and connection loss are forwarded to a
//! [`PartitionHandler`].

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::types::PartitionId;

/// Both halves of a connection to a partition.
///
/// Dropping `sender` closes the connection from the client side; the
/// partition closes it by dropping its end of `receiver`.
#[derive(Debug)]
pub struct PartitionLink {
    pub sender: mpsc::UnboundedSender<Bytes>,
    pub receiver: mpsc::UnboundedReceiver<Bytes>,
}

/// Opens connections to partitions.
#[async_trait]
pub trait PartitionDialer: Send + Sync {
    async fn dial(&self, partition: &PartitionId) -> Result<PartitionLink>;
}

/// Identifies one connection among successive connections to the same
/// partition.
pub type LinkGeneration = u64;

/// Receives traffic from partition connections.
pub trait PartitionHandler: Send + Sync {
    fn handle_partition_message(&self, partition: &PartitionId, message: Bytes);

    /// The connection `generation` to `partition` closed. Nothing more will
    /// arrive on it.
    fn handle_partition_close(&self, partition: &PartitionId, generation: LinkGeneration);
}

/// The sending half of an established connection.
#[derive(Clone)]
struct Outbound {
    generation: LinkGeneration,
    sender: mpsc::UnboundedSender<Bytes>,
}

impl Outbound {
    fn send(&self, message: Bytes) -> Result<LinkGeneration> {
        self.sender
            .send(message)
            .map(|_| self.generation)
            .map_err(|_| Error::ConnectionClosed)
    }
}

type Connecting = Shared<BoxFuture<'static, Result<Outbound>>>;

enum Socket {
    Active(Outbound),
    Pending(Connecting),
}

impl Socket {
    fn is_generation(&self, generation: LinkGeneration) -> bool {
        matches!(self, Socket::Active(outbound) if outbound.generation == generation)
    }
}

type Sockets = DashMap<PartitionId, Socket>;

/// Only `sockets` owns the sending half of a connection, so removing a
/// socket closes it.
pub struct ConnectionMultiplexer {
    dialer: Arc<dyn PartitionDialer>,
    handler: Arc<dyn PartitionHandler>,
    sockets: Arc<Sockets>,
    closed: Arc<AtomicBool>,
    next_generation: Arc<AtomicU64>,
}

impl ConnectionMultiplexer {
    pub fn new(dialer: Arc<dyn PartitionDialer>, handler: Arc<dyn PartitionHandler>) -> Self {
        Self {
            dialer,
            handler,
            sockets: Arc::new(DashMap::new()),
            closed: Arc::new(AtomicBool::new(false)),
            next_generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Send `message` to `partition`, connecting first if needed. Returns
    /// the generation of the connection the message went out on.
    pub async fn send(&self, partition: &PartitionId, message: Bytes) -> Result<LinkGeneration> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::ConnectionClosed);
        }

        let connecting = match self.sockets.entry(partition.clone()) {
            Entry::Occupied(entry) => match entry.get() {
                Socket::Active(outbound) => return outbound.send(message),
                Socket::Pending(connecting) => connecting.clone(),
            },
            Entry::Vacant(entry) => {
                let connecting = self.connect(partition.clone()).boxed().shared();
                entry.insert(Socket::Pending(connecting.clone()));
                connecting
            }
        };

        let outbound = connecting.await?;
        outbound.send(message)
    }

    fn connect(&self, partition: PartitionId) -> impl std::future::Future<Output = Result<Outbound>> + Send + 'static {
        let dialer = self.dialer.clone();
        let handler = self.handler.clone();
        let sockets = self.sockets.clone();
        let closed = self.closed.clone();
        let next_generation = self.next_generation.clone();

        async move {
            let link = match dialer.dial(&partition).await {
                Ok(link) => link,
                Err(e) => {
                    tracing::warn!(partition = %partition, error = %e, "Failed to connect to partition");
                    sockets.remove_if(&partition, |_, socket| matches!(socket, Socket::Pending(_)));
                    return Err(e);
                }
            };
            let PartitionLink {
                sender,
                mut receiver,
            } = link;
            let generation = next_generation.fetch_add(1, Ordering::Relaxed);
            let outbound = Outbound { generation, sender };

            sockets.insert(partition.clone(), Socket::Active(outbound.clone()));
            if closed.load(Ordering::Acquire) {
                sockets.remove_if(&partition, |_, socket| socket.is_generation(generation));
                return Err(Error::ConnectionClosed);
            }
            tracing::debug!(partition = %partition, generation, "Connected to partition");

            tokio::spawn(async move {
                while let Some(message) = receiver.recv().await {
                    handler.handle_partition_message(&partition, message);
                }
                sockets.remove_if(&partition, |_, socket| socket.is_generation(generation));
                tracing::debug!(partition = %partition, generation, "Partition connection closed");
                handler.handle_partition_close(&partition, generation);
            });

            Ok(outbound)
        }
    }

    /// Whether connection `generation` to `partition` is still the open one.
    pub fn is_live(&self, partition: &PartitionId, generation: LinkGeneration) -> bool {
        self.sockets
            .get(partition)
            .is_some_and(|socket| socket.is_generation(generation))
    }

    /// Number of partitions with an established or in-flight connection.
    pub fn connection_count(&self) -> usize {
        self.sockets.len()
    }

    /// Close every connection. Later sends fail with
    /// [`Error::ConnectionClosed`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.sockets.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
