//! Kafka v0 client-facing server.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use chunklog::log::MemoryStoreProvider;
//! use chunklog::metadata::{ClusterMetadata, MetadataDirectory};
//! use chunklog::partition::PartitionRegistry;
//! use chunklog::server::KafkaServer;
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = Arc::new(PartitionRegistry::new(
//!         Arc::new(MemoryStoreProvider::new()),
//!         64 * 1024,
//!     ));
//!     let metadata = Arc::new(MetadataDirectory::new(
//!         "127.0.0.1",
//!         9092,
//!         ClusterMetadata::default(),
//!     ));
//!     let server = KafkaServer::new("127.0.0.1:9092", registry, metadata)
//!         .await
//!         .unwrap();
//!     server.run().await.unwrap();
//! }
//! ```

mod connection;
pub mod request;
pub mod response;
mod session;

pub use connection::ClientConnection;
pub use session::Session;

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::client::PartitionDialer;
use crate::constants::{DEFAULT_MAX_CONNECTIONS, DEFAULT_MAX_MESSAGE_SIZE};
use crate::error::Result;
use crate::metadata::MetadataDirectory;

/// A Kafka-compatible TCP server with graceful shutdown support.
///
/// Every accepted connection gets its own [`Session`], and with it its own
/// partition connections.
pub struct KafkaServer {
    listener: TcpListener,
    dialer: Arc<dyn PartitionDialer>,
    metadata: Arc<MetadataDirectory>,
    shutdown_tx: broadcast::Sender<()>,
    active_connections: Arc<AtomicUsize>,
    /// 0 disables the cap.
    max_connections: usize,
    max_message_size: usize,
}

impl KafkaServer {
    pub async fn new(
        addr: &str,
        dialer: Arc<dyn PartitionDialer>,
        metadata: Arc<MetadataDirectory>,
    ) -> Result<Self> {
        Self::with_config(
            addr,
            dialer,
            metadata,
            DEFAULT_MAX_CONNECTIONS,
            DEFAULT_MAX_MESSAGE_SIZE,
        )
        .await
    }

    pub async fn with_config(
        addr: &str,
        dialer: Arc<dyn PartitionDialer>,
        metadata: Arc<MetadataDirectory>,
        max_connections: usize,
        max_message_size: usize,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let (shutdown_tx, _) = broadcast::channel(1);

        tracing::info!(
            addr = %addr,
            max_connections,
            max_message_size,
            "Kafka server listening"
        );

        Ok(Self {
            listener,
            dialer,
            metadata,
            shutdown_tx,
            active_connections: Arc::new(AtomicUsize::new(0)),
            max_connections,
            max_message_size,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::SeqCst)
    }

    /// Stop accepting connections. Open connections are left to finish.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        tracing::info!("Shutdown signal sent");
    }

    /// Stop accepting connections and wait up to `timeout` for the open ones
    /// to close. Returns true if they all did.
    pub async fn shutdown_and_wait(&self, timeout: Duration) -> bool {
        self.shutdown();

        let start = Instant::now();
        let check_interval = Duration::from_millis(100);

        while start.elapsed() < timeout {
            let active = self.active_connections();
            if active == 0 {
                tracing::info!("All connections drained");
                return true;
            }
            tracing::debug!(active_connections = active, "Waiting for connections to drain");
            tokio::time::sleep(check_interval).await;
        }

        tracing::warn!(
            remaining_connections = self.active_connections(),
            "Shutdown timeout, connections still active"
        );
        false
    }

    /// Accept connections until [`KafkaServer::shutdown`] is called.
    pub async fn run(&self) -> Result<()> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Server shutting down, no longer accepting connections");
                    return Ok(());
                }
                accept_result = self.listener.accept() => {
                    let (stream, addr) = match accept_result {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            tracing::warn!(error = %e, "Failed to accept connection");
                            continue;
                        }
                    };

                    if self.max_connections > 0 {
                        let current = self.active_connections();
                        if current >= self.max_connections {
                            tracing::warn!(
                                client_addr = %addr,
                                current_connections = current,
                                max_connections = self.max_connections,
                                "Rejecting connection - limit exceeded"
                            );
                            drop(stream);
                            continue;
                        }
                    }

                    if let Err(e) = stream.set_nodelay(true) {
                        tracing::debug!(client_addr = %addr, error = %e, "Failed to set TCP_NODELAY");
                    }

                    tracing::debug!(client_addr = %addr, "Accepted connection");

                    let session = Arc::new(Session::new(self.dialer.clone(), self.metadata.clone()));
                    let active_connections = self.active_connections.clone();
                    let max_message_size = self.max_message_size;
                    active_connections.fetch_add(1, Ordering::SeqCst);

                    tokio::spawn(async move {
                        let conn = ClientConnection::with_max_message_size(stream, addr, max_message_size);
                        if let Err(e) = conn.handle_requests(session).await {
                            tracing::debug!(client_addr = %addr, error = %e, "Connection closed with error");
                        }
                        active_connections.fetch_sub(1, Ordering::SeqCst);
                    });
                }
            }
        }
    }
}
