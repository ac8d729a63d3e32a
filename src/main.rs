//! Single-node broker.
//!
//! ```bash
//! INITIAL_CLUSTER_METADATA='{"topics":[{"name":"test","partitions":[{"index":0}]}]}' \
//!     cargo run
//! ```
//!
//! Set `DATA_PATH` to keep partitions on disk, and `LOG_FORMAT=json` for
//! JSON logs. See [`chunklog::config`] for every variable.

use std::sync::Arc;
use std::time::Duration;

use chunklog::config::BrokerConfig;
use chunklog::log::SlateStoreProvider;
use chunklog::metadata::MetadataDirectory;
use chunklog::partition::PartitionRegistry;
use chunklog::server::KafkaServer;
use chunklog::telemetry::{LogFormat, init_logging};
use tracing::info;

const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(LogFormat::from_env()).map_err(|e| -> Box<dyn std::error::Error> { e })?;

    let config = BrokerConfig::from_env()?;
    if let Err(errors) = config.validate() {
        for error in &errors {
            tracing::error!(error = %error, "Invalid configuration");
        }
        return Err(format!("invalid configuration: {}", errors.join("; ")).into());
    }

    let stores = match &config.data_path {
        Some(path) => SlateStoreProvider::local(path)?,
        None => SlateStoreProvider::in_memory(),
    }
    .with_flush_interval(Duration::from_millis(config.flush_interval_ms));

    info!(
        bind = %config.bind_addr(),
        hostname = %config.hostname,
        chunk_size = config.chunk_size,
        data_path = ?config.data_path,
        flush_interval_ms = config.flush_interval_ms,
        topics = config.cluster.topics.len(),
        "Starting broker"
    );

    let registry = Arc::new(PartitionRegistry::new(Arc::new(stores), config.chunk_size));
    let metadata = Arc::new(MetadataDirectory::new(
        config.hostname.clone(),
        config.port,
        config.cluster.clone(),
    ));
    let server = KafkaServer::with_config(
        &config.bind_addr(),
        registry,
        metadata,
        config.max_connections,
        config.max_message_size,
    )
    .await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            server.shutdown_and_wait(SHUTDOWN_DRAIN_TIMEOUT).await;
        }
    }

    Ok(())
}
