//! Key-value stores backing partition logs.
//!
//! Every partition log owns one store. The only write primitive is an atomic
//! batch, which is how a cursor update and the chunks it describes are made
//! durable together.
//!
//! # Backends
//!
//! - [`SlateStore`]: a SlateDB database per partition, over any
//!   [`ObjectStore`]: a local directory for durable brokers or
//!   [`InMemory`] for ephemeral ones. Batches are written with
//!   `await_durable`, so an acknowledged append survives a restart.
//! - [`MemoryStore`]: a plain map, for tests.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use object_store::ObjectStore;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use slatedb::Db;
use slatedb::config::{Settings as SlateDbSettings, WriteOptions};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::constants::DEFAULT_FLUSH_INTERVAL_MS;
use crate::error::{Error, Result};
use crate::log::keys::partition_dir_name;
use crate::types::PartitionId;

const DURABLE_WRITE_OPTIONS: WriteOptions = WriteOptions {
    await_durable: true,
};

/// A set of puts applied atomically.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    entries: Vec<(Bytes, Bytes)>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<Bytes>, value: Bytes) {
        self.entries.push((key.into(), value));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Durable key-value storage for one partition.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &[u8]) -> Result<Option<Bytes>>;

    /// Apply every put in `batch`, or none of them.
    async fn write_batch(&self, batch: WriteBatch) -> Result<()>;

    /// Flush and release the store. No further calls are made after this.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Opens the store of a partition.
#[async_trait]
pub trait StoreProvider: Send + Sync {
    async fn open(&self, partition: &PartitionId) -> Result<Arc<dyn KvStore>>;
}

/// Map-backed store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<Bytes, Bytes>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn write_batch(&self, batch: WriteBatch) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.extend(batch.entries);
        Ok(())
    }
}

/// Hands out one [`MemoryStore`] per partition and keeps it for the life of
/// the provider, so a restarted partition sees its earlier writes.
#[derive(Debug, Default)]
pub struct MemoryStoreProvider {
    stores: DashMap<PartitionId, Arc<MemoryStore>>,
}

impl MemoryStoreProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StoreProvider for MemoryStoreProvider {
    async fn open(&self, partition: &PartitionId) -> Result<Arc<dyn KvStore>> {
        let store = self
            .stores
            .entry(partition.clone())
            .or_insert_with(|| Arc::new(MemoryStore::new()))
            .clone();
        Ok(store)
    }
}

/// A partition store held in SlateDB.
pub struct SlateStore {
    db: Db,
    path: String,
}

impl SlateStore {
    /// Open (or create) the database at `path` within `object_store`.
    pub async fn open(
        object_store: Arc<dyn ObjectStore>,
        path: impl Into<String>,
        flush_interval: Duration,
    ) -> Result<Self> {
        let path = path.into();
        let settings = SlateDbSettings {
            flush_interval: Some(flush_interval),
            ..SlateDbSettings::default()
        };
        let db = Db::builder(ObjectPath::from(path.as_str()), object_store)
            .with_settings(settings)
            .build()
            .await?;
        tracing::debug!(path = %path, "Opened partition database");
        Ok(Self { db, path })
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

#[async_trait]
impl KvStore for SlateStore {
    async fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        Ok(self.db.get(key).await?)
    }

    async fn write_batch(&self, batch: WriteBatch) -> Result<()> {
        let mut writes = slatedb::WriteBatch::new();
        for (key, value) in &batch.entries {
            writes.put(key, value);
        }
        self.db
            .write_with_options(writes, &DURABLE_WRITE_OPTIONS)
            .await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        tracing::debug!(path = %self.path, "Closing partition database");
        self.db.close().await?;
        Ok(())
    }
}

/// Opens one [`SlateStore`] per partition inside a shared object store.
#[derive(Debug, Clone)]
pub struct SlateStoreProvider {
    object_store: Arc<dyn ObjectStore>,
    flush_interval: Duration,
}

impl SlateStoreProvider {
    pub fn new(object_store: Arc<dyn ObjectStore>) -> Self {
        Self {
            object_store,
            flush_interval: Duration::from_millis(DEFAULT_FLUSH_INTERVAL_MS),
        }
    }

    /// Partitions stored under the local directory `root`, which is created
    /// if missing.
    pub fn local(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        std::fs::create_dir_all(root)?;
        let store = LocalFileSystem::new_with_prefix(root)?;
        tracing::info!(path = %root.display(), "Using local object store");
        Ok(Self::new(Arc::new(store)))
    }

    /// Partitions held in process memory, lost on exit.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()))
    }

    /// How often SlateDB flushes its write-ahead log, which bounds how long
    /// a durable write waits.
    pub fn with_flush_interval(mut self, flush_interval: Duration) -> Self {
        self.flush_interval = flush_interval;
        self
    }
}

#[async_trait]
impl StoreProvider for SlateStoreProvider {
    async fn open(&self, partition: &PartitionId) -> Result<Arc<dyn KvStore>> {
        let store = SlateStore::open(
            self.object_store.clone(),
            partition_dir_name(partition),
            self.flush_interval,
        )
        .await?;
        Ok(Arc::new(store))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(pairs: &[(&'static [u8], &'static [u8])]) -> WriteBatch {
        let mut batch = WriteBatch::new();
        for (k, v) in pairs {
            batch.put(Bytes::from_static(*k), Bytes::from_static(*v));
        }
        batch
    }

    fn fast(provider: SlateStoreProvider) -> SlateStoreProvider {
        provider.with_flush_interval(Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_memory_store_batch() {
        let store = MemoryStore::new();
        assert_eq!(store.get(b"a").await.unwrap(), None);
        store
            .write_batch(batch(&[(b"a", b"1"), (b"b", b"2")]))
            .await
            .unwrap();
        store.write_batch(batch(&[(b"a", b"3")])).await.unwrap();
        assert_eq!(store.get(b"a").await.unwrap().unwrap().as_ref(), b"3");
        assert_eq!(store.get(b"b").await.unwrap().unwrap().as_ref(), b"2");
    }

    #[tokio::test]
    async fn test_memory_provider_reuses_store() {
        let provider = MemoryStoreProvider::new();
        let id = PartitionId::new("t", 0);
        provider
            .open(&id)
            .await
            .unwrap()
            .write_batch(batch(&[(b"k", b"v")]))
            .await
            .unwrap();
        let reopened = provider.open(&id).await.unwrap();
        assert!(reopened.get(b"k").await.unwrap().is_some());
        let other = provider.open(&PartitionId::new("t", 1)).await.unwrap();
        assert!(other.get(b"k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_slate_store_batch_overwrites() {
        let provider = fast(SlateStoreProvider::in_memory());
        let store = provider.open(&PartitionId::new("t", 0)).await.unwrap();

        store
            .write_batch(batch(&[(b"x", b"1"), (b"y", b"2")]))
            .await
            .unwrap();
        store.write_batch(batch(&[(b"x", b"9")])).await.unwrap();
        assert_eq!(store.get(b"x").await.unwrap().unwrap().as_ref(), b"9");
        assert_eq!(store.get(b"y").await.unwrap().unwrap().as_ref(), b"2");
        assert_eq!(store.get(b"z").await.unwrap(), None);
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_slate_partitions_are_isolated() {
        let provider = fast(SlateStoreProvider::in_memory());
        let zero = provider.open(&PartitionId::new("t", 0)).await.unwrap();
        let one = provider.open(&PartitionId::new("t", 1)).await.unwrap();

        zero.write_batch(batch(&[(b"k", b"zero")])).await.unwrap();
        assert!(one.get(b"k").await.unwrap().is_none());

        zero.close().await.unwrap();
        one.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_local_slate_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let partition = PartitionId::new("t", 0);
        {
            let provider = fast(SlateStoreProvider::local(dir.path()).unwrap());
            let store = provider.open(&partition).await.unwrap();
            store
                .write_batch(batch(&[(b"x", b"1"), (b"y", b"2")]))
                .await
                .unwrap();
            store.write_batch(batch(&[(b"x", b"9")])).await.unwrap();
            store.close().await.unwrap();
        }

        let provider = fast(SlateStoreProvider::local(dir.path()).unwrap());
        let store = provider.open(&partition).await.unwrap();
        assert_eq!(store.get(b"x").await.unwrap().unwrap().as_ref(), b"9");
        assert_eq!(store.get(b"y").await.unwrap().unwrap().as_ref(), b"2");
        store.close().await.unwrap();
    }
}
