//! Per-partition log storage engine.
//!
//! - [`framer`]: validates produce payloads and stamps offsets.
//! - [`chunk`]: fixed-capacity chunks and the filler that splits frames
//!   across them.
//! - [`cursor`]: the persisted write position.
//! - [`fetch_waiter`]: long-poll fetch state.
//! - [`partition`]: the log itself.
//! - [`store`] and [`keys`]: key-value storage and its key layout.

pub mod chunk;
pub mod cursor;
pub mod fetch_waiter;
pub mod framer;
pub mod keys;
pub mod partition;
pub mod store;

pub use chunk::{Chunk, ChunkFiller, Frame};
pub use cursor::Cursor;
pub use fetch_waiter::{ConnectionId, FetchId, PendingFetch};
pub use framer::prepare_message_set;
pub use partition::PartitionLog;
pub use store::{
    KvStore, MemoryStore, MemoryStoreProvider, SlateStore, SlateStoreProvider, StoreProvider,
    WriteBatch,
};
