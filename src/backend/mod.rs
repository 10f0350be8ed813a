//! Key-value backends
//!
//! The ingestor only needs `set(key, value)` on a handle that is safe to call
//! from several workers at once. [`KvStore`] is that seam; [`MemcacheClient`]
//! is the production implementation and [`connect`] builds the shard list.
//!
//! # Module Structure
//!
//! - `memcache`: memcached text-protocol client with a small idle pool
//! - `connect`: retrying connection manager for the configured shards

mod connect;
mod memcache;

use std::io;
use std::sync::Arc;

use thiserror::Error;

pub use connect::{connect_shards, connect_with_retry, ConnectError, ConnectPolicy};
pub use memcache::MemcacheClient;

/// A write-only view of one shard
pub trait KvStore: Send + Sync {
    /// Store `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &[u8]) -> Result<(), BackendError>;

    /// Address used in diagnostics
    fn address(&self) -> &str;
}

/// Shard handle shared by all workers for the lifetime of the run
pub type SharedStore = Arc<dyn KvStore>;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("cannot resolve backend address {address}: {source}")]
    Resolve { address: String, source: io::Error },

    #[error("backend address {0} resolved to nothing")]
    NoAddress(String),

    #[error("connection to {address} failed: {source}")]
    Connect { address: String, source: io::Error },

    #[error("malformed key {0:?}")]
    MalformedKey(String),

    #[error("i/o error talking to {address}: {source}")]
    Io { address: String, source: io::Error },

    #[error("{address} rejected write: {reply}")]
    Rejected { address: String, reply: String },
}
