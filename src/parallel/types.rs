//! Type definitions for parallel processing
//!
//! Contains the unit of work handed to workers, the outcome they publish,
//! and pool configuration.

use std::path::PathBuf;
use std::sync::Arc;

use crate::backend::SharedStore;
use crate::ingest::{FileError, FileStats};

/// Default number of concurrent file workers
pub const DEFAULT_WORKERS: usize = 5;

/// Configuration for the worker pool
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub num_workers: usize,
    /// Job queue capacity; dispatch blocks (and polls cancellation) when full
    pub queue_bound: usize,
}

impl PoolConfig {
    pub fn with_workers(num_workers: usize) -> Self {
        let num_workers = num_workers.max(1);
        Self {
            num_workers,
            queue_bound: num_workers,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::with_workers(DEFAULT_WORKERS)
    }
}

/// One input file to ingest
#[derive(Clone)]
pub struct Job {
    pub path: PathBuf,
    /// Position in discovery order, for diagnostics only
    pub index: usize,
    pub dry_run: bool,
    pub max_invalid_rate: f64,
    pub shards: Arc<[SharedStore]>,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("path", &self.path)
            .field("index", &self.index)
            .field("dry_run", &self.dry_run)
            .field("max_invalid_rate", &self.max_invalid_rate)
            .field("shards", &self.shards.len())
            .finish()
    }
}

/// Terminal result of one job, published exactly once per dequeued job
#[derive(Debug)]
pub struct FileOutcome {
    pub index: usize,
    pub path: PathBuf,
    pub stats: FileStats,
    /// Processed line count on success
    pub result: Result<usize, FileError>,
}

impl FileOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}
