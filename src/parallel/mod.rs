//! Parallel file processing for memload
//!
//! A fixed pool of worker threads pulls file jobs from a bounded queue and
//! publishes one outcome per job. Files are independent; there is no
//! ordering between them.
//!
//! # Module Structure
//!
//! - `types`: Jobs, outcomes and pool configuration
//! - `worker`: Worker thread loop
//! - `processor`: `WorkerPool` spawning, cancellable dispatch and draining

mod processor;
mod types;
mod worker;

// Re-export public types
pub use processor::{Dispatch, DrainReport, WorkerPool};
pub use types::{FileOutcome, Job, PoolConfig, DEFAULT_WORKERS};
