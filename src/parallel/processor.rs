//! Worker pool
//!
//! Owns the job queue, the outcome channel and the worker threads. Dispatch
//! blocks while the queue is full and wakes up early when the run is
//! cancelled, so no new file is started after a timeout or interrupt.

use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};
use std::io;
use std::sync::Arc;
use std::thread;

use crate::logging::Logger;
use crate::platform::CancelSignal;

use super::types::{FileOutcome, Job, PoolConfig};
use super::worker::worker_thread;

/// Result of handing one job to the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Queued,
    /// The run was cancelled before the job could be queued
    Cancelled,
    /// Every worker has exited; the job was not queued
    Closed,
}

/// Everything collected after the queue has been closed
#[derive(Debug, Default)]
pub struct DrainReport {
    pub outcomes: Vec<FileOutcome>,
    /// Worker threads that terminated by panicking
    pub panicked: usize,
}

/// Fixed set of worker threads fed through a bounded queue
pub struct WorkerPool {
    job_sender: Sender<Job>,
    outcome_receiver: Receiver<FileOutcome>,
    handles: Vec<thread::JoinHandle<()>>,
    logger: Arc<dyn Logger>,
}

impl WorkerPool {
    pub fn spawn(config: PoolConfig, logger: Arc<dyn Logger>) -> io::Result<Self> {
        let (job_sender, job_receiver) = bounded::<Job>(config.queue_bound.max(1));
        let (outcome_sender, outcome_receiver) = unbounded::<FileOutcome>();

        let mut handles = Vec::with_capacity(config.num_workers);
        for worker_id in 0..config.num_workers.max(1) {
            let job_receiver = job_receiver.clone();
            let outcome_sender = outcome_sender.clone();
            let worker_logger = Arc::clone(&logger);

            let handle = thread::Builder::new()
                .name(format!("memload-worker-{}", worker_id))
                .spawn(move || {
                    worker_thread(worker_id, job_receiver, outcome_sender, worker_logger)
                })?;
            handles.push(handle);
        }

        // Workers hold the only remaining clones
        drop(job_receiver);
        drop(outcome_sender);

        logger.debug(format_args!("Started {} workers", handles.len()));

        Ok(Self {
            job_sender,
            outcome_receiver,
            handles,
            logger,
        })
    }

    pub fn num_workers(&self) -> usize {
        self.handles.len()
    }

    /// Queue a job, waiting for space. Returns early if `cancel` fires
    /// while waiting.
    pub fn submit(&self, job: Job, cancel: &CancelSignal) -> Dispatch {
        if cancel.is_cancelled() {
            return Dispatch::Cancelled;
        }

        select! {
            send(self.job_sender, job) -> res => match res {
                Ok(()) => Dispatch::Queued,
                Err(_) => Dispatch::Closed,
            },
            recv(cancel.receiver()) -> _ => Dispatch::Cancelled,
        }
    }

    /// Close the queue, let workers finish what was already queued, and
    /// collect every published outcome.
    pub fn close_and_drain(self) -> DrainReport {
        let WorkerPool {
            job_sender,
            outcome_receiver,
            handles,
            logger,
        } = self;

        drop(job_sender);

        // Ends once every worker has dropped its sender
        let outcomes: Vec<FileOutcome> = outcome_receiver.iter().collect();

        let mut panicked = 0;
        for handle in handles {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                logger.error(format_args!("{} panicked", name));
                panicked += 1;
            }
        }

        DrainReport { outcomes, panicked }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::{as_shards, RecordingStore};
    use crate::backend::{BackendError, KvStore, SharedStore};
    use crate::logging::NullLogger;
    use crate::platform::CancelReason;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::fs::File;
    use std::io::Write;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;

    fn write_gz(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::fast());
        encoder.write_all(content.as_bytes()).unwrap();
        encoder.finish().unwrap();
        path
    }

    fn job(path: PathBuf, index: usize, shards: Arc<[SharedStore]>) -> Job {
        Job {
            path,
            index,
            dry_run: false,
            max_invalid_rate: 0.2,
            shards,
        }
    }

    struct PanickingStore;

    /// Takes 10ms per write
    struct SlowStore;

    impl KvStore for SlowStore {
        fn set(&self, _key: &str, _value: &[u8]) -> Result<(), BackendError> {
            thread::sleep(Duration::from_millis(10));
            Ok(())
        }

        fn address(&self) -> &str {
            "slow:0"
        }
    }

    impl KvStore for PanickingStore {
        fn set(&self, _key: &str, _value: &[u8]) -> Result<(), BackendError> {
            panic!("store exploded");
        }

        fn address(&self) -> &str {
            "panic:0"
        }
    }

    #[test]
    fn test_every_queued_job_yields_one_outcome() {
        let dir = TempDir::new().unwrap();
        let store = RecordingStore::new("shard-0");
        let shards = as_shards(&[Arc::clone(&store)]);
        let pool = WorkerPool::spawn(PoolConfig::with_workers(3), Arc::new(NullLogger)).unwrap();
        let cancel = CancelSignal::new();

        for i in 0..10 {
            let path = write_gz(&dir, &format!("{}.tsv.gz", i), &format!("idfa\tu{}\t1\t2\t3\n", i));
            assert_eq!(pool.submit(job(path, i, Arc::clone(&shards)), &cancel), Dispatch::Queued);
        }

        let report = pool.close_and_drain();
        assert_eq!(report.panicked, 0);
        assert_eq!(report.outcomes.len(), 10);
        assert!(report.outcomes.iter().all(FileOutcome::is_success));

        let mut indices: Vec<usize> = report.outcomes.iter().map(|o| o.index).collect();
        indices.sort_unstable();
        assert_eq!(indices, (0..10).collect::<Vec<_>>());
        assert_eq!(store.writes().len(), 10);
    }

    #[test]
    fn test_submit_after_cancel_is_refused() {
        let dir = TempDir::new().unwrap();
        let shards = as_shards(&[RecordingStore::new("shard-0")]);
        let pool = WorkerPool::spawn(PoolConfig::with_workers(1), Arc::new(NullLogger)).unwrap();
        let cancel = CancelSignal::new();
        cancel.cancel(CancelReason::Interrupted);

        let path = write_gz(&dir, "a.tsv.gz", "idfa\tu\t1\t2\t3\n");
        assert_eq!(pool.submit(job(path, 0, shards), &cancel), Dispatch::Cancelled);

        let report = pool.close_and_drain();
        assert!(report.outcomes.is_empty());
    }

    #[test]
    fn test_blocked_submit_wakes_on_cancel() {
        let dir = TempDir::new().unwrap();
        let shards: Arc<[SharedStore]> = vec![Arc::new(SlowStore) as SharedStore].into();
        let pool = WorkerPool::spawn(
            PoolConfig {
                num_workers: 1,
                queue_bound: 1,
            },
            Arc::new(NullLogger),
        )
        .unwrap();
        let cancel = CancelSignal::new();

        let content: String = (0..10).map(|i| format!("idfa\tu{}\t1\t2\t3\n", i)).collect();
        let paths: Vec<PathBuf> = (0..6)
            .map(|i| write_gz(&dir, &format!("{}.tsv.gz", i), &content))
            .collect();

        let canceller = {
            let cancel = cancel.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                cancel.cancel(CancelReason::Timeout);
            })
        };

        // One file in flight, one queued, the third send blocks
        let mut results = Vec::new();
        for (i, path) in paths.into_iter().enumerate() {
            let dispatch = pool.submit(job(path, i, Arc::clone(&shards)), &cancel);
            results.push(dispatch);
            if dispatch != Dispatch::Queued {
                break;
            }
        }
        canceller.join().unwrap();

        assert_eq!(results.last(), Some(&Dispatch::Cancelled));
        let queued = results.iter().filter(|d| **d == Dispatch::Queued).count();
        assert!(queued < 6);

        let report = pool.close_and_drain();
        // In-flight and already queued files still complete
        assert_eq!(report.outcomes.len(), queued);
        assert!(report.outcomes.iter().all(FileOutcome::is_success));
    }

    #[test]
    fn test_worker_panic_is_reported() {
        let dir = TempDir::new().unwrap();
        let shards: Arc<[SharedStore]> = vec![Arc::new(PanickingStore) as SharedStore].into();
        let pool = WorkerPool::spawn(PoolConfig::with_workers(2), Arc::new(NullLogger)).unwrap();
        let cancel = CancelSignal::new();

        let path = write_gz(&dir, "a.tsv.gz", "idfa\tu\t1\t2\t3\n");
        assert_eq!(pool.submit(job(path, 0, shards), &cancel), Dispatch::Queued);

        let report = pool.close_and_drain();
        assert_eq!(report.panicked, 1);
        assert!(report.outcomes.is_empty());
    }

    #[test]
    fn test_worker_threads_are_named() {
        let pool = WorkerPool::spawn(PoolConfig::with_workers(2), Arc::new(NullLogger)).unwrap();
        let names: Vec<String> = pool
            .handles
            .iter()
            .filter_map(|h| h.thread().name().map(str::to_string))
            .collect();
        assert_eq!(names, vec!["memload-worker-0", "memload-worker-1"]);
        assert_eq!(pool.num_workers(), 2);
        pool.close_and_drain();
    }
}
