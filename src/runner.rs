//! Run orchestration
//!
//! Discovers the input files, connects the shards, feeds one job per file to
//! the worker pool in discovery order and tallies the outcomes. Cancellation
//! (deadline or interrupt) only stops further dispatch; files already handed
//! to a worker still reach a terminal state.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::backend::{connect_shards, ConnectError, SharedStore};
use crate::config::{IngestConfig, ProcessingConfig};
use crate::logging::Logger;
use crate::parallel::{Dispatch, Job, WorkerPool};
use crate::platform::{CancelReason, CancelSignal, Deadline, ExitCode};
use crate::stats::RunSummary;

/// Fatal, run-level failures
#[derive(Debug, Error)]
pub enum RunError {
    #[error("no files found matching {pattern}")]
    NoFilesFound { pattern: String },

    #[error("invalid file pattern {pattern}: {source}")]
    BadPattern {
        pattern: String,
        source: glob::PatternError,
    },

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("failed to start background thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("{count} worker(s) panicked; {lost} file(s) have no outcome")]
    WorkerPanicked { count: usize, lost: usize },
}

impl RunError {
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::GeneralError
    }
}

/// How a run that got as far as dispatching ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// At least one file was fully processed
    Completed,
    /// Every dispatched file failed
    NothingSucceeded,
    /// Dispatch was cut short and no file succeeded
    Aborted(CancelReason),
}

impl RunStatus {
    pub fn exit_code(self) -> ExitCode {
        match self {
            RunStatus::Completed => ExitCode::Success,
            RunStatus::NothingSucceeded => ExitCode::GeneralError,
            RunStatus::Aborted(CancelReason::Timeout) => ExitCode::Timeout,
            RunStatus::Aborted(CancelReason::Interrupted) => ExitCode::SignalInt,
        }
    }
}

#[derive(Debug)]
pub struct RunReport {
    pub status: RunStatus,
    pub summary: RunSummary,
}

/// Expand `pattern` into regular files, sorted by path
pub fn discover_files(pattern: &str, logger: &dyn Logger) -> Result<Vec<PathBuf>, RunError> {
    let entries = glob::glob(pattern).map_err(|source| RunError::BadPattern {
        pattern: pattern.to_string(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(path) => logger.debug(format_args!("Skipping non-file {}", path.display())),
            Err(e) => logger.warn(format_args!("Cannot read {}: {}", e.path().display(), e.error())),
        }
    }

    if files.is_empty() {
        return Err(RunError::NoFilesFound {
            pattern: pattern.to_string(),
        });
    }

    files.sort();
    Ok(files)
}

/// Drive one complete run
pub fn run(
    config: &IngestConfig,
    cancel: &CancelSignal,
    logger: Arc<dyn Logger>,
) -> Result<RunReport, RunError> {
    let files = discover_files(&config.input.pattern, logger.as_ref())?;
    logger.info(format_args!(
        "Found {} files matching {}",
        files.len(),
        config.input.pattern
    ));

    let shards = connect_shards(
        &config.backend.addresses,
        &config.connect_policy(),
        logger.as_ref(),
    )?;

    let deadline = Deadline::arm(config.processing.timeout, cancel.clone(), Arc::clone(&logger))
        .map_err(RunError::Spawn)?;
    let result = run_files(files, shards, &config.processing, cancel, Arc::clone(&logger));
    deadline.disarm();

    let report = result?;
    logger.info(format_args!(
        "{}",
        report.summary.format_stats(config.processing.dry_run)
    ));
    Ok(report)
}

/// Dispatch `files` to a fresh worker pool and collect the outcomes
pub fn run_files(
    files: Vec<PathBuf>,
    shards: Arc<[SharedStore]>,
    processing: &ProcessingConfig,
    cancel: &CancelSignal,
    logger: Arc<dyn Logger>,
) -> Result<RunReport, RunError> {
    let mut summary = RunSummary::new(files.len());
    let pool =
        WorkerPool::spawn(processing.pool_config(), Arc::clone(&logger)).map_err(RunError::Spawn)?;

    let mut cut_short = false;
    for (index, path) in files.into_iter().enumerate() {
        let job = Job {
            path,
            index,
            dry_run: processing.dry_run,
            max_invalid_rate: processing.max_invalid_rate,
            shards: Arc::clone(&shards),
        };

        match pool.submit(job, cancel) {
            Dispatch::Queued => summary.files_dispatched += 1,
            Dispatch::Cancelled => {
                cut_short = true;
                logger.error(format_args!(
                    "Aborted ({}): {} of {} files were not started",
                    cancel.reason().unwrap_or(CancelReason::Interrupted),
                    summary.files_discovered - index,
                    summary.files_discovered
                ));
                break;
            }
            Dispatch::Closed => {
                logger.error(format_args!("All workers have exited, dispatch stopped"));
                break;
            }
        }
    }

    let report = pool.close_and_drain();
    for outcome in &report.outcomes {
        summary.record_outcome(outcome);
    }
    summary.finish_processing();

    if report.panicked > 0 {
        return Err(RunError::WorkerPanicked {
            count: report.panicked,
            lost: summary.files_dispatched - report.outcomes.len(),
        });
    }

    let status = if summary.files_succeeded > 0 {
        RunStatus::Completed
    } else if cut_short {
        RunStatus::Aborted(cancel.reason().unwrap_or(CancelReason::Interrupted))
    } else {
        RunStatus::NothingSucceeded
    };

    if status != RunStatus::Completed {
        logger.error(format_args!("No files processed"));
    }

    Ok(RunReport { status, summary })
}
