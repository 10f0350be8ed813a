//! File ingestion
//!
//! Streams one compressed input file line by line through the record parser
//! and shard router, writing every valid record to its backend. Bad lines are
//! counted and skipped; the file as a whole fails on any I/O or backend error,
//! or when the share of bad lines exceeds the configured rate.
//!
//! Writes issued before a failure are not rolled back.

use std::fs::File;
use std::io::{self, BufRead};
use std::path::Path;

use thiserror::Error;

use crate::backend::BackendError;
use crate::decompression::DecompressionReader;
use crate::logging::Logger;
use crate::parallel::{FileOutcome, Job};
use crate::record::parse_record;
use crate::router::route;

/// Default share of invalid lines tolerated before a file is rejected
pub const DEFAULT_MAX_INVALID_RATE: f64 = 0.2;

/// File-level terminal failure
#[derive(Debug, Error)]
pub enum FileError {
    #[error("cannot open file: {0}")]
    Open(#[source] io::Error),

    #[error("cannot decompress file: {0}")]
    Decompress(#[source] io::Error),

    #[error("read error at line {line}: {source}")]
    Read { line: usize, source: io::Error },

    #[error("write of key {key} failed at line {line}: {source}")]
    Write {
        line: usize,
        key: String,
        source: BackendError,
    },

    #[error("too many invalid records: {invalid} of {total} lines (limit {max_rate})")]
    TooManyInvalid {
        invalid: usize,
        total: usize,
        max_rate: f64,
    },

    #[error("file contains no lines")]
    Empty,
}

/// Per-file counters, owned by the worker processing the file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileStats {
    pub total_lines: usize,
    pub invalid_lines: usize,
    pub records_written: usize,
}

impl FileStats {
    /// Fraction of invalid lines, or None for an empty file
    pub fn invalid_rate(&self) -> Option<f64> {
        if self.total_lines == 0 {
            None
        } else {
            Some(self.invalid_lines as f64 / self.total_lines as f64)
        }
    }
}

/// Decide whether a fully streamed file counts as processed.
///
/// The threshold is strict: a rate equal to `max_rate` passes. An empty file
/// has no rate and is rejected.
pub fn check_invalid_rate(stats: &FileStats, max_rate: f64) -> Result<(), FileError> {
    match stats.invalid_rate() {
        None => Err(FileError::Empty),
        Some(rate) if rate > max_rate => Err(FileError::TooManyInvalid {
            invalid: stats.invalid_lines,
            total: stats.total_lines,
            max_rate,
        }),
        Some(_) => Ok(()),
    }
}

/// Process one job to a terminal outcome. Never panics on bad input.
pub fn ingest_file(job: &Job, logger: &dyn Logger) -> FileOutcome {
    let mut stats = FileStats::default();
    let result = stream_file(job, &mut stats, logger);

    match &result {
        Ok(processed) => logger.info(format_args!(
            "Processed file {}: {} records, {} invalid",
            job.path.display(),
            processed,
            stats.invalid_lines
        )),
        Err(e) if matches!(e, FileError::TooManyInvalid { .. } | FileError::Empty) => {
            logger.warn(format_args!("Rejected file {}: {}", job.path.display(), e))
        }
        Err(e) => logger.error(format_args!(
            "Failed file {}: {} ({} records written before failure)",
            job.path.display(),
            e,
            stats.records_written
        )),
    }

    FileOutcome {
        index: job.index,
        path: job.path.clone(),
        stats,
        result,
    }
}

fn stream_file(job: &Job, stats: &mut FileStats, logger: &dyn Logger) -> Result<usize, FileError> {
    let display = job.path.display();
    logger.info(format_args!("Processing file {}...", display));

    let file = File::open(&job.path).map_err(FileError::Open)?;
    let mut reader = DecompressionReader::from_file(file).map_err(FileError::Decompress)?;
    let base_name = base_name(&job.path);

    let mut buf = Vec::with_capacity(256);
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(source) => {
                return Err(FileError::Read {
                    line: stats.total_lines + 1,
                    source,
                })
            }
        }

        stats.total_lines += 1;
        let line_num = stats.total_lines;

        let Ok(line) = std::str::from_utf8(&buf) else {
            stats.invalid_lines += 1;
            logger.warn(format_args!(
                "Invalid record in file {} at line {}: not valid UTF-8",
                display, line_num
            ));
            continue;
        };

        let record = match parse_record(line) {
            Ok(record) => record,
            Err(e) => {
                stats.invalid_lines += 1;
                logger.warn(format_args!(
                    "Invalid record in file {} at line {}: {}",
                    display, line_num, e
                ));
                continue;
            }
        };

        let normalized_id = record.normalized_id();
        let shard = route(&normalized_id, &job.shards);
        let key = format!("{}:{}", normalized_id, base_name);
        let value = record.encode_value();

        if job.dry_run {
            logger.debug(format_args!(
                "Dry run: would write key={} value={} to {}",
                key,
                value,
                shard.address()
            ));
            continue;
        }

        if let Err(source) = shard.set(&key, value.as_bytes()) {
            return Err(FileError::Write {
                line: line_num,
                key,
                source,
            });
        }
        stats.records_written += 1;
    }

    check_invalid_rate(stats, job.max_invalid_rate)?;
    Ok(stats.total_lines)
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
