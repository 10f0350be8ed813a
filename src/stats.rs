use std::time::{Duration, Instant};

use crate::ingest::FileStats;
use crate::parallel::FileOutcome;

/// Statistics collected over one loader run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub files_discovered: usize,
    pub files_dispatched: usize,
    pub files_succeeded: usize,
    pub files_failed: usize,
    pub lines_read: usize,
    pub lines_invalid: usize,
    pub records_written: usize,
    pub processing_time: Duration,
    pub start_time: Option<Instant>,
}

impl RunSummary {
    pub fn new(files_discovered: usize) -> Self {
        Self {
            files_discovered,
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    /// Fold one file outcome into the totals
    pub fn record_outcome(&mut self, outcome: &FileOutcome) {
        if outcome.is_success() {
            self.files_succeeded += 1;
        } else {
            self.files_failed += 1;
        }
        self.add_file_stats(&outcome.stats);
    }

    fn add_file_stats(&mut self, stats: &FileStats) {
        self.lines_read += stats.total_lines;
        self.lines_invalid += stats.invalid_lines;
        self.records_written += stats.records_written;
    }

    pub fn finish_processing(&mut self) {
        if let Some(start) = self.start_time {
            self.processing_time = start.elapsed();
        }
    }

    /// Files discovered but never handed to a worker
    pub fn files_skipped(&self) -> usize {
        self.files_discovered.saturating_sub(self.files_dispatched)
    }

    pub fn format_stats(&self, dry_run: bool) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "Files: {} found, {} processed, {} failed",
            self.files_discovered, self.files_succeeded, self.files_failed
        ));

        let skipped = self.files_skipped();
        if skipped > 0 {
            output.push_str(&format!(", {} skipped", skipped));
        }

        output.push_str(&format!(
            "; Lines: {} total, {} invalid",
            self.lines_read, self.lines_invalid
        ));

        if dry_run {
            output.push_str("; Records: dry run, nothing written");
        } else {
            output.push_str(&format!("; Records: {} written", self.records_written));
        }

        let processing_time_ms = self.processing_time.as_millis();
        output.push_str(&format!(" in {}ms", processing_time_ms));

        if processing_time_ms > 0 && self.lines_read > 0 {
            let lines_per_sec = (self.lines_read as f64 * 1000.0) / processing_time_ms as f64;
            output.push_str(&format!(" ({:.0} lines/s)", lines_per_sec));
        }

        output
    }
}
