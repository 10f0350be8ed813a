//! Diagnostic output
//!
//! Components receive an `Arc<dyn Logger>` instead of reaching for global
//! macros, so tests can capture or silence diagnostics. The binary wires in
//! [`TracingLogger`] after [`init_tracing`]; `--quiet` selects [`NullLogger`].

use std::fmt;
use std::io::IsTerminal;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Leveled diagnostics sink shared by every worker
pub trait Logger: Send + Sync {
    fn debug(&self, args: fmt::Arguments<'_>);
    fn info(&self, args: fmt::Arguments<'_>);
    fn warn(&self, args: fmt::Arguments<'_>);
    fn error(&self, args: fmt::Arguments<'_>);
}

/// Forwards to the `tracing` macros under the `memload` target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn debug(&self, args: fmt::Arguments<'_>) {
        tracing::debug!(target: "memload", "{}", args);
    }

    fn info(&self, args: fmt::Arguments<'_>) {
        tracing::info!(target: "memload", "{}", args);
    }

    fn warn(&self, args: fmt::Arguments<'_>) {
        tracing::warn!(target: "memload", "{}", args);
    }

    fn error(&self, args: fmt::Arguments<'_>) {
        tracing::error!(target: "memload", "{}", args);
    }
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLogger;

impl Logger for NullLogger {
    fn debug(&self, _args: fmt::Arguments<'_>) {}
    fn info(&self, _args: fmt::Arguments<'_>) {}
    fn warn(&self, _args: fmt::Arguments<'_>) {}
    fn error(&self, _args: fmt::Arguments<'_>) {}
}

/// Pick the logger implementation for the given verbosity flags
pub fn make_logger(quiet: bool) -> Arc<dyn Logger> {
    if quiet {
        Arc::new(NullLogger)
    } else {
        Arc::new(TracingLogger)
    }
}

/// Install the global stderr subscriber. `RUST_LOG` wins over `debug`.
pub fn init_tracing(debug: bool) -> Result<()> {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("memload={}", default_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .with_thread_names(debug)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))
}


#[cfg(test)]
mod tests {
    use super::testing::{Level, RecordingLogger};
    use super::*;

    #[test]
    fn test_null_logger_accepts_everything() {
        let logger = NullLogger;
        logger.debug(format_args!("debug {}", 1));
        logger.info(format_args!("info"));
        logger.warn(format_args!("warn"));
        logger.error(format_args!("error"));
    }

    #[test]
    fn test_recording_logger_separates_levels() {
        let logger = RecordingLogger::new();
        logger.warn(format_args!("line {} bad", 3));
        logger.info(format_args!("done"));

        assert_eq!(logger.messages(Level::Warn), vec!["line 3 bad".to_string()]);
        assert_eq!(logger.messages(Level::Info), vec!["done".to_string()]);
        assert!(logger.messages(Level::Error).is_empty());
    }
}
