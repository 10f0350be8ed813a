use anyhow::Result;
use clap::Parser;
use std::sync::Arc;

use memload::logging::{init_tracing, make_logger, Logger};
use memload::platform::{CancelSignal, ExitCode, SignalHandler};
use memload::runner;
use memload::{Cli, IngestConfig};

fn main() -> Result<()> {
    // Usage errors exit with status 2 from inside clap
    let cli = Cli::parse();

    let config = match IngestConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("memload: Error: {}", e);
            ExitCode::InvalidUsage.exit();
        }
    };

    if !cli.quiet {
        init_tracing(cli.debug)?;
    }
    let logger = make_logger(cli.quiet);

    // Cancellation latch shared by the signal handler, the deadline and dispatch
    let cancel = CancelSignal::new();
    let _signal_handler = match SignalHandler::new(cancel.clone(), Arc::clone(&logger)) {
        Ok(handler) => handler,
        Err(e) => {
            eprintln!("memload: Error: failed to initialize signal handling: {}", e);
            ExitCode::GeneralError.exit();
        }
    };

    if config.processing.dry_run {
        logger.info(format_args!("Dry run: no records will be written"));
    }

    match runner::run(&config, &cancel, logger) {
        Ok(report) => report.status.exit_code().exit(),
        Err(e) => {
            eprintln!("memload: Error: {}", e);
            e.exit_code().exit();
        }
    }
}
