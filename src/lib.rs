// Core library for the memload bulk loader

pub use cli::Cli;
pub use config::IngestConfig;

pub mod backend;
pub mod cli;
pub mod config;
pub mod decompression;
pub mod ingest;
pub mod logging;
pub mod parallel;
pub mod platform;
pub mod record;
pub mod router;
pub mod runner;
pub mod stats;
