// CLI-specific types and structures
// This module contains the command-line interface definitions and parsing logic

use clap::Parser;
use std::time::Duration;

pub const DEFAULT_PATTERN: &str = "/data/appsinstalled/*.tsv.gz";
pub const DEFAULT_IDFA_ADDR: &str = "127.0.0.1:33013";
pub const DEFAULT_GAID_ADDR: &str = "127.0.0.1:33014";
pub const DEFAULT_ADID_ADDR: &str = "127.0.0.1:33015";
pub const DEFAULT_DVID_ADDR: &str = "127.0.0.1:33016";

// CLI structure - contains all command-line arguments and options
#[derive(Parser, Debug, Clone)]
#[command(name = "memload")]
#[command(about = "Bulk-load installed-app records from compressed TSV files into sharded memcached")]
#[command(
    long_about = "Bulk-load installed-app records from compressed TSV files into sharded memcached\n\nEach input line is `type<TAB>id<TAB>lat<TAB>lon<TAB>apps`. Records are routed to one of\nfour backends (idfa, gaid, adid, dvid, in that order) by the first byte of the normalized\ndevice id and stored as `<id>:<file name>` -> `<lat>,<lon>`.\n\nEXAMPLES:\n  memload --pattern '/data/appsinstalled/*.tsv.gz'\n  memload --dry --debug --pattern 'sample/*.tsv.gz'\n  memload --workers 8 --timeout 10m"
)]
#[command(version)]
#[command(args_override_self = true)]
pub struct Cli {
    /// Glob pattern selecting the input files
    #[arg(long, default_value = DEFAULT_PATTERN, help_heading = "Input Options")]
    pub pattern: String,

    /// Backend for idfa records (shard 0)
    #[arg(long, value_name = "HOST:PORT", default_value = DEFAULT_IDFA_ADDR, help_heading = "Backend Options")]
    pub idfa: String,

    /// Backend for gaid records (shard 1)
    #[arg(long, value_name = "HOST:PORT", default_value = DEFAULT_GAID_ADDR, help_heading = "Backend Options")]
    pub gaid: String,

    /// Backend for adid records (shard 2)
    #[arg(long, value_name = "HOST:PORT", default_value = DEFAULT_ADID_ADDR, help_heading = "Backend Options")]
    pub adid: String,

    /// Backend for dvid records (shard 3)
    #[arg(long, value_name = "HOST:PORT", default_value = DEFAULT_DVID_ADDR, help_heading = "Backend Options")]
    pub dvid: String,

    /// Connection attempts per backend before giving up
    #[arg(long = "connect-retries", default_value_t = 3, help_heading = "Backend Options")]
    pub connect_retries: u32,

    /// Connect and I/O timeout for backend calls (e.g. 500ms, 2s)
    #[arg(
        long = "backend-timeout",
        default_value = "500ms",
        value_parser = parse_duration,
        help_heading = "Backend Options"
    )]
    pub backend_timeout: Duration,

    /// Parse and route everything but skip backend writes (intended writes are logged at debug)
    #[arg(long, help_heading = "Processing Options")]
    pub dry: bool,

    /// Number of files processed concurrently
    #[arg(long, default_value_t = 5, help_heading = "Processing Options")]
    pub workers: usize,

    /// Stop dispatching new files after this long (e.g. 90s, 5m)
    #[arg(
        long,
        default_value = "5m",
        value_parser = parse_duration,
        help_heading = "Processing Options"
    )]
    pub timeout: Duration,

    /// Reject a file when more than this share of its lines is invalid
    #[arg(long = "max-invalid-rate", default_value_t = 0.2, help_heading = "Processing Options")]
    pub max_invalid_rate: f64,

    /// Verbose diagnostics
    #[arg(long, help_heading = "Output Options", conflicts_with = "quiet")]
    pub debug: bool,

    /// Silence diagnostics (exit code still reports the result)
    #[arg(short = 'q', long, help_heading = "Output Options")]
    pub quiet: bool,
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    humantime::parse_duration(s.trim())
        .map_err(|e| format!("invalid duration '{}': {} (examples: 500ms, 30s, 5m)", s, e))
}
