use std::time::Duration;

use thiserror::Error;

use crate::backend::ConnectPolicy;
use crate::cli::Cli;
use crate::parallel::PoolConfig;
use crate::record::DeviceType;

/// Main configuration struct for memload
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub input: InputConfig,
    pub backend: BackendConfig,
    pub processing: ProcessingConfig,
}

/// Input configuration
#[derive(Debug, Clone)]
pub struct InputConfig {
    pub pattern: String,
}

/// Backend configuration
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Shard addresses in routing order: idfa, gaid, adid, dvid
    pub addresses: Vec<String>,
    pub connect_retries: u32,
    pub io_timeout: Duration,
}

/// Processing configuration
#[derive(Debug, Clone)]
pub struct ProcessingConfig {
    pub dry_run: bool,
    pub workers: usize,
    pub timeout: Duration,
    pub max_invalid_rate: f64,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("--workers must be at least 1")]
    NoWorkers,

    #[error("--max-invalid-rate must be between 0 and 1, got {0}")]
    InvalidRate(f64),

    #[error("--timeout must be greater than zero")]
    ZeroTimeout,

    #[error("--backend-timeout must be greater than zero")]
    ZeroBackendTimeout,

    #[error("--connect-retries must be at least 1")]
    NoConnectAttempts,

    #[error("--{flag} address must look like HOST:PORT, got {value:?}")]
    BadAddress { flag: &'static str, value: String },

    #[error("--pattern must not be empty")]
    EmptyPattern,
}

impl IngestConfig {
    /// Create configuration from CLI arguments
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let addresses = [
            (DeviceType::Idfa, &cli.idfa),
            (DeviceType::Gaid, &cli.gaid),
            (DeviceType::Adid, &cli.adid),
            (DeviceType::Dvid, &cli.dvid),
        ]
        .into_iter()
        .map(|(device, address)| validate_address(device.as_str(), address))
        .collect::<Result<Vec<_>, _>>()?;

        let config = Self {
            input: InputConfig {
                pattern: cli.pattern.clone(),
            },
            backend: BackendConfig {
                addresses,
                connect_retries: cli.connect_retries,
                io_timeout: cli.backend_timeout,
            },
            processing: ProcessingConfig {
                dry_run: cli.dry,
                workers: cli.workers,
                timeout: cli.timeout,
                max_invalid_rate: cli.max_invalid_rate,
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.input.pattern.trim().is_empty() {
            return Err(ConfigError::EmptyPattern);
        }
        if self.processing.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        let rate = self.processing.max_invalid_rate;
        if !(0.0..=1.0).contains(&rate) {
            return Err(ConfigError::InvalidRate(rate));
        }
        if self.processing.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.backend.io_timeout.is_zero() {
            return Err(ConfigError::ZeroBackendTimeout);
        }
        if self.backend.connect_retries == 0 {
            return Err(ConfigError::NoConnectAttempts);
        }
        Ok(())
    }

    pub fn connect_policy(&self) -> ConnectPolicy {
        ConnectPolicy {
            attempts: self.backend.connect_retries,
            io_timeout: self.backend.io_timeout,
            ..ConnectPolicy::default()
        }
    }
}

impl ProcessingConfig {
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig::with_workers(self.workers)
    }
}

fn validate_address(flag: &'static str, value: &str) -> Result<String, ConfigError> {
    let bad = || ConfigError::BadAddress {
        flag,
        value: value.to_string(),
    };
    let (host, port) = value.rsplit_once(':').ok_or_else(bad)?;
    if host.is_empty() || port.parse::<u16>().is_err() {
        return Err(bad());
    }
    Ok(value.to_string())
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            input: InputConfig {
                pattern: crate::cli::DEFAULT_PATTERN.to_string(),
            },
            backend: BackendConfig {
                addresses: vec![
                    crate::cli::DEFAULT_IDFA_ADDR.to_string(),
                    crate::cli::DEFAULT_GAID_ADDR.to_string(),
                    crate::cli::DEFAULT_ADID_ADDR.to_string(),
                    crate::cli::DEFAULT_DVID_ADDR.to_string(),
                ],
                connect_retries: 3,
                io_timeout: Duration::from_millis(500),
            },
            processing: ProcessingConfig {
                dry_run: false,
                workers: crate::parallel::DEFAULT_WORKERS,
                timeout: Duration::from_secs(5 * 60),
                max_invalid_rate: crate::ingest::DEFAULT_MAX_INVALID_RATE,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(args: &[&str]) -> Result<IngestConfig, ConfigError> {
        let mut argv = vec!["memload"];
        argv.extend_from_slice(args);
        IngestConfig::from_cli(&Cli::try_parse_from(argv).unwrap())
    }

    #[test]
    fn test_defaults_match_cli_defaults() {
        let from_cli = parse(&[]).unwrap();
        let default = IngestConfig::default();
        assert_eq!(from_cli.input.pattern, default.input.pattern);
        assert_eq!(from_cli.backend.addresses, default.backend.addresses);
        assert_eq!(from_cli.processing.workers, default.processing.workers);
        assert_eq!(from_cli.processing.timeout, default.processing.timeout);
        assert_eq!(from_cli.backend.io_timeout, default.backend.io_timeout);
    }

    #[test]
    fn test_shard_order_is_fixed() {
        let config = parse(&[
            "--dvid", "d:4", "--adid", "a:3", "--gaid", "g:2", "--idfa", "i:1",
        ])
        .unwrap();
        assert_eq!(config.backend.addresses, vec!["i:1", "g:2", "a:3", "d:4"]);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert_eq!(parse(&["--workers", "0"]).unwrap_err(), ConfigError::NoWorkers);
        assert_eq!(
            parse(&["--max-invalid-rate", "1.5"]).unwrap_err(),
            ConfigError::InvalidRate(1.5)
        );
        assert_eq!(parse(&["--timeout", "0s"]).unwrap_err(), ConfigError::ZeroTimeout);
        assert_eq!(
            parse(&["--connect-retries", "0"]).unwrap_err(),
            ConfigError::NoConnectAttempts
        );
        assert!(matches!(
            parse(&["--gaid", "nohost"]).unwrap_err(),
            ConfigError::BadAddress { flag: "gaid", .. }
        ));
        assert!(matches!(
            parse(&["--idfa", "host:notaport"]).unwrap_err(),
            ConfigError::BadAddress { flag: "idfa", .. }
        ));
    }

    #[test]
    fn test_derived_settings() {
        let config = parse(&["--workers", "3", "--connect-retries", "7", "--backend-timeout", "2s"])
            .unwrap();
        let policy = config.connect_policy();
        assert_eq!(policy.attempts, 7);
        assert_eq!(policy.io_timeout, Duration::from_secs(2));
        assert_eq!(policy.backoff_step, Duration::from_millis(100));

        let pool = config.processing.pool_config();
        assert_eq!(pool.num_workers, 3);
        assert_eq!(pool.queue_bound, 3);
    }
}
