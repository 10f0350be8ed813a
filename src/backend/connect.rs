//! Connection manager: one handle per configured shard, with bounded retry

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use thiserror::Error;

use super::{BackendError, MemcacheClient, SharedStore};
use crate::logging::Logger;

/// Retry and timeout settings for establishing shard connections
#[derive(Debug, Clone)]
pub struct ConnectPolicy {
    pub attempts: u32,
    /// Sleep after failed attempt `n` is `backoff_step * n`
    pub backoff_step: Duration,
    pub io_timeout: Duration,
}

impl Default for ConnectPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_step: Duration::from_millis(100),
            io_timeout: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Error)]
#[error("failed to connect to backend {address} after {attempts} attempts: {source}")]
pub struct ConnectError {
    pub address: String,
    pub attempts: u32,
    #[source]
    pub source: BackendError,
}

/// Call `dial` until it succeeds or `policy.attempts` is exhausted.
/// No sleep follows the final attempt.
pub fn connect_with_retry<C, F>(
    address: &str,
    policy: &ConnectPolicy,
    logger: &dyn Logger,
    mut dial: F,
) -> Result<C, ConnectError>
where
    F: FnMut(&str) -> Result<C, BackendError>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match dial(address) {
            Ok(client) => return Ok(client),
            Err(source) if attempt >= attempts => {
                return Err(ConnectError {
                    address: address.to_string(),
                    attempts,
                    source,
                })
            }
            Err(e) => {
                let backoff = policy.backoff_step * attempt;
                logger.warn(format_args!(
                    "Connect attempt {}/{} to {} failed: {}; retrying in {:?}",
                    attempt, attempts, address, e, backoff
                ));
                thread::sleep(backoff);
                attempt += 1;
            }
        }
    }
}

/// Connect every address in order; the order fixes shard indices.
/// The first address that exhausts its retries aborts the whole list.
pub fn connect_shards(
    addresses: &[String],
    policy: &ConnectPolicy,
    logger: &dyn Logger,
) -> Result<Arc<[SharedStore]>, ConnectError> {
    let mut shards: Vec<SharedStore> = Vec::with_capacity(addresses.len());
    for address in addresses {
        let client = connect_with_retry(address, policy, logger, |addr| {
            MemcacheClient::connect(addr, policy.io_timeout)
        })?;
        logger.debug(format_args!(
            "Connected shard {} to {}",
            shards.len(),
            address
        ));
        shards.push(Arc::new(client));
    }
    Ok(shards.into())
}
