//! HTTP/2 client construction, lifted from the single-purpose provider
//! client's connection-pooling setup and generalized to the pipeline's
//! bounded-concurrency model (no per-call rate-limit sleep; concurrency
//! is capped by the worker pool instead).

use std::time::Duration;

use vaultkeeper_core::config::DownloadConfig;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(30);

pub fn build_client(config: &DownloadConfig) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(Duration::from_secs(config.timeout_seconds))
        .read_timeout(READ_TIMEOUT)
        .pool_max_idle_per_host(config.max_connections)
        .pool_idle_timeout(Duration::from_secs(30))
        .tcp_nodelay(true)
        .build()
}
