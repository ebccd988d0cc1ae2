use reqwest::Client;
use std::time::Duration;

/// Hard ceiling for any single request, probes included.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Idle connections kept per host by each worker's pool.
pub const POOL_MAX_IDLE_PER_HOST: usize = 10;

/// Builds a client for one worker (or for the method probes).
///
/// Certificate validation is always off. Targets with self-signed, expired or
/// mismatched certificates must still receive traffic.
pub fn create_client(pool_size: usize) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .connect_timeout(REQUEST_TIMEOUT)
        .tcp_nodelay(true)
        .http1_only()
        .user_agent(concat!("surge/", env!("CARGO_PKG_VERSION")))
        .danger_accept_invalid_certs(true)
        .pool_max_idle_per_host(pool_size)
        .pool_idle_timeout(Duration::from_secs(30))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
}
