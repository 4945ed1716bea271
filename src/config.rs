use std::time::Duration;

/// Configuration consumed by [Client](crate::Client).
///
/// At least one bootstrap address is required; everything else has defaults.
#[derive(Clone)]
pub struct ClientConfig {
    /// Ordered `host:port` addresses tried during cluster bootstrap.
    pub bootstrap_urls: Vec<String>,
    pub timeout: TimeoutSetting,
    pub append: AppendSetting,
}

impl ClientConfig {
    pub fn new(bootstrap_urls: Vec<String>) -> Self {
        Self { bootstrap_urls, timeout: Default::default(), append: Default::default() }
    }
}

#[derive(Clone)]
pub struct TimeoutSetting {
    /// Deadline applied to every RPC issued by the client.
    pub request_timeout: Duration,
    /// Connect timeout, passed through to the channel provider.
    pub connect_timeout: Duration,
}

impl Default for TimeoutSetting {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Retry tunables of the resilient writer.
#[derive(Clone)]
pub struct AppendSetting {
    /// Total append attempts per call (the first try included).
    /// Must be at least 1.
    pub retry_max_times: usize,
    /// Fixed interval between attempts. Backoff is flat, not exponential.
    pub retry_interval: Duration,
}

impl Default for AppendSetting {
    fn default() -> Self {
        Self { retry_max_times: 3, retry_interval: Duration::from_secs(5) }
    }
}
