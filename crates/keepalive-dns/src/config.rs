//! Poller and agent configuration.

use std::time::Duration;

/// Default period between refresh cycles.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Default number of immediate attempts per refresh cycle.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Configuration shared by a [`Poller`](crate::Poller) and the
/// [`DnsPolling`](crate::DnsPolling) registry that creates them.
///
/// # Example
///
/// ```
/// use keepalive_dns::PollerConfig;
/// use std::time::Duration;
///
/// let config = PollerConfig::default()
///     .refresh_interval(Duration::from_secs(10))
///     .max_retries(5);
/// assert_eq!(config.max_retries, 5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    /// Period between the start of consecutive refresh cycles.
    pub refresh_interval: Duration,
    /// Attempts made back to back within one cycle before giving up until
    /// the next tick.
    pub max_retries: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl PollerConfig {
    /// Set the refresh interval. A zero interval selects the default.
    pub fn refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = if interval.is_zero() {
            DEFAULT_REFRESH_INTERVAL
        } else {
            interval
        };
        self
    }

    /// Set the number of attempts per cycle. Zero selects the default.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = if retries == 0 {
            DEFAULT_MAX_RETRIES
        } else {
            retries
        };
        self
    }

    /// Replace unset (zero) fields with their defaults.
    ///
    /// The fields are public, so a struct literal can bypass the builders.
    pub(crate) fn normalized(self) -> Self {
        Self::default()
            .refresh_interval(self.refresh_interval)
            .max_retries(self.max_retries)
    }
}

/// Configuration for the keep-alive agents.
///
/// Every pool partition gets its own client built from this configuration.
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Request timeout.
    pub timeout: Option<Duration>,
    /// Connect timeout.
    pub connect_timeout: Option<Duration>,
    /// How long an idle keep-alive connection is kept in its pool.
    pub pool_idle_timeout: Option<Duration>,
    /// Maximum idle connections kept per host within one partition.
    pub pool_max_idle_per_host: usize,
    /// Default user agent.
    pub user_agent: Option<String>,
    /// Proxy URL. Without one, environment proxies are ignored so that
    /// connections go to the addresses the lookup handle picks.
    pub proxy: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
            connect_timeout: Some(Duration::from_secs(10)),
            pool_idle_timeout: Some(Duration::from_secs(15)),
            pool_max_idle_per_host: usize::MAX,
            user_agent: Some(format!("keepalive-dns/{}", env!("CARGO_PKG_VERSION"))),
            proxy: None,
        }
    }
}

impl AgentConfig {
    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Disable the request timeout.
    pub fn no_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    /// Set the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set how long idle connections are kept.
    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = Some(timeout);
        self
    }

    /// Set the maximum number of idle connections per host.
    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.pool_max_idle_per_host = max;
        self
    }

    /// Set the user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Route every request through a proxy.
    pub fn proxy(mut self, proxy_url: impl Into<String>) -> Self {
        self.proxy = Some(proxy_url.into());
        self
    }
}
