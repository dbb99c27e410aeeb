//! DNS configuration types.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Configuration for the hickory-backed [`HickoryResolver`](super::HickoryResolver).
///
/// Answers are never cached inside the resolver: every refresh cycle of a
/// poller performs a real query, so the refresh interval alone decides how
/// quickly an address change is picked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsConfig {
    /// Use system DNS configuration (reads /etc/resolv.conf on Unix).
    /// If false, uses `nameservers`.
    pub use_system_config: bool,

    /// Custom nameservers to use when `use_system_config` is false.
    pub nameservers: Vec<SocketAddr>,

    /// Whether to read from the hosts file.
    pub use_hosts_file: bool,

    /// Attempts the resolver itself makes per query.
    pub attempts: usize,

    /// Timeout for each DNS query attempt.
    pub timeout: Duration,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            use_system_config: true,
            nameservers: Vec::new(),
            use_hosts_file: true,
            attempts: 2,
            timeout: Duration::from_secs(5),
        }
    }
}

impl DnsConfig {
    /// Create a new DNS configuration with system defaults.
    pub fn system() -> Self {
        Self::default()
    }

    /// Create a configuration with custom nameservers.
    pub fn with_nameservers(nameservers: Vec<SocketAddr>) -> Self {
        Self {
            use_system_config: false,
            nameservers,
            ..Default::default()
        }
    }

    /// Use Google's public DNS servers.
    pub fn google() -> Self {
        Self::with_nameservers(vec![
            SocketAddr::from((Ipv4Addr::new(8, 8, 8, 8), 53)),
            SocketAddr::from((Ipv4Addr::new(8, 8, 4, 4), 53)),
        ])
    }

    /// Use Cloudflare's public DNS servers.
    pub fn cloudflare() -> Self {
        Self::with_nameservers(vec![
            SocketAddr::from((Ipv4Addr::new(1, 1, 1, 1), 53)),
            SocketAddr::from((Ipv4Addr::new(1, 0, 0, 1), 53)),
        ])
    }

    /// Set whether to use the hosts file.
    pub fn use_hosts_file(mut self, use_hosts: bool) -> Self {
        self.use_hosts_file = use_hosts;
        self
    }

    /// Set the number of attempts per query.
    pub fn attempts(mut self, attempts: usize) -> Self {
        self.attempts = attempts;
        self
    }

    /// Set the per-attempt query timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert!(DnsConfig::system().use_system_config);

        let google = DnsConfig::google();
        assert!(!google.use_system_config);
        assert_eq!(google.nameservers.len(), 2);
        assert_eq!(google.nameservers[0].to_string(), "8.8.8.8:53");

        let cloudflare = DnsConfig::cloudflare().timeout(Duration::from_secs(2));
        assert_eq!(cloudflare.nameservers[1].to_string(), "1.0.0.1:53");
        assert_eq!(cloudflare.timeout, Duration::from_secs(2));
    }
}
