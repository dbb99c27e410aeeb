//! Logging facilities for keepalive-dns.
//!
//! keepalive-dns uses the `tracing` crate for instrumentation and never
//! installs a subscriber itself. To see logs, install one in your binary:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("keepalive_dns=debug")
//!     .init();
//! ```

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Per-hostname poller: resolution cycles, retries, cache swaps.
    pub const POLLER: &str = "keepalive_dns::poller";
    /// Multi-hostname registry.
    pub const REGISTRY: &str = "keepalive_dns::registry";
    /// Keep-alive agents and pool partitions.
    pub const AGENT: &str = "keepalive_dns::agent";
    /// Address resolver backends.
    pub const RESOLVER: &str = "keepalive_dns::resolver";
    /// Signal dispatch.
    pub const SIGNAL: &str = "keepalive_dns_core::signal";
}
