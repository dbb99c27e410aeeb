//! Polling DNS cache for keep-alive HTTP agents.
//!
//! Long-lived keep-alive connections outlive the DNS answer they were opened
//! against. When the addresses behind a hostname change (a load balancer
//! rotation, a DNS failover), pooled connections keep going to the old
//! addresses. This crate keeps a per-hostname cache of IPv4 addresses fresh
//! on a fixed interval and exposes its resolution identity to the
//! connection pool, so that a changed address set gets a fresh pool.
//!
//! - **[`Poller`]**: refreshes one hostname's addresses on an interval,
//!   with bounded immediate retries, and hands out [`Lookup`] handles.
//! - **[`DnsPolling`]**: a registry creating one poller per hostname on
//!   demand and re-emitting their events.
//! - **[`HttpAgent`] / [`HttpsAgent`]**: reqwest-backed agents that name
//!   pool partitions with [`DnsPoolNaming`] and resolve through the lookup
//!   handle.
//!
//! # Example
//!
//! ```ignore
//! use keepalive_dns::{DnsPolling, HttpsAgent, ResolveEvent};
//!
//! let polling = DnsPolling::system();
//! polling.resolve_event.connect(|event| {
//!     if let ResolveEvent::Failure(failure) = event {
//!         tracing::warn!(hostname = %failure.hostname, error = %failure.error, "resolve failed");
//!     }
//! });
//!
//! let agent = HttpsAgent::new();
//! let lookup = polling.lookup("example.com");
//! let response = agent.get("https://example.com/", Some(&lookup))?.send().await?;
//! ```
//!
//! # Lookup timing
//!
//! A handle obtained before the first resolution attempt has completed is
//! *pending*: calls are queued and answered on a later turn of the runtime
//! with that first attempt's outcome. Once a resolution succeeds, the poller
//! hands out a *cached* handle that answers synchronously, inside the call.
//!
//! # Logging
//!
//! Resolution failures are logged at `warn`, address-set changes at `info`
//! and everything else at `debug` or below; see
//! [`keepalive_dns_core::logging::targets`] for the target names.

mod config;
pub mod dns;
mod error;
mod lookup;
mod poller;
pub mod pool;
mod registry;

pub use config::{AgentConfig, DEFAULT_MAX_RETRIES, DEFAULT_REFRESH_INTERVAL, PollerConfig};
pub use dns::{AddressResolver, DnsConfig, HickoryResolver};
pub use error::{LookupError, NetworkError, ResolveError, Result};
pub use keepalive_dns_core::{ConnectionId, ConnectionType, Signal};
pub use lookup::{FAMILY_V4, Lookup, LookupAddress, LookupCallback};
pub use poller::{Poller, ResolveEvent, ResolveFailure, ResolveSuccess};
pub use pool::{
    DnsPoolNaming, HttpAgent, HttpPoolNaming, HttpsAgent, HttpsPoolNaming, PoolNaming, PooledAgent,
    RequestTarget,
};
pub use registry::DnsPolling;
