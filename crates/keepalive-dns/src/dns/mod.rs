//! DNS resolution backends.
//!
//! A [`Poller`](crate::Poller) never talks to DNS directly; it calls an
//! [`AddressResolver`]. [`HickoryResolver`] is the production backend, and
//! tests substitute their own implementation of the trait.
//!
//! # Configuration
//!
//! ```ignore
//! use keepalive_dns::dns::{DnsConfig, HickoryResolver};
//! use std::time::Duration;
//!
//! let config = DnsConfig::cloudflare()
//!     .use_hosts_file(false)
//!     .timeout(Duration::from_secs(2));
//!
//! let resolver = HickoryResolver::new(config);
//! ```

mod config;
mod resolver;

pub use config::DnsConfig;
pub use resolver::{AddressResolver, HickoryResolver};
