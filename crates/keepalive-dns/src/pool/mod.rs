//! Connection pooling keyed by resolution identity.
//!
//! [`DnsPoolNaming`] decorates a base pool naming scheme so that the name of
//! a request's pool partition includes the address set its lookup handle
//! currently resolves to. [`HttpAgent`] and [`HttpsAgent`] put that naming
//! in front of reqwest: one client, and so one keep-alive pool, per
//! partition.

mod agent;
mod naming;
mod resolve;

pub use agent::{HttpAgent, HttpsAgent, PooledAgent};
pub use naming::{DnsPoolNaming, HttpPoolNaming, HttpsPoolNaming, PoolNaming, RequestTarget};
