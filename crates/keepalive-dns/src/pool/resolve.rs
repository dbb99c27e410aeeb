//! Bridge from lookup handles to reqwest's DNS hook.

use std::net::SocketAddr;

use keepalive_dns_core::logging::targets;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};

use crate::lookup::Lookup;

/// Resolves through a [`Lookup`] handle, one address per connection.
///
/// The port is left at zero; the connector fills in the request's port.
#[derive(Debug, Clone)]
pub(crate) struct LookupResolver {
    lookup: Lookup,
}

impl LookupResolver {
    pub(crate) fn new(lookup: Lookup) -> Self {
        Self { lookup }
    }
}

impl Resolve for LookupResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let lookup = self.lookup.clone();
        Box::pin(async move {
            let address = lookup.lookup(name.as_str()).await.map_err(|e| {
                tracing::debug!(target: targets::AGENT, host = name.as_str(), error = %e, "lookup failed");
                e
            })?;
            let addrs: Addrs = Box::new(std::iter::once(SocketAddr::new(address.address, 0)));
            Ok::<_, Box<dyn std::error::Error + Send + Sync>>(addrs)
        })
    }
}
