//! Address resolvers consulted by pollers.

use std::future::Future;
use std::net::Ipv4Addr;

use hickory_resolver::config::{NameServerConfig, ResolveHosts, ResolverConfig, ResolverOpts};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::proto::xfer::Protocol;
use hickory_resolver::{Resolver, TokioResolver};
use keepalive_dns_core::logging::targets;

use crate::dns::config::DnsConfig;
use crate::error::ResolveError;

/// The resolution primitive a [`Poller`](crate::Poller) refreshes its cache
/// from: hostname in, IPv4 addresses out.
///
/// Implementations must not cache answers on their own; the poller is the
/// cache. The order of the returned addresses is irrelevant to the cache
/// identity but is kept for the first callers served.
pub trait AddressResolver: Send + Sync + 'static {
    /// Resolve `hostname` to its current set of IPv4 addresses.
    fn resolve_v4(
        &self,
        hostname: &str,
    ) -> impl Future<Output = Result<Vec<Ipv4Addr>, ResolveError>> + Send;
}

/// An [`AddressResolver`] backed by hickory-resolver.
///
/// # Example
///
/// ```ignore
/// use keepalive_dns::dns::{DnsConfig, HickoryResolver};
///
/// let resolver = HickoryResolver::new(DnsConfig::cloudflare());
/// let addresses = resolver.resolve_v4("example.com").await?;
/// ```
#[derive(Clone)]
pub struct HickoryResolver {
    resolver: TokioResolver,
}

impl HickoryResolver {
    /// Create a resolver with the given configuration.
    pub fn new(config: DnsConfig) -> Self {
        let (resolver_config, resolver_opts) = build_resolver_config(&config);

        let resolver =
            Resolver::builder_with_config(resolver_config, TokioConnectionProvider::default())
                .with_options(resolver_opts)
                .build();

        Self { resolver }
    }

    /// Create a resolver using system DNS settings.
    pub fn system() -> Self {
        Self::new(DnsConfig::system())
    }
}

impl std::fmt::Debug for HickoryResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HickoryResolver").finish_non_exhaustive()
    }
}

impl AddressResolver for HickoryResolver {
    async fn resolve_v4(&self, hostname: &str) -> Result<Vec<Ipv4Addr>, ResolveError> {
        let response = self.resolver.ipv4_lookup(hostname).await.map_err(|e| {
            tracing::debug!(target: targets::RESOLVER, hostname, error = %e, "ipv4 lookup failed");
            ResolveError::lookup(hostname, e)
        })?;

        let addresses: Vec<Ipv4Addr> = response.iter().map(|r| r.0).collect();
        if addresses.is_empty() {
            return Err(ResolveError::NoAddresses(hostname.to_string()));
        }
        Ok(addresses)
    }
}

/// Build hickory resolver configuration from our DnsConfig.
fn build_resolver_config(config: &DnsConfig) -> (ResolverConfig, ResolverOpts) {
    let resolver_config = if config.use_system_config || config.nameservers.is_empty() {
        ResolverConfig::default()
    } else {
        let mut resolver_config = ResolverConfig::new();
        for addr in &config.nameservers {
            resolver_config.add_name_server(NameServerConfig::new(*addr, Protocol::Udp));
            resolver_config.add_name_server(NameServerConfig::new(*addr, Protocol::Tcp));
        }
        resolver_config
    };

    let mut opts = ResolverOpts::default();

    // the poller owns caching
    opts.cache_size = 0;

    opts.use_hosts_file = if config.use_hosts_file {
        ResolveHosts::Auto
    } else {
        ResolveHosts::Never
    };
    opts.attempts = config.attempts;
    opts.timeout = config.timeout;
    opts.ip_strategy = hickory_resolver::config::LookupIpStrategy::Ipv4Only;

    (resolver_config, opts)
}
