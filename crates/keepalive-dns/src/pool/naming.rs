//! Pool partition naming.
//!
//! A keep-alive client shares one pool of idle connections among all
//! requests whose targets produce the same pool name. [`DnsPoolNaming`]
//! prefixes that name with the resolution identity of the request's lookup
//! handle, so a changed address set lands in a fresh partition instead of
//! reusing connections to addresses that are no longer current.

use std::net::IpAddr;

use url::Url;

use crate::error::{NetworkError, Result};
use crate::lookup::Lookup;

/// The per-request inputs a pool name is computed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTarget {
    /// Hostname as it appears in the URL.
    pub host: String,
    /// Destination port.
    pub port: u16,
    /// Local address to bind outgoing connections to.
    pub local_address: Option<IpAddr>,
    /// TLS server name, when it differs from `host`.
    pub servername: Option<String>,
    /// The lookup handle the request resolves `host` through.
    pub lookup: Option<Lookup>,
}

impl RequestTarget {
    /// Create a target for `host:port`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            local_address: None,
            servername: None,
            lookup: None,
        }
    }

    /// Build a target from a URL, using the scheme's default port when the
    /// URL has none.
    pub fn from_url(url: &Url) -> Result<Self> {
        let host = url
            .host_str()
            .ok_or_else(|| NetworkError::InvalidUrl(format!("{url} has no host")))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| NetworkError::InvalidUrl(format!("{url} has no port")))?;
        Ok(Self::new(host, port))
    }

    /// Set the local address.
    pub fn local_address(mut self, address: IpAddr) -> Self {
        self.local_address = Some(address);
        self
    }

    /// Set the TLS server name.
    pub fn servername(mut self, servername: impl Into<String>) -> Self {
        self.servername = Some(servername.into());
        self
    }

    /// Attach a lookup handle.
    pub fn lookup(mut self, lookup: Lookup) -> Self {
        self.lookup = Some(lookup);
        self
    }
}

/// Computes the pool partition a request belongs to.
pub trait PoolNaming: Send + Sync + 'static {
    /// The partition name for `target`.
    fn pool_name(&self, target: &RequestTarget) -> String;
}

/// Plain HTTP naming: `host:port:local_address`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpPoolNaming;

impl PoolNaming for HttpPoolNaming {
    fn pool_name(&self, target: &RequestTarget) -> String {
        let local = target
            .local_address
            .map(|addr| addr.to_string())
            .unwrap_or_default();
        format!("{}:{}:{}", target.host, target.port, local)
    }
}

/// HTTPS naming: the HTTP name, plus `:servername` when a server name other
/// than the host is set.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpsPoolNaming;

impl PoolNaming for HttpsPoolNaming {
    fn pool_name(&self, target: &RequestTarget) -> String {
        let mut name = HttpPoolNaming.pool_name(target);
        if let Some(servername) = target
            .servername
            .as_deref()
            .filter(|servername| *servername != target.host)
        {
            name.push(':');
            name.push_str(servername);
        }
        name
    }
}

/// Decorates another naming scheme with the target's resolution identity.
///
/// With a resolved lookup the name becomes `"<key>:<base name>"`. Without a
/// lookup, or with one that has not resolved yet, the base name is returned
/// unchanged.
///
/// # Example
///
/// ```
/// use keepalive_dns::{DnsPoolNaming, HttpPoolNaming, Lookup, PoolNaming, RequestTarget};
/// use std::net::Ipv4Addr;
///
/// let naming = DnsPoolNaming::new(HttpPoolNaming);
/// let lookup = Lookup::fixed(
///     "example.com",
///     &[Ipv4Addr::new(1, 1, 1, 1), Ipv4Addr::new(2, 2, 2, 2)],
/// )
/// .unwrap();
///
/// let target = RequestTarget::new("example.com", 80);
/// assert_eq!(naming.pool_name(&target), "example.com:80:");
///
/// let target = target.lookup(lookup);
/// assert_eq!(naming.pool_name(&target), "1.1.1.1,2.2.2.2:example.com:80:");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct DnsPoolNaming<N> {
    base: N,
}

impl<N: PoolNaming> DnsPoolNaming<N> {
    /// Wrap `base`.
    pub fn new(base: N) -> Self {
        Self { base }
    }

    /// The wrapped naming scheme.
    pub fn base(&self) -> &N {
        &self.base
    }

    /// The name the wrapped scheme gives `target`.
    pub fn base_name(&self, target: &RequestTarget) -> String {
        self.base.pool_name(target)
    }
}

impl<N: PoolNaming> PoolNaming for DnsPoolNaming<N> {
    fn pool_name(&self, target: &RequestTarget) -> String {
        let name = self.base.pool_name(target);
        match target.lookup.as_ref().and_then(Lookup::key) {
            Some(key) => format!("{key}:{name}"),
            None => name,
        }
    }
}
