//! Keep-alive agents with resolution-aware pool partitions.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use keepalive_dns_core::logging::targets;
use parking_lot::Mutex;
use url::Url;

use super::naming::{DnsPoolNaming, HttpPoolNaming, HttpsPoolNaming, PoolNaming, RequestTarget};
use super::resolve::LookupResolver;
use crate::config::AgentConfig;
use crate::error::{NetworkError, Result};
use crate::lookup::Lookup;

/// Agent for plain HTTP targets.
pub type HttpAgent = PooledAgent<HttpPoolNaming>;

/// Agent for HTTPS targets; the server name takes part in pool naming.
pub type HttpsAgent = PooledAgent<HttpsPoolNaming>;

struct Partition {
    name: String,
    // a pending handle shares its name with a request that has no lookup
    lookup: Option<Lookup>,
    client: reqwest::Client,
}

/// A keep-alive HTTP agent whose connection pools are partitioned by
/// resolution identity.
///
/// Each partition is one `reqwest::Client`, so one pool of idle connections.
/// Requests are routed to a partition by their base pool name; when the
/// lookup handle for that name reports a different address set, the old
/// partition is retired and its idle connections go with it. Requests
/// already in flight keep their own clone of the old client.
///
/// # Example
///
/// ```ignore
/// use keepalive_dns::{DnsPolling, HttpsAgent};
///
/// let polling = DnsPolling::system();
/// let agent = HttpsAgent::new();
///
/// let lookup = polling.lookup("example.com");
/// let response = agent
///     .get("https://example.com/", Some(&lookup))?
///     .send()
///     .await?;
/// ```
pub struct PooledAgent<N> {
    naming: DnsPoolNaming<N>,
    config: AgentConfig,
    partitions: Mutex<HashMap<String, Partition>>,
}

impl<N: PoolNaming + Default> PooledAgent<N> {
    /// Create an agent with the default configuration.
    pub fn new() -> Self {
        Self::with_config(AgentConfig::default())
    }

    /// Create an agent with a custom configuration.
    pub fn with_config(config: AgentConfig) -> Self {
        Self::with_naming(N::default(), config)
    }
}

impl<N: PoolNaming + Default> Default for PooledAgent<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: PoolNaming> PooledAgent<N> {
    /// Create an agent over a custom base naming scheme.
    pub fn with_naming(naming: N, config: AgentConfig) -> Self {
        Self {
            naming: DnsPoolNaming::new(naming),
            config,
            partitions: Mutex::new(HashMap::new()),
        }
    }

    /// The agent configuration.
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// The partition name `target` maps to.
    pub fn pool_name(&self, target: &RequestTarget) -> String {
        self.naming.pool_name(target)
    }

    /// Number of live partitions.
    pub fn partition_count(&self) -> usize {
        self.partitions.lock().len()
    }

    /// Get the client for `target`'s partition, creating it if needed.
    pub fn client(&self, target: &RequestTarget) -> Result<reqwest::Client> {
        let base = self.naming.base_name(target);
        let name = self.naming.pool_name(target);

        let mut partitions = self.partitions.lock();
        if let Some(partition) = partitions.get(&base) {
            if partition.name == name && partition.lookup == target.lookup {
                return Ok(partition.client.clone());
            }
        }

        let client = self.build_client(target)?;
        let previous = partitions.insert(
            base,
            Partition {
                name: name.clone(),
                lookup: target.lookup.clone(),
                client: client.clone(),
            },
        );
        match previous {
            Some(previous) => tracing::debug!(
                target: targets::AGENT,
                retired = %previous.name,
                partition = %name,
                "pool partition replaced"
            ),
            None => tracing::debug!(target: targets::AGENT, partition = %name, "pool partition created"),
        }
        Ok(client)
    }

    /// Start a request, resolving the URL's host through `lookup` when given.
    pub fn request(
        &self,
        method: Method,
        url: impl AsRef<str>,
        lookup: Option<&Lookup>,
    ) -> Result<reqwest::RequestBuilder> {
        let url = Url::parse(url.as_ref())?;
        let mut target = RequestTarget::from_url(&url)?;
        target.lookup = lookup.cloned();

        let client = self.client(&target)?;
        Ok(client.request(method, url))
    }

    /// Start a GET request.
    pub fn get(
        &self,
        url: impl AsRef<str>,
        lookup: Option<&Lookup>,
    ) -> Result<reqwest::RequestBuilder> {
        self.request(Method::GET, url, lookup)
    }

    fn build_client(&self, target: &RequestTarget) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder();

        if let Some(timeout) = self.config.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(connect_timeout) = self.config.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }

        builder = builder
            .pool_idle_timeout(self.config.pool_idle_timeout)
            .pool_max_idle_per_host(self.config.pool_max_idle_per_host);

        if let Some(ref ua) = self.config.user_agent {
            builder = builder.user_agent(ua);
        }

        match self.config.proxy {
            Some(ref proxy_url) => {
                let proxy = reqwest::Proxy::all(proxy_url)
                    .map_err(|e| NetworkError::Proxy(e.to_string()))?;
                builder = builder.proxy(proxy);
            }
            None => builder = builder.no_proxy(),
        }

        if let Some(local_address) = target.local_address {
            builder = builder.local_address(local_address);
        }

        if let Some(ref lookup) = target.lookup {
            builder = builder.dns_resolver(Arc::new(LookupResolver::new(lookup.clone())));
        }

        Ok(builder.build()?)
    }
}

impl<N: PoolNaming + std::fmt::Debug> std::fmt::Debug for PooledAgent<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledAgent")
            .field("naming", &self.naming)
            .field("config", &self.config)
            .field("partitions", &self.partition_count())
            .finish()
    }
}
