//! Registry of pollers, one per hostname.

use std::collections::HashMap;
use std::sync::Arc;

use keepalive_dns_core::Signal;
use keepalive_dns_core::logging::targets;
use parking_lot::Mutex;

use crate::config::PollerConfig;
use crate::dns::{AddressResolver, HickoryResolver};
use crate::lookup::Lookup;
use crate::poller::{Poller, ResolveEvent};

/// Hands out lookup handles for any number of hostnames.
///
/// The first request for a hostname creates and starts a [`Poller`] for it;
/// later requests are answered by that same poller for the lifetime of the
/// registry. Every poller's [`ResolveEvent`]s are re-emitted, unchanged, on
/// the registry's own [`resolve_event`](Self::resolve_event) signal.
///
/// # Example
///
/// ```ignore
/// use keepalive_dns::{DnsPolling, ResolveEvent};
///
/// let polling = DnsPolling::system();
/// polling.resolve_event.connect(|event| match event {
///     ResolveEvent::Success(s) => println!("{} updated={}", s.hostname, s.updated),
///     ResolveEvent::Failure(f) => println!("{} failed: {}", f.hostname, f.error),
/// });
///
/// let lookup = polling.lookup("example.com");
/// let address = lookup.lookup("example.com").await?;
///
/// polling.stop();
/// ```
pub struct DnsPolling<R: AddressResolver = HickoryResolver> {
    /// Signal re-emitting the events of every poller in the registry.
    pub resolve_event: Arc<Signal<ResolveEvent>>,

    pollers: Mutex<HashMap<String, Poller<R>>>,
    resolver: Arc<R>,
    config: PollerConfig,
}

impl DnsPolling<HickoryResolver> {
    /// Create a registry resolving through the system DNS configuration.
    pub fn system() -> Self {
        Self::new(Arc::new(HickoryResolver::system()))
    }
}

impl<R: AddressResolver> DnsPolling<R> {
    /// Create a registry with the default poller configuration.
    pub fn new(resolver: Arc<R>) -> Self {
        Self::with_config(resolver, PollerConfig::default())
    }

    /// Create a registry whose pollers all use `config`.
    pub fn with_config(resolver: Arc<R>, config: PollerConfig) -> Self {
        Self {
            resolve_event: Arc::new(Signal::new()),
            pollers: Mutex::new(HashMap::new()),
            resolver,
            config: config.normalized(),
        }
    }

    /// The configuration new pollers are created with.
    pub fn config(&self) -> PollerConfig {
        self.config
    }

    /// Get the current lookup handle for `hostname`, starting a poller for it
    /// if this is the first request.
    ///
    /// Hostnames seen for the first time after [`stop`](Self::stop) still
    /// get a fresh, running poller.
    pub fn lookup(&self, hostname: &str) -> Lookup {
        let mut pollers = self.pollers.lock();
        if let Some(poller) = pollers.get(hostname) {
            return poller.lookup();
        }

        let poller = Poller::new(hostname, Arc::clone(&self.resolver), self.config);

        // subscribe before the first cycle can emit
        let forward = Arc::clone(&self.resolve_event);
        poller.resolve_event.connect(move |event| forward.emit(event.clone()));
        poller.start();

        tracing::debug!(target: targets::REGISTRY, hostname, pollers = pollers.len() + 1, "poller created");

        let lookup = poller.lookup();
        pollers.insert(hostname.to_string(), poller);
        lookup
    }

    /// Stop every poller. Pollers stay registered and keep serving their
    /// last cached state.
    pub fn stop(&self) {
        let pollers = self.pollers.lock();
        for poller in pollers.values() {
            poller.stop();
        }
        tracing::debug!(target: targets::REGISTRY, pollers = pollers.len(), "registry stopped");
    }

    /// The hostnames that have a poller, in no particular order.
    pub fn hostnames(&self) -> Vec<String> {
        self.pollers.lock().keys().cloned().collect()
    }

    /// Number of pollers.
    pub fn len(&self) -> usize {
        self.pollers.lock().len()
    }

    /// Whether no hostname has been requested yet.
    pub fn is_empty(&self) -> bool {
        self.pollers.lock().is_empty()
    }

    /// Whether the poller for `hostname` exists and is running.
    pub fn is_polling(&self, hostname: &str) -> bool {
        self.pollers
            .lock()
            .get(hostname)
            .is_some_and(|poller| poller.is_running())
    }
}

impl<R: AddressResolver> std::fmt::Debug for DnsPolling<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DnsPolling")
            .field("config", &self.config)
            .field("pollers", &self.len())
            .finish_non_exhaustive()
    }
}
