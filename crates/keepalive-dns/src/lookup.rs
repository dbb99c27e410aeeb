//! Lookup handles: the resolution hook handed to connection pools.
//!
//! A [`Lookup`] is bound to exactly one hostname and comes in two modes:
//!
//! - **pending**: created with the poller, before its first resolution
//!   attempt has completed. Calls are queued and answered on a later turn of
//!   the runtime once that attempt finishes, with its outcome.
//! - **cached**: created from a successfully resolved address set. Calls are
//!   answered synchronously with a random address from the set, and the
//!   handle carries the set's identity as its [`key`](Lookup::key).
//!
//! Handles are immutable. When the address set changes, the poller swaps in
//! a new cached handle; callers holding the old one keep a consistent view.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Weak};

use keepalive_dns_core::runtime;
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use tokio::sync::oneshot;

use crate::error::{LookupError, NetworkError, ResolveError};

/// Address family tag passed with every resolved address.
pub const FAMILY_V4: u8 = 4;

/// A single address served by a [`Lookup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LookupAddress {
    /// The address to connect to.
    pub address: IpAddr,
    /// Address family, always [`FAMILY_V4`].
    pub family: u8,
}

impl LookupAddress {
    fn v4(address: Ipv4Addr) -> Self {
        Self {
            address: IpAddr::V4(address),
            family: FAMILY_V4,
        }
    }
}

/// Callback type stored while a lookup waits for the first resolution.
pub type LookupCallback = Box<dyn FnOnce(Result<LookupAddress, ResolveError>) + Send + 'static>;

/// A handle that resolves one specific hostname to one address per call.
///
/// Cloning is cheap and clones compare equal: equality is handle identity,
/// not address-set equality.
///
/// # Example
///
/// ```
/// use keepalive_dns::Lookup;
/// use std::net::Ipv4Addr;
///
/// let lookup = Lookup::fixed(
///     "example.com",
///     &[Ipv4Addr::new(2, 2, 2, 2), Ipv4Addr::new(1, 1, 1, 1)],
/// )
/// .unwrap();
/// assert_eq!(lookup.key(), Some("1.1.1.1,2.2.2.2"));
///
/// lookup
///     .resolve("example.com", |result| {
///         let addr = result.unwrap();
///         assert_eq!(addr.family, 4);
///     })
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct Lookup {
    inner: Arc<LookupInner>,
}

struct LookupInner {
    hostname: Arc<str>,
    mode: LookupMode,
}

enum LookupMode {
    Pending(Weak<LookupCache>),
    Cached {
        /// Sorted the same way as the key.
        addresses: Arc<[Ipv4Addr]>,
        key: Arc<str>,
    },
}

impl Lookup {
    fn pending(hostname: Arc<str>, cache: Weak<LookupCache>) -> Self {
        Self {
            inner: Arc::new(LookupInner {
                hostname,
                mode: LookupMode::Pending(cache),
            }),
        }
    }

    fn cached(hostname: Arc<str>, addresses: Arc<[Ipv4Addr]>, key: Arc<str>) -> Self {
        Self {
            inner: Arc::new(LookupInner {
                hostname,
                mode: LookupMode::Cached { addresses, key },
            }),
        }
    }

    /// Build a cache-serving handle over a fixed address set.
    ///
    /// Useful for static host overrides. Fails when `addresses` is empty.
    pub fn fixed(hostname: &str, addresses: &[Ipv4Addr]) -> Result<Self, ResolveError> {
        if addresses.is_empty() {
            return Err(ResolveError::NoAddresses(hostname.to_string()));
        }
        let (sorted, key) = address_set_identity(addresses);
        Ok(Self::cached(Arc::from(hostname), sorted, key))
    }

    /// The hostname this handle is bound to.
    pub fn hostname(&self) -> &str {
        &self.inner.hostname
    }

    /// The resolution identity: the sorted, comma-joined address set.
    ///
    /// `None` until the hostname has been resolved successfully.
    pub fn key(&self) -> Option<&str> {
        match &self.inner.mode {
            LookupMode::Pending(_) => None,
            LookupMode::Cached { key, .. } => Some(key),
        }
    }

    /// Whether this handle serves addresses from a resolved set.
    pub fn is_resolved(&self) -> bool {
        matches!(self.inner.mode, LookupMode::Cached { .. })
    }

    /// The cached addresses, sorted as in the key. Empty while pending.
    pub fn addresses(&self) -> &[Ipv4Addr] {
        match &self.inner.mode {
            LookupMode::Pending(_) => &[],
            LookupMode::Cached { addresses, .. } => addresses,
        }
    }

    /// Whether two values are the same handle.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Arc::ptr_eq(&this.inner, &other.inner)
    }

    /// Resolve `hostname` to one address and pass it to `callback`.
    ///
    /// A cached handle invokes `callback` before returning. A pending handle
    /// queues it and invokes it on a later turn of the runtime, once the
    /// poller's first resolution attempt completes.
    ///
    /// Returns an error, without invoking `callback`, when `hostname` is
    /// empty or is not the hostname this handle is bound to.
    pub fn resolve<F>(&self, hostname: &str, callback: F) -> Result<(), LookupError>
    where
        F: FnOnce(Result<LookupAddress, ResolveError>) + Send + 'static,
    {
        self.validate(hostname)?;
        match &self.inner.mode {
            LookupMode::Cached { addresses, .. } => callback(pick_one(&self.inner.hostname, addresses)),
            LookupMode::Pending(cache) => self.enqueue(cache, Box::new(callback)),
        }
        Ok(())
    }

    /// Async form of [`resolve`](Self::resolve).
    pub async fn lookup(&self, hostname: &str) -> crate::error::Result<LookupAddress> {
        let (tx, rx) = oneshot::channel();
        self.resolve(hostname, move |result| {
            let _ = tx.send(result);
        })?;
        match rx.await {
            Ok(result) => Ok(result?),
            // the queued callback was dropped together with its poller
            Err(_) => Err(NetworkError::Resolve(ResolveError::PollerDropped(
                self.hostname().to_string(),
            ))),
        }
    }

    fn validate(&self, hostname: &str) -> Result<(), LookupError> {
        if hostname.is_empty() {
            return Err(LookupError::MissingHostname);
        }
        if hostname != &*self.inner.hostname {
            return Err(LookupError::HostnameMismatch {
                expected: self.inner.hostname.to_string(),
                actual: hostname.to_string(),
            });
        }
        Ok(())
    }

    fn enqueue(&self, cache: &Weak<LookupCache>, callback: LookupCallback) {
        let Some(cache) = cache.upgrade() else {
            let hostname = self.inner.hostname.to_string();
            defer(callback, Err(ResolveError::PollerDropped(hostname)));
            return;
        };

        let mut state = cache.state.lock();
        if let Some(pending) = state.pending.as_mut() {
            pending.push(callback);
            return;
        }

        // queue already drained: this is a stale pending handle
        let active = state.active.clone();
        drop(state);
        match &active.inner.mode {
            LookupMode::Cached { addresses, .. } => {
                callback(pick_one(&active.inner.hostname, addresses))
            }
            LookupMode::Pending(_) => {
                let hostname = self.inner.hostname.to_string();
                defer(callback, Err(ResolveError::NotResolved(hostname)));
            }
        }
    }
}

impl PartialEq for Lookup {
    fn eq(&self, other: &Self) -> bool {
        Lookup::ptr_eq(self, other)
    }
}

impl Eq for Lookup {}

impl fmt::Debug for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lookup")
            .field("hostname", &self.hostname())
            .field("key", &self.key())
            .finish()
    }
}

/// The per-hostname cache a poller owns: the active handle plus the queue of
/// callbacks waiting for the first resolution attempt.
pub(crate) struct LookupCache {
    hostname: Arc<str>,
    state: Mutex<CacheState>,
}

struct CacheState {
    /// `Some` until the first attempt completes, then `None` for good.
    pending: Option<Vec<LookupCallback>>,
    active: Lookup,
}

impl LookupCache {
    pub(crate) fn new(hostname: Arc<str>) -> Arc<Self> {
        Arc::new_cyclic(|cache| {
            let initial = Lookup::pending(Arc::clone(&hostname), cache.clone());
            LookupCache {
                hostname,
                state: Mutex::new(CacheState {
                    pending: Some(Vec::new()),
                    active: initial,
                }),
            }
        })
    }

    pub(crate) fn hostname(&self) -> &str {
        &self.hostname
    }

    pub(crate) fn current(&self) -> Lookup {
        self.state.lock().active.clone()
    }

    /// Take the pending queue. Returns `None` once it has been taken.
    pub(crate) fn take_pending(&self) -> Option<Vec<LookupCallback>> {
        self.state.lock().pending.take()
    }

    /// Install a handle for `addresses` unless the active handle already
    /// carries the same identity. Returns whether the handle was replaced.
    pub(crate) fn update(&self, addresses: &[Ipv4Addr]) -> bool {
        let (sorted, key) = address_set_identity(addresses);
        let mut state = self.state.lock();
        if state.active.key() == Some(&*key) {
            return false;
        }
        state.active = Lookup::cached(Arc::clone(&self.hostname), sorted, key);
        true
    }
}

/// Hand every queued callback the outcome of the first resolution attempt.
///
/// Successful outcomes pick from the addresses in the order the resolver
/// returned them. Callbacks always run on a later turn, never inline.
pub(crate) fn drain_pending(
    hostname: &str,
    pending: Vec<LookupCallback>,
    outcome: Result<&[Ipv4Addr], &ResolveError>,
) {
    for callback in pending {
        let result = match outcome {
            Ok(addresses) => pick_one(hostname, addresses),
            Err(err) => Err(err.clone()),
        };
        defer(callback, result);
    }
}

/// Sort addresses by their text form and join them into the set identity.
pub(crate) fn address_set_identity(addresses: &[Ipv4Addr]) -> (Arc<[Ipv4Addr]>, Arc<str>) {
    let mut entries: Vec<(String, Ipv4Addr)> = addresses
        .iter()
        .map(|addr| (addr.to_string(), *addr))
        .collect();
    entries.sort();

    let key = entries
        .iter()
        .map(|(text, _)| text.as_str())
        .collect::<Vec<_>>()
        .join(",");
    let sorted = entries.into_iter().map(|(_, addr)| addr).collect();
    (sorted, Arc::from(key))
}

fn pick_one(hostname: &str, addresses: &[Ipv4Addr]) -> Result<LookupAddress, ResolveError> {
    addresses
        .choose(&mut rand::thread_rng())
        .map(|addr| LookupAddress::v4(*addr))
        .ok_or_else(|| ResolveError::NoAddresses(hostname.to_string()))
}

fn defer(callback: LookupCallback, result: Result<LookupAddress, ResolveError>) {
    runtime::spawn(async move {
        callback(result);
    });
}
