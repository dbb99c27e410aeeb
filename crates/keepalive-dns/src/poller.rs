//! The per-hostname resolution cache and its refresh state machine.

use std::net::Ipv4Addr;
use std::sync::{Arc, Weak};
use std::time::Duration;

use keepalive_dns_core::Signal;
use keepalive_dns_core::logging::targets;
use keepalive_dns_core::runtime;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::PollerConfig;
use crate::dns::AddressResolver;
use crate::error::ResolveError;
use crate::lookup::{self, Lookup, LookupCache};

/// A successful resolution attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveSuccess {
    /// The hostname that was resolved.
    pub hostname: String,
    /// How long the resolver took.
    pub duration: Duration,
    /// Whether the address set changed and the lookup handle was replaced.
    pub updated: bool,
}

/// A failed resolution attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveFailure {
    /// The hostname that failed to resolve.
    pub hostname: String,
    /// How long the resolver took to fail.
    pub duration: Duration,
    /// What went wrong.
    pub error: ResolveError,
}

/// Telemetry emitted once per resolution attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveEvent {
    /// The attempt produced an address set.
    Success(ResolveSuccess),
    /// The attempt failed.
    Failure(ResolveFailure),
}

impl ResolveEvent {
    /// The hostname the attempt was made for.
    pub fn hostname(&self) -> &str {
        match self {
            Self::Success(success) => &success.hostname,
            Self::Failure(failure) => &failure.hostname,
        }
    }

    /// How long the attempt took.
    pub fn duration(&self) -> Duration {
        match self {
            Self::Success(success) => success.duration,
            Self::Failure(failure) => failure.duration,
        }
    }

    /// Whether this is a [`ResolveEvent::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

enum RunState {
    Idle,
    Running(oneshot::Sender<()>),
    Stopped,
}

struct PollerInner<R> {
    cache: Arc<LookupCache>,
    resolver: Arc<R>,
    max_retries: u32,
    resolve_event: Arc<Signal<ResolveEvent>>,
}

/// Keeps the addresses of one hostname fresh.
///
/// Once started, the poller resolves its hostname immediately and then once
/// per refresh interval. A failed attempt is retried straight away, up to
/// `max_retries` attempts per cycle; after that the poller keeps whatever it
/// had cached and waits for the next tick.
///
/// Callers get at the cache through [`lookup`](Self::lookup). Before the
/// first attempt completes this is a pending handle that queues calls; the
/// queue is answered with the outcome of that first attempt only, even when
/// later retries succeed. After the first success the handle serves from
/// cache and is replaced whenever the resolved address set changes.
///
/// # Example
///
/// ```ignore
/// use keepalive_dns::{HickoryResolver, Poller, PollerConfig, ResolveEvent};
/// use std::sync::Arc;
///
/// let poller = Poller::new("example.com", Arc::new(HickoryResolver::system()), PollerConfig::default());
///
/// poller.resolve_event.connect(|event| {
///     if let ResolveEvent::Failure(failure) = event {
///         eprintln!("{} failed: {}", failure.hostname, failure.error);
///     }
/// });
///
/// poller.start();
/// let address = poller.lookup().lookup("example.com").await?;
/// ```
pub struct Poller<R: AddressResolver> {
    /// Signal emitted after every resolution attempt.
    pub resolve_event: Arc<Signal<ResolveEvent>>,

    inner: Arc<PollerInner<R>>,
    config: PollerConfig,
    run: Mutex<RunState>,
}

impl<R: AddressResolver> Poller<R> {
    /// Create a stopped poller for `hostname`.
    ///
    /// Zero values in `config` are replaced with their defaults.
    pub fn new(hostname: impl Into<String>, resolver: Arc<R>, config: PollerConfig) -> Self {
        let config = config.normalized();
        let resolve_event = Arc::new(Signal::new());
        let hostname: String = hostname.into();

        Self {
            resolve_event: Arc::clone(&resolve_event),
            inner: Arc::new(PollerInner {
                cache: LookupCache::new(Arc::from(hostname)),
                resolver,
                max_retries: config.max_retries,
                resolve_event,
            }),
            config,
            run: Mutex::new(RunState::Idle),
        }
    }

    /// The hostname this poller resolves.
    pub fn hostname(&self) -> &str {
        self.inner.cache.hostname()
    }

    /// The effective configuration.
    pub fn config(&self) -> PollerConfig {
        self.config
    }

    /// The current lookup handle.
    ///
    /// Returns the same handle until a resolution changes the address set.
    pub fn lookup(&self) -> Lookup {
        self.inner.cache.current()
    }

    /// Start polling: resolve now, then once per refresh interval.
    ///
    /// Does nothing if the poller is already running. A poller that has been
    /// stopped stays stopped.
    /// Must be called from within a tokio runtime or the background runtime
    /// is used.
    pub fn start(&self) {
        let mut run = self.run.lock();
        match *run {
            RunState::Idle => {}
            RunState::Running(_) => return,
            RunState::Stopped => {
                tracing::debug!(target: targets::POLLER, hostname = self.hostname(), "start after stop ignored");
                return;
            }
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        *run = RunState::Running(stop_tx);
        drop(run);

        tracing::debug!(
            target: targets::POLLER,
            hostname = self.hostname(),
            interval_ms = self.config.refresh_interval.as_millis() as u64,
            max_retries = self.config.max_retries,
            "poller started"
        );
        runtime::spawn(poll_loop(
            Arc::downgrade(&self.inner),
            self.config.refresh_interval,
            stop_rx,
        ));
    }

    /// Stop the refresh timer.
    ///
    /// A cycle already in flight runs to completion and may still update the
    /// cache. The last lookup handle stays valid. Safe to call repeatedly;
    /// calling it before [`start`](Self::start) has no effect.
    pub fn stop(&self) {
        let mut run = self.run.lock();
        if !matches!(*run, RunState::Running(_)) {
            return;
        }
        if let RunState::Running(stop_tx) = std::mem::replace(&mut *run, RunState::Stopped) {
            let _ = stop_tx.send(());
        }
        tracing::debug!(target: targets::POLLER, hostname = self.hostname(), "poller stopped");
    }

    /// Whether the refresh timer is armed.
    pub fn is_running(&self) -> bool {
        matches!(*self.run.lock(), RunState::Running(_))
    }
}

impl<R: AddressResolver> Drop for Poller<R> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<R: AddressResolver> std::fmt::Debug for Poller<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("hostname", &self.hostname())
            .field("config", &self.config)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

/// The refresh timer. Holds only a weak reference so that dropping the
/// poller ends the task.
async fn poll_loop<R: AddressResolver>(
    inner: Weak<PollerInner<R>>,
    period: Duration,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    // cycles run inline; a late tick is dropped rather than run back to back
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    if !run_cycle(&inner).await {
        return;
    }

    loop {
        tokio::select! {
            // a stop that arrived during a long cycle wins over an overdue tick
            biased;

            _ = &mut stop_rx => break,
            _ = ticker.tick() => {
                if !run_cycle(&inner).await {
                    break;
                }
            }
        }
    }
}

async fn run_cycle<R: AddressResolver>(inner: &Weak<PollerInner<R>>) -> bool {
    match inner.upgrade() {
        Some(inner) => {
            inner.refresh().await;
            true
        }
        None => false,
    }
}

impl<R: AddressResolver> PollerInner<R> {
    /// One refresh cycle: attempt resolution until it succeeds or the retry
    /// budget is spent.
    #[tracing::instrument(
        skip(self),
        target = "keepalive_dns::poller",
        level = "debug",
        name = "refresh_cycle",
        fields(hostname = %self.cache.hostname())
    )]
    async fn refresh(&self) {
        let hostname = self.cache.hostname();
        let mut tries = self.max_retries;

        while tries > 0 {
            let started = Instant::now();
            let outcome = match self.resolver.resolve_v4(hostname).await {
                Ok(addresses) if addresses.is_empty() => {
                    Err(ResolveError::NoAddresses(hostname.to_string()))
                }
                other => other,
            };
            let duration = started.elapsed();

            match outcome {
                Ok(addresses) => {
                    self.succeeded(&addresses, duration);
                    return;
                }
                Err(error) => {
                    tries -= 1;
                    self.failed(error, duration, tries);
                }
            }
        }
    }

    fn succeeded(&self, addresses: &[Ipv4Addr], duration: Duration) {
        let hostname = self.cache.hostname();

        // swap before anyone hears about it
        let updated = self.cache.update(addresses);
        if updated {
            let current = self.cache.current();
            tracing::info!(
                target: targets::POLLER,
                hostname,
                key = current.key(),
                duration_ms = duration.as_millis() as u64,
                "address set changed"
            );
        } else {
            tracing::debug!(
                target: targets::POLLER,
                hostname,
                duration_ms = duration.as_millis() as u64,
                "address set unchanged"
            );
        }

        self.resolve_event.emit(ResolveEvent::Success(ResolveSuccess {
            hostname: hostname.to_string(),
            duration,
            updated,
        }));

        if let Some(pending) = self.cache.take_pending() {
            lookup::drain_pending(hostname, pending, Ok(addresses));
        }
    }

    fn failed(&self, error: ResolveError, duration: Duration, tries_left: u32) {
        let hostname = self.cache.hostname();
        tracing::warn!(
            target: targets::POLLER,
            hostname,
            error = %error,
            duration_ms = duration.as_millis() as u64,
            "resolution failed"
        );

        let pending = self.cache.take_pending();

        self.resolve_event.emit(ResolveEvent::Failure(ResolveFailure {
            hostname: hostname.to_string(),
            duration,
            error: error.clone(),
        }));

        if let Some(pending) = pending {
            lookup::drain_pending(hostname, pending, Err(&error));
        }

        if tries_left > 0 {
            tracing::debug!(target: targets::POLLER, hostname, tries_left, "retrying resolution");
        } else {
            tracing::debug!(target: targets::POLLER, hostname, "retries exhausted until next tick");
        }
    }
}
