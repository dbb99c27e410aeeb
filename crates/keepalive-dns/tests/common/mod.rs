//! Shared helpers for keepalive-dns integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::net::Ipv4Addr;
use std::time::Duration;

use keepalive_dns::{AddressResolver, ResolveError, ResolveEvent, Signal};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;

pub type Answer = Result<Vec<Ipv4Addr>, ResolveError>;

/// An [`AddressResolver`] answering from a per-hostname script.
///
/// One-shot answers queued with [`queue`](Self::queue) are consumed first;
/// after that the answer set with [`set`](Self::set) is returned on every
/// call. Hostnames with neither fail. An optional delay makes every call
/// take that long to answer.
#[derive(Default)]
pub struct ScriptedResolver {
    queued: Mutex<HashMap<String, VecDeque<Answer>>>,
    answers: Mutex<HashMap<String, Answer>>,
    calls: Mutex<Vec<(String, Instant)>>,
    delay: Mutex<Duration>,
}

impl ScriptedResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every call for `hostname` with `answer`.
    pub fn set(&self, hostname: &str, answer: Answer) {
        self.answers.lock().insert(hostname.to_string(), answer);
    }

    /// Answer the next call for `hostname` with `answer`.
    pub fn queue(&self, hostname: &str, answer: Answer) {
        self.queued
            .lock()
            .entry(hostname.to_string())
            .or_default()
            .push_back(answer);
    }

    /// Take `delay` to answer each call.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    /// Total number of resolver calls.
    pub fn calls(&self) -> usize {
        self.calls.lock().len()
    }

    /// Number of resolver calls for `hostname`.
    pub fn calls_for(&self, hostname: &str) -> usize {
        self.calls.lock().iter().filter(|(h, _)| h == hostname).count()
    }

    /// When each call was made, in order.
    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().iter().map(|(_, at)| *at).collect()
    }

    fn next_answer(&self, hostname: &str) -> Answer {
        if let Some(answer) = self
            .queued
            .lock()
            .get_mut(hostname)
            .and_then(VecDeque::pop_front)
        {
            return answer;
        }
        self.answers
            .lock()
            .get(hostname)
            .cloned()
            .unwrap_or_else(|| Err(ResolveError::lookup(hostname, "no answer scripted")))
    }
}

impl AddressResolver for ScriptedResolver {
    async fn resolve_v4(&self, hostname: &str) -> Result<Vec<Ipv4Addr>, ResolveError> {
        self.calls.lock().push((hostname.to_string(), Instant::now()));
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.next_answer(hostname)
    }
}

pub fn addrs(list: &[&str]) -> Vec<Ipv4Addr> {
    list.iter().map(|s| s.parse().unwrap()).collect()
}

pub fn lookup_error(hostname: &str, message: &str) -> ResolveError {
    ResolveError::lookup(hostname, message)
}

/// Forward every event emitted on `signal` into a channel.
pub fn collect(signal: &Signal<ResolveEvent>) -> mpsc::UnboundedReceiver<ResolveEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    signal.connect(move |event| {
        let _ = tx.send(event.clone());
    });
    rx
}

/// Everything received so far.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<ResolveEvent>) -> Vec<ResolveEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Let spawned tasks run until the runtime is idle.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
