//! Poller state machine tests.

mod common;

use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use common::{ScriptedResolver, addrs, collect, drain, lookup_error, settle};
use keepalive_dns::{
    Lookup, LookupError, Poller, PollerConfig, ResolveError, ResolveEvent, ResolveFailure,
};
use parking_lot::Mutex;
use tokio::sync::oneshot;

const HOST: &str = "example.com";

fn poller(resolver: &Arc<ScriptedResolver>) -> Poller<ScriptedResolver> {
    Poller::new(HOST, Arc::clone(resolver), PollerConfig::default())
}

fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

#[tokio::test]
async fn test_pending_lookup_validates_arguments() {
    let resolver = Arc::new(ScriptedResolver::new());
    let poller = poller(&resolver);
    let initial = poller.lookup();

    assert_eq!(
        initial.resolve("", |_| panic!("must not be called")),
        Err(LookupError::MissingHostname)
    );
    let err = initial
        .resolve("another.com", |_| panic!("must not be called"))
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Invalid lookup: expected example.com but got another.com"
    );
}

#[tokio::test(start_paused = true)]
async fn test_pending_callback_receives_first_success() {
    let resolver = Arc::new(ScriptedResolver::new());
    resolver.set(HOST, Ok(addrs(&["1.1.1.1", "2.2.2.2"])));
    let poller = poller(&resolver);
    let mut events = collect(&poller.resolve_event);

    let (tx, rx) = oneshot::channel();
    let events_seen = Arc::new(Mutex::new(0));
    let events_seen_cb = Arc::clone(&events_seen);
    let observer = collect(&poller.resolve_event);
    let observer = Arc::new(Mutex::new(observer));
    poller
        .lookup()
        .resolve(HOST, move |result| {
            // the success event is emitted before queued callbacks run
            *events_seen_cb.lock() = drain(&mut observer.lock()).len();
            let _ = tx.send(result);
        })
        .unwrap();

    poller.start();
    let address = rx.await.unwrap().unwrap();
    assert!([ip("1.1.1.1"), ip("2.2.2.2")].contains(&address.address));
    assert_eq!(address.family, 4);
    assert_eq!(*events_seen.lock(), 1);

    let events = drain(&mut events);
    assert_eq!(events.len(), 1);
    match &events[0] {
        ResolveEvent::Success(success) => {
            assert_eq!(success.hostname, HOST);
            assert!(success.updated);
        }
        other => panic!("expected success, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_pending_callback_is_deferred() {
    let resolver = Arc::new(ScriptedResolver::new());
    resolver.set(HOST, Ok(addrs(&["1.1.1.1"])));
    let poller = poller(&resolver);

    let called = Arc::new(AtomicUsize::new(0));
    let called_cb = Arc::clone(&called);
    poller
        .lookup()
        .resolve(HOST, move |_| {
            called_cb.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    poller.start();
    assert_eq!(called.load(Ordering::SeqCst), 0);

    settle().await;
    assert_eq!(called.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_pending_callbacks_share_one_resolution() {
    let resolver = Arc::new(ScriptedResolver::new());
    resolver.set(HOST, Ok(addrs(&["1.1.1.1", "2.2.2.2"])));
    let poller = poller(&resolver);
    let mut events = collect(&poller.resolve_event);
    let initial = poller.lookup();

    let results = Arc::new(Mutex::new(Vec::new()));
    for _ in 0..3 {
        let results = Arc::clone(&results);
        initial
            .resolve(HOST, move |result| results.lock().push(result))
            .unwrap();
    }

    poller.start();
    settle().await;

    let results = results.lock();
    assert_eq!(results.len(), 3);
    for result in results.iter() {
        let address = result.as_ref().unwrap();
        assert!([ip("1.1.1.1"), ip("2.2.2.2")].contains(&address.address));
    }
    assert_eq!(resolver.calls(), 1);
    assert_eq!(drain(&mut events).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_resolver_keeps_failing() {
    let resolver = Arc::new(ScriptedResolver::new());
    for attempt in 1..=3 {
        resolver.queue(HOST, Err(lookup_error(HOST, &format!("attempt {attempt}"))));
    }
    let poller = poller(&resolver);
    let mut events = collect(&poller.resolve_event);
    let initial = poller.lookup();

    let results = Arc::new(Mutex::new(Vec::new()));
    let results_cb = Arc::clone(&results);
    initial
        .resolve(HOST, move |result| results_cb.lock().push(result))
        .unwrap();

    poller.start();
    settle().await;

    assert_eq!(resolver.calls(), 3);

    let events = drain(&mut events);
    assert_eq!(events.len(), 3);
    for (attempt, event) in events.iter().enumerate() {
        match event {
            ResolveEvent::Failure(ResolveFailure {
                hostname, error, ..
            }) => {
                assert_eq!(hostname, HOST);
                assert_eq!(*error, lookup_error(HOST, &format!("attempt {}", attempt + 1)));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    // notified once, with the first attempt's error
    let results = results.lock();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0], Err(lookup_error(HOST, "attempt 1")));

    assert_eq!(poller.lookup(), initial);
    assert_eq!(poller.lookup().key(), None);
}

#[tokio::test(start_paused = true)]
async fn test_retry_success_does_not_renotify_pending_callers() {
    let resolver = Arc::new(ScriptedResolver::new());
    resolver.queue(HOST, Err(lookup_error(HOST, "timeout")));
    resolver.set(HOST, Ok(addrs(&["1.1.1.1"])));
    let poller = poller(&resolver);
    let mut events = collect(&poller.resolve_event);

    let results = Arc::new(Mutex::new(Vec::new()));
    let results_cb = Arc::clone(&results);
    poller
        .lookup()
        .resolve(HOST, move |result| results_cb.lock().push(result))
        .unwrap();

    poller.start();
    settle().await;

    assert_eq!(resolver.calls(), 2);
    let events = drain(&mut events);
    assert_eq!(events.len(), 2);
    assert!(!events[0].is_success());
    assert!(matches!(&events[1], ResolveEvent::Success(s) if s.updated));

    assert_eq!(*results.lock(), vec![Err(lookup_error(HOST, "timeout"))]);
    assert_eq!(poller.lookup().key(), Some("1.1.1.1"));
}

#[tokio::test(start_paused = true)]
async fn test_empty_answer_is_a_failure() {
    let resolver = Arc::new(ScriptedResolver::new());
    resolver.set(HOST, Ok(Vec::new()));
    let poller = poller(&resolver);
    let mut events = collect(&poller.resolve_event);

    poller.start();
    settle().await;

    let events = drain(&mut events);
    assert_eq!(events.len(), 3);
    assert!(events.iter().all(|event| matches!(
        event,
        ResolveEvent::Failure(f) if f.error == ResolveError::NoAddresses(HOST.to_string())
    )));
}

#[tokio::test(start_paused = true)]
async fn test_retries_per_cycle_and_interval() {
    let resolver = Arc::new(ScriptedResolver::new());
    let config = PollerConfig::default()
        .refresh_interval(Duration::from_secs(30))
        .max_retries(3);
    let poller = Poller::new(HOST, Arc::clone(&resolver), config);
    let mut events = collect(&poller.resolve_event);

    poller.start();
    settle().await;
    assert_eq!(resolver.calls(), 3);
    assert_eq!(drain(&mut events).len(), 3);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(resolver.calls(), 6);
    assert_eq!(drain(&mut events).len(), 3);

    let times = resolver.call_times();
    assert_eq!(times[0], times[2]);
    assert_eq!(times[3] - times[0], Duration::from_secs(30));
    assert_eq!(times[3], times[5]);
}

#[tokio::test(start_paused = true)]
async fn test_resolved_lookup() {
    let resolver = Arc::new(ScriptedResolver::new());
    resolver.set(HOST, Ok(addrs(&["1.1.1.1", "3.3.3.3", "2.2.2.2"])));
    let poller = poller(&resolver);
    let initial = poller.lookup();

    poller.start();
    settle().await;

    let lookup = poller.lookup();
    assert_ne!(lookup, initial);
    assert!(lookup.is_resolved());
    assert_eq!(lookup.key(), Some("1.1.1.1,2.2.2.2,3.3.3.3"));
    assert!(Lookup::ptr_eq(&lookup, &poller.lookup()));

    // answered synchronously, from cache
    let called = Arc::new(AtomicUsize::new(0));
    for _ in 0..3 {
        let called = Arc::clone(&called);
        lookup
            .resolve(HOST, move |result| {
                let address = result.unwrap();
                assert!(
                    [ip("1.1.1.1"), ip("2.2.2.2"), ip("3.3.3.3")].contains(&address.address)
                );
                assert_eq!(address.family, 4);
                called.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
    }
    assert_eq!(called.load(Ordering::SeqCst), 3);
    assert_eq!(resolver.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unchanged_refresh_keeps_handle() {
    let resolver = Arc::new(ScriptedResolver::new());
    resolver.set(HOST, Ok(addrs(&["2.2.2.2", "1.1.1.1"])));
    let poller = poller(&resolver);
    let mut events = collect(&poller.resolve_event);

    poller.start();
    settle().await;
    let first = poller.lookup();
    drain(&mut events);

    resolver.set(HOST, Ok(addrs(&["1.1.1.1", "2.2.2.2"])));
    tokio::time::sleep(Duration::from_secs(30)).await;

    let events = drain(&mut events);
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], ResolveEvent::Success(s) if !s.updated));
    assert!(Lookup::ptr_eq(&first, &poller.lookup()));
}

#[tokio::test(start_paused = true)]
async fn test_changed_refresh_replaces_handle() {
    let resolver = Arc::new(ScriptedResolver::new());
    resolver.set(HOST, Ok(addrs(&["1.1.1.1", "2.2.2.2"])));
    let poller = poller(&resolver);
    let mut events = collect(&poller.resolve_event);

    poller.start();
    settle().await;
    let first = poller.lookup();
    drain(&mut events);

    resolver.set(HOST, Ok(addrs(&["4.4.4.4"])));
    tokio::time::sleep(Duration::from_secs(30)).await;

    let events = drain(&mut events);
    assert!(matches!(&events[..], [ResolveEvent::Success(s)] if s.updated));

    let second = poller.lookup();
    assert_ne!(second, first);
    assert_eq!(second.key(), Some("4.4.4.4"));

    // handles are never mutated
    assert_eq!(first.key(), Some("1.1.1.1,2.2.2.2"));
    let address = first.lookup(HOST).await.unwrap();
    assert!([ip("1.1.1.1"), ip("2.2.2.2")].contains(&address.address));
}

#[tokio::test(start_paused = true)]
async fn test_failed_refresh_keeps_cache() {
    let resolver = Arc::new(ScriptedResolver::new());
    resolver.queue(HOST, Ok(addrs(&["1.1.1.1"])));
    let poller = poller(&resolver);

    poller.start();
    settle().await;
    let cached = poller.lookup();

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(resolver.calls(), 4);
    assert!(Lookup::ptr_eq(&cached, &poller.lookup()));
    assert_eq!(poller.lookup().key(), Some("1.1.1.1"));
}

#[tokio::test(start_paused = true)]
async fn test_stale_pending_handle_after_success() {
    let resolver = Arc::new(ScriptedResolver::new());
    resolver.set(HOST, Ok(addrs(&["1.1.1.1"])));
    let poller = poller(&resolver);
    let initial = poller.lookup();

    poller.start();
    settle().await;

    let address = initial.lookup(HOST).await.unwrap();
    assert_eq!(address.address, ip("1.1.1.1"));
    assert_eq!(resolver.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stale_pending_handle_without_success() {
    let resolver = Arc::new(ScriptedResolver::new());
    let poller = poller(&resolver);
    let initial = poller.lookup();

    poller.start();
    settle().await;

    let err = initial.lookup(HOST).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        ResolveError::NotResolved(HOST.to_string()).to_string()
    );
}

#[tokio::test(start_paused = true)]
async fn test_start_is_idempotent() {
    let resolver = Arc::new(ScriptedResolver::new());
    resolver.set(HOST, Ok(addrs(&["1.1.1.1"])));
    let poller = poller(&resolver);

    poller.start();
    poller.start();
    settle().await;
    assert!(poller.is_running());
    assert_eq!(resolver.calls(), 1);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(resolver.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_stop_halts_refresh_and_keeps_cache() {
    let resolver = Arc::new(ScriptedResolver::new());
    resolver.set(HOST, Ok(addrs(&["1.1.1.1"])));
    let poller = poller(&resolver);

    poller.start();
    settle().await;
    poller.stop();
    poller.stop();
    assert!(!poller.is_running());

    tokio::time::sleep(Duration::from_secs(90)).await;
    assert_eq!(resolver.calls(), 1);
    assert_eq!(poller.lookup().key(), Some("1.1.1.1"));

    // a stopped poller stays stopped
    poller.start();
    settle().await;
    assert!(!poller.is_running());
    assert_eq!(resolver.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_before_start() {
    let resolver = Arc::new(ScriptedResolver::new());
    resolver.set(HOST, Ok(addrs(&["1.1.1.1"])));
    let poller = poller(&resolver);

    poller.stop();
    poller.start();
    settle().await;
    assert!(poller.is_running());
    assert_eq!(resolver.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_slow_cycle_skips_overdue_tick() {
    let resolver = Arc::new(ScriptedResolver::new());
    resolver.set(HOST, Ok(addrs(&["1.1.1.1"])));
    resolver.set_delay(Duration::from_secs(3));
    let config = PollerConfig::default()
        .refresh_interval(Duration::from_secs(1))
        .max_retries(1);
    let poller = Poller::new(HOST, Arc::clone(&resolver), config);

    poller.start();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(resolver.calls(), 1);
    poller.stop();

    // the in-flight cycle outlives several ticks; none of them may fire
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(resolver.calls(), 1);
    assert!(!poller.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_later_cycle() {
    let resolver = Arc::new(ScriptedResolver::new());
    resolver.set(HOST, Ok(addrs(&["1.1.1.1"])));
    resolver.set_delay(Duration::from_secs(3));
    let config = PollerConfig::default()
        .refresh_interval(Duration::from_secs(1))
        .max_retries(1);
    let poller = Poller::new(HOST, Arc::clone(&resolver), config);

    poller.start();
    // first cycle ends at 3 s, the overdue tick starts the second one
    tokio::time::sleep(Duration::from_millis(4500)).await;
    assert_eq!(resolver.calls(), 2);
    poller.stop();

    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(resolver.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_resolution_completing_after_stop_updates_cache() {
    let resolver = Arc::new(ScriptedResolver::new());
    resolver.set(HOST, Ok(addrs(&["2.2.2.2", "1.1.1.1"])));
    resolver.set_delay(Duration::from_secs(3));
    let poller = poller(&resolver);
    let mut events = collect(&poller.resolve_event);

    let results = Arc::new(Mutex::new(Vec::new()));
    let results_cb = Arc::clone(&results);
    poller
        .lookup()
        .resolve(HOST, move |result| results_cb.lock().push(result))
        .unwrap();

    poller.start();
    tokio::time::sleep(Duration::from_millis(500)).await;
    poller.stop();
    assert!(results.lock().is_empty());

    tokio::time::sleep(Duration::from_secs(90)).await;

    let results = results.lock();
    assert_eq!(results.len(), 1);
    let address = results[0].as_ref().unwrap();
    assert!([ip("1.1.1.1"), ip("2.2.2.2")].contains(&address.address));

    assert_eq!(poller.lookup().key(), Some("1.1.1.1,2.2.2.2"));
    assert!(matches!(&drain(&mut events)[..], [ResolveEvent::Success(s)] if s.updated));
    assert_eq!(resolver.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_poller_ends_timer() {
    let resolver = Arc::new(ScriptedResolver::new());
    resolver.set(HOST, Ok(addrs(&["1.1.1.1"])));
    let poller = poller(&resolver);
    let lookup_before = poller.lookup();

    poller.start();
    settle().await;
    drop(poller);

    tokio::time::sleep(Duration::from_secs(90)).await;
    assert_eq!(resolver.calls(), 1);

    let err = lookup_before.lookup(HOST).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        ResolveError::PollerDropped(HOST.to_string()).to_string()
    );
}

#[test]
fn test_zero_config_uses_defaults() {
    let resolver = Arc::new(ScriptedResolver::new());
    let poller = Poller::new(
        HOST,
        resolver,
        PollerConfig {
            refresh_interval: Duration::ZERO,
            max_retries: 0,
        },
    );
    assert_eq!(poller.config(), PollerConfig::default());
    assert_eq!(poller.hostname(), HOST);
    assert!(!poller.is_running());
}
