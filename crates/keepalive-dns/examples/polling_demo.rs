//! Polling DNS demo.
//!
//! Sends bursts of HTTPS requests to a few hosts through one agent, resolving
//! through a shared registry, and prints where each request went.
//!
//! Run with: `cargo run -p keepalive-dns --example polling_demo`
//!
//! Set `RUST_LOG=keepalive_dns=debug` to watch the pollers and partitions.

use std::sync::Arc;
use std::time::Duration;

use keepalive_dns::{DnsPolling, HickoryResolver, HttpsAgent, ResolveEvent};
use tracing_subscriber::EnvFilter;

const HOSTS: &[&str] = &["example.com", "github.com"];

async fn make_request(polling: Arc<DnsPolling>, agent: Arc<HttpsAgent>, hostname: &'static str) {
    let lookup = polling.lookup(hostname);
    let request = match agent.get(format!("https://{hostname}/"), Some(&lookup)) {
        Ok(request) => request,
        Err(e) => {
            eprintln!("req error {hostname}: {e}");
            return;
        }
    };

    match request.send().await {
        Ok(response) => {
            let remote = response
                .remote_addr()
                .map(|addr| addr.ip().to_string())
                .unwrap_or_default();
            let status = response.status();
            match response.text().await {
                Ok(body) => println!("{hostname} {remote} {status} {}", body.len()),
                Err(e) => eprintln!("res error {hostname}: {e}"),
            }
        }
        Err(e) => eprintln!("req error {hostname}: {e}"),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let polling = Arc::new(DnsPolling::<HickoryResolver>::system());
    let agent = Arc::new(HttpsAgent::new());

    polling.resolve_event.connect(|event| match event {
        ResolveEvent::Success(s) => {
            println!("resolved {} in {:?} (updated: {})", s.hostname, s.duration, s.updated)
        }
        ResolveEvent::Failure(f) => {
            println!("failed {} in {:?}: {}", f.hostname, f.duration, f.error)
        }
    });

    let mut tasks = Vec::new();
    for (round, burst) in [1usize, 3, 3, 3].into_iter().enumerate() {
        if round > 0 {
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        for &hostname in HOSTS {
            for _ in 0..burst {
                tasks.push(tokio::spawn(make_request(
                    Arc::clone(&polling),
                    Arc::clone(&agent),
                    hostname,
                )));
            }
        }
    }

    for task in tasks {
        let _ = task.await;
    }

    println!("partitions: {}", agent.partition_count());
    polling.stop();
}
