//! Core systems for keepalive-dns.
//!
//! This crate provides the building blocks the resolution cache is made of:
//!
//! - **Signals**: typed, closed notification channels for telemetry
//! - **Runtime**: a background runtime for timers and deferred callbacks
//! - **Logging**: `tracing` targets used across the workspace
//!
//! # Signal Example
//!
//! ```
//! use keepalive_dns_core::Signal;
//!
//! let updated = Signal::<bool>::new();
//! let conn_id = updated.connect(|changed| {
//!     println!("address set changed: {changed}");
//! });
//!
//! updated.emit(true);
//! updated.disconnect(conn_id);
//! ```

pub mod logging;
pub mod runtime;
pub mod signal;

pub use signal::{ConnectionId, ConnectionType, Signal};
