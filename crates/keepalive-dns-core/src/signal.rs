//! Typed signals for keepalive-dns.
//!
//! A [`Signal<Args>`] is a closed, typed notification channel: subscribers
//! connect a slot for exactly one payload type, and emitters can only emit
//! values of that type. Pollers and registries publish their resolution
//! telemetry through signals, so forwarding one signal into another can
//! never leak a payload of a different kind.
//!
//! # Connection Types
//!
//! - **Direct** (default): the slot runs synchronously inside [`Signal::emit`]
//! - **Queued**: the slot is deferred onto the async runtime and runs on a
//!   later turn
//!
//! # Example
//!
//! ```
//! use keepalive_dns_core::Signal;
//!
//! let refreshed = Signal::<String>::new();
//!
//! let conn_id = refreshed.connect(|hostname| {
//!     println!("refreshed {hostname}");
//! });
//!
//! refreshed.emit("example.com".to_string());
//! refreshed.disconnect(conn_id);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

use crate::logging::targets;
use crate::runtime;

new_key_type! {
    /// A unique identifier for a signal-slot connection.
    ///
    /// Use this ID to disconnect a specific connection via [`Signal::disconnect`].
    pub struct ConnectionId;
}

/// Specifies how a connected slot should be invoked when the signal is emitted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionType {
    /// Invoke the slot immediately, on the emitting task.
    #[default]
    Direct,

    /// Defer the slot onto the async runtime.
    ///
    /// The slot never runs inside `emit`; it runs once the runtime gets
    /// around to the spawned task.
    Queued,
}

type Slot<Args> = Arc<dyn Fn(&Args) + Send + Sync>;

struct Connection<Args> {
    slot: Slot<Args>,
    connection_type: ConnectionType,
}

/// A type-safe signal that can have multiple connected slots.
///
/// `Signal<Args>` is `Send + Sync` and is usually shared behind an `Arc` so
/// that background tasks can emit while callers subscribe.
pub struct Signal<Args> {
    connections: Mutex<SlotMap<ConnectionId, Connection<Args>>>,
    blocked: AtomicBool,
}

impl<Args: Clone + Send + 'static> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args: Clone + Send + 'static> Signal<Args> {
    /// Create a new signal with no connections.
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(SlotMap::with_key()),
            blocked: AtomicBool::new(false),
        }
    }

    /// Connect a slot that is invoked directly on every emission.
    pub fn connect<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.connect_with_type(slot, ConnectionType::Direct)
    }

    /// Connect a slot with a specific connection type.
    ///
    /// # Example
    ///
    /// ```
    /// use keepalive_dns_core::{ConnectionType, Signal};
    ///
    /// let signal = Signal::<u32>::new();
    /// signal.connect_with_type(|n| println!("direct {n}"), ConnectionType::Direct);
    /// signal.connect_with_type(|n| println!("later {n}"), ConnectionType::Queued);
    /// ```
    pub fn connect_with_type<F>(&self, slot: F, connection_type: ConnectionType) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        let connection = Connection {
            slot: Arc::new(slot),
            connection_type,
        };
        self.connections.lock().insert(connection)
    }

    /// Disconnect a specific slot by its connection ID.
    ///
    /// Returns `true` if the connection was found and removed.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.connections.lock().remove(id).is_some()
    }

    /// Disconnect all slots from this signal.
    pub fn disconnect_all(&self) {
        self.connections.lock().clear();
    }

    /// Get the number of connected slots.
    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Block signal emission temporarily. While blocked, `emit` drops its
    /// arguments.
    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::SeqCst);
    }

    /// Check if signal emission is currently blocked.
    pub fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::SeqCst)
    }

    /// Emit the signal, invoking all connected slots.
    ///
    /// The connection table is snapshotted first and the lock released, so a
    /// slot may connect to or disconnect from this same signal.
    #[tracing::instrument(skip_all, target = "keepalive_dns_core::signal", level = "trace")]
    pub fn emit(&self, args: Args) {
        if self.is_blocked() {
            tracing::trace!(target: targets::SIGNAL, "signal blocked, skipping emit");
            return;
        }

        let snapshot: Vec<(Slot<Args>, ConnectionType)> = self
            .connections
            .lock()
            .values()
            .map(|conn| (Arc::clone(&conn.slot), conn.connection_type))
            .collect();
        tracing::trace!(target: targets::SIGNAL, connection_count = snapshot.len(), "emitting signal");

        for (slot, connection_type) in snapshot {
            match connection_type {
                ConnectionType::Direct => slot(&args),
                ConnectionType::Queued => {
                    let args = args.clone();
                    runtime::spawn(async move {
                        slot(&args);
                    });
                }
            }
        }
    }
}
