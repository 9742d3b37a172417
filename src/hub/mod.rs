//! In-process fan-out hub
//!
//! The hub keeps the sending half of one bounded channel per connected
//! stream. Each [`Sink`] (the receiving half) is owned by exactly one stream
//! session; the hub only holds a registration for it.
//!
//! Delivery is best effort: [`Hub::broadcast`] never blocks and never grows a
//! queue. A subscriber whose buffer is full simply misses that message.

pub mod debounce;

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::Instant;

pub use debounce::DebounceKey;
use debounce::DebounceState;

/// Pending messages a single subscriber may hold before broadcasts start dropping for it
pub const DEFAULT_BUFFER_CAPACITY: usize = 8;

/// Identifier assigned to a sink at registration
pub type SubscriberId = u64;

struct HubState {
    subscribers: HashMap<SubscriberId, mpsc::Sender<Bytes>>,
    debounce: DebounceState,
}

struct HubInner {
    // Guards both the subscriber set and the debounce map. Critical sections
    // are limited to map operations and `try_send`.
    state: Mutex<HubState>,
    capacity: usize,
    next_id: AtomicU64,
}

/// Shared handle to the subscriber set. Cloning is cheap.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

impl Hub {
    /// Create a hub whose sinks buffer up to `capacity` messages (minimum 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                state: Mutex::new(HubState {
                    subscribers: HashMap::new(),
                    debounce: DebounceState::default(),
                }),
                capacity: capacity.max(1),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Per-sink buffer capacity
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Number of currently registered sinks
    pub fn subscriber_count(&self) -> usize {
        self.inner.state.lock().subscribers.len()
    }

    /// Register a new subscriber. The caller becomes the sole owner of the
    /// returned sink; dropping it unregisters.
    pub fn register(&self) -> Sink {
        let (tx, rx) = mpsc::channel(self.inner.capacity);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

        let live = {
            let mut state = self.inner.state.lock();
            state.subscribers.insert(id, tx);
            state.subscribers.len()
        };

        tracing::debug!(subscriber = id, live, "subscriber registered");

        Sink {
            id,
            rx,
            hub: self.clone(),
        }
    }

    /// Remove a sink from the subscriber set and close it.
    ///
    /// Takes the sink by value so it can only happen once per sink.
    pub fn unregister(&self, sink: Sink) {
        debug_assert!(Arc::ptr_eq(&self.inner, &sink.hub.inner));
        drop(sink);
    }

    /// Offer `message` to every registered sink without waiting.
    ///
    /// Returns how many sinks accepted it. Full sinks drop the message.
    pub fn broadcast(&self, message: Bytes) -> usize {
        let mut delivered = 0;
        let mut dropped = 0;

        {
            let state = self.inner.state.lock();
            for tx in state.subscribers.values() {
                match tx.try_send(message.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => dropped += 1,
                }
            }
        }

        if dropped > 0 {
            tracing::trace!(delivered, dropped, "broadcast skipped full subscribers");
        }

        delivered
    }

    /// Debounce check-and-record for `key` under `event_type`.
    ///
    /// Returns `false` when an event with the same key was admitted less than
    /// `window` before `now`; otherwise records `now` and returns `true`.
    pub fn admit(
        &self,
        event_type: &str,
        key: &DebounceKey,
        window: Duration,
        now: Instant,
    ) -> bool {
        self.inner
            .state
            .lock()
            .debounce
            .admit(event_type, key, window, now)
    }

    /// Drop the registration for `id`, closing its channel. No-op if the id is
    /// not registered.
    pub(crate) fn detach(&self, id: SubscriberId) {
        let live = {
            let mut state = self.inner.state.lock();
            // The sender is dropped while the lock is held, so a concurrent
            // broadcast can never observe a half-removed sink.
            match state.subscribers.remove(&id) {
                Some(tx) => {
                    drop(tx);
                    Some(state.subscribers.len())
                }
                None => None,
            }
        };

        if let Some(live) = live {
            tracing::debug!(subscriber = id, live, "subscriber unregistered");
        }
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }
}

impl fmt::Debug for Hub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hub")
            .field("capacity", &self.inner.capacity)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Receiving end of one subscriber's queue.
///
/// Unregisters itself from the hub when dropped, so every exit path of the
/// owning session releases its registration.
pub struct Sink {
    id: SubscriberId,
    rx: mpsc::Receiver<Bytes>,
    hub: Hub,
}

impl Sink {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next message. `None` means the hub closed this sink.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Take a message if one is already queued
    pub fn try_recv(&mut self) -> Option<Bytes> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Sink {
    fn drop(&mut self) {
        self.hub.detach(self.id);
    }
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sink").field("id", &self.id).finish()
    }
}
