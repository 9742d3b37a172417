//! Publish gate: debounce, wrap in an [`Envelope`], fan out through the hub.
//!
//! Publishing is fire-and-forget. Nothing here returns an error to the
//! producer; a payload that fails to serialize is logged and abandoned.

pub mod heartbeat;
pub mod policy;

use std::sync::Arc;

use serde::Serialize;
use tokio::time::Instant;

use crate::envelope::Envelope;
use crate::hub::{DebounceKey, Hub};

pub use heartbeat::spawn_heartbeat;
pub use policy::{DebouncePolicy, DebounceRule};

/// A typed event that knows its own type and debounce key.
pub trait Notification: Serialize {
    fn event_type(&self) -> &str;

    /// Key used when the event type is debounced. `None` forwards unconditionally.
    fn debounce_key(&self) -> Option<DebounceKey> {
        None
    }
}

/// What happened to a publish call. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Broadcast to the hub; holds the number of sinks that accepted it
    Forwarded(usize),
    /// Same key seen inside the debounce window
    Debounced,
    /// Payload could not be serialized
    Dropped,
}

/// Producer-facing handle. Cheap to clone and safe to share across tasks.
#[derive(Debug, Clone)]
pub struct Publisher {
    hub: Hub,
    policy: Arc<DebouncePolicy>,
}

impl Publisher {
    pub fn new(hub: Hub, policy: DebouncePolicy) -> Self {
        Self {
            hub,
            policy: Arc::new(policy),
        }
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    pub fn policy(&self) -> &DebouncePolicy {
        &self.policy
    }

    /// Publish without a debounce key. Debounced event types are still
    /// forwarded every time.
    pub fn publish<T: Serialize>(&self, event_type: &str, payload: &T) -> PublishOutcome {
        self.dispatch(event_type, None, payload)
    }

    /// Publish with an explicit debounce key
    pub fn publish_keyed<T: Serialize>(
        &self,
        event_type: &str,
        key: impl Into<DebounceKey>,
        payload: &T,
    ) -> PublishOutcome {
        self.dispatch(event_type, Some(key.into()), payload)
    }

    pub fn publish_event<N: Notification>(&self, notification: &N) -> PublishOutcome {
        self.dispatch(
            notification.event_type(),
            notification.debounce_key(),
            notification,
        )
    }

    fn dispatch<T: Serialize>(
        &self,
        event_type: &str,
        key: Option<DebounceKey>,
        payload: &T,
    ) -> PublishOutcome {
        if let (Some(rule), Some(key)) = (self.policy.rule_for(event_type), key.as_ref()) {
            if !self.hub.admit(event_type, key, rule.window(), Instant::now()) {
                return PublishOutcome::Debounced;
            }
        }

        let bytes = match Envelope::new(event_type, payload).to_bytes() {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(event_type, error = %err, "failed to serialize event");
                return PublishOutcome::Dropped;
            }
        };

        PublishOutcome::Forwarded(self.hub.broadcast(bytes))
    }
}
