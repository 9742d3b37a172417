//! # dx-pulse - In-process event fan-out over server-push streams
//!
//! Producers publish `(event type, payload)` pairs; every connected stream
//! client receives them as `data:` frames of a long-lived HTTP response.
//!
//! ## Features
//!
//! - **Non-blocking fan-out**: a stalled client only ever loses its own messages
//! - **Bounded memory**: each client holds at most a small fixed buffer
//! - **Debouncing**: bursts of events sharing a key are collapsed per event type
//! - **Clean teardown**: a client's registration is released on every exit path
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dx_pulse::{DebouncePolicy, Hub, Publisher};
//! use serde_json::json;
//!
//! let hub = Hub::default();
//! let publisher = Publisher::new(hub.clone(), DebouncePolicy::default());
//!
//! // Suppressed if widget 7 changed less than five seconds ago
//! publisher.publish_keyed("monitor:site_changed", 7u64, &json!({"widget_id": 7, "status": "down"}));
//! publisher.publish("widget:refresh", &json!({"widget_id": 7}));
//! ```

pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod hub;
pub mod publish;
pub mod server;
pub mod stream;

// Re-export main types for library consumers
pub use config::PulseConfig;
pub use envelope::{Envelope, ReceivedEvent};
pub use error::AdmissionError;
pub use hub::{DebounceKey, Hub, Sink};
pub use publish::{DebouncePolicy, DebounceRule, Notification, PublishOutcome, Publisher};
pub use stream::{SessionEnd, StreamSession};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
