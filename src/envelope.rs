//! Wire envelope delivered to subscribers as the `data:` payload.
//!
//! ```json
//! {"type": "monitor:site_changed", "time": 1700000000, "data": {...}}
//! ```

use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Outgoing envelope borrowing its payload. Serialized once per publish and
/// shared by every sink it is sent to.
#[derive(Debug, Serialize)]
pub struct Envelope<'a, T> {
    #[serde(rename = "type")]
    pub event_type: &'a str,
    /// Unix seconds
    pub time: i64,
    pub data: &'a T,
}

impl<'a, T: Serialize> Envelope<'a, T> {
    pub fn new(event_type: &'a str, data: &'a T) -> Self {
        Self {
            event_type,
            time: Utc::now().timestamp(),
            data,
        }
    }

    pub fn to_bytes(&self) -> serde_json::Result<Bytes> {
        serde_json::to_vec(self).map(Bytes::from)
    }
}

/// Envelope as seen by a consumer of the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceivedEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub time: i64,
    pub data: serde_json::Value,
}

impl ReceivedEvent {
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_has_exactly_three_keys() {
        let payload = json!({"x": 1});
        let bytes = Envelope::new("widget:test", &payload).to_bytes().unwrap();

        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 3);
        assert_eq!(object["type"], "widget:test");
        assert_eq!(object["data"], payload);
        assert!(object["time"].is_i64());
    }

    #[test]
    fn test_serialized_envelope_is_single_line() {
        let payload = json!({"text": "line one\nline two"});
        let bytes = Envelope::new("note", &payload).to_bytes().unwrap();
        assert!(!bytes.contains(&b'\n'));

        let event = ReceivedEvent::from_slice(&bytes).unwrap();
        assert_eq!(event.data["text"], "line one\nline two");
    }
}
