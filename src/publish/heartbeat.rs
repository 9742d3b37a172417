use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::{Notification, Publisher};

pub const HEARTBEAT_EVENT: &str = "system:heartbeat";

#[derive(Debug, Serialize)]
struct Heartbeat {
    subscribers: usize,
    sequence: u64,
}

impl Notification for Heartbeat {
    fn event_type(&self) -> &str {
        HEARTBEAT_EVENT
    }
}

/// Publish a `system:heartbeat` event every `every` until `cancel` fires.
pub fn spawn_heartbeat(
    publisher: Publisher,
    every: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut sequence = 0u64;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    sequence += 1;
                    let beat = Heartbeat {
                        subscribers: publisher.hub().subscriber_count(),
                        sequence,
                    };
                    publisher.publish_event(&beat);
                }
            }
        }

        tracing::debug!(sent = sequence, "heartbeat stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::ReceivedEvent;
    use crate::hub::Hub;
    use crate::publish::DebouncePolicy;

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_reports_subscribers() {
        let hub = Hub::new(8);
        let mut sink = hub.register();
        let cancel = CancellationToken::new();
        let handle = spawn_heartbeat(
            Publisher::new(hub.clone(), DebouncePolicy::none()),
            Duration::from_secs(10),
            cancel.clone(),
        );

        for expected in 1..=2u64 {
            let bytes = sink.recv().await.unwrap();
            let event = ReceivedEvent::from_slice(&bytes).unwrap();
            assert_eq!(event.event_type, HEARTBEAT_EVENT);
            assert_eq!(event.data["subscribers"], 1);
            assert_eq!(event.data["sequence"], expected);
        }

        cancel.cancel();
        handle.await.unwrap();
    }
}
