//! Stream session: bridges one hub sink to one outbound push connection.
//!
//! A session registers with the hub when opened, announces itself with an
//! initial `: ok` comment, then relays hub messages as `data:` frames and
//! writes a `: ping` comment every keep-alive interval. It leaves the loop on
//! cancellation, on a closed sink, or on the first write error, and always
//! unregisters before returning.

pub mod frame;

use std::io;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::hub::{Hub, Sink, SubscriberId};
use frame::{write_frame, Frame};

pub use frame::FrameDecoder;

/// Default interval between keep-alive comments
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(30);

/// Shortest keep-alive interval a session will use
pub const MIN_KEEP_ALIVE: Duration = Duration::from_secs(1);

/// Why a session left its relay loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The connection went away or the server is shutting down
    Cancelled,
    /// The hub closed the sink
    SinkClosed,
    /// Writing to the transport failed
    TransportClosed(io::ErrorKind),
}

pub struct StreamSession {
    sink: Sink,
    keep_alive: Duration,
}

impl StreamSession {
    /// Register a new sink with `hub`. Keep-alive intervals below
    /// [`MIN_KEEP_ALIVE`] are raised to it.
    pub fn open(hub: &Hub, keep_alive: Duration) -> Self {
        Self {
            sink: hub.register(),
            keep_alive: keep_alive.max(MIN_KEEP_ALIVE),
        }
    }

    pub fn keep_alive(&self) -> Duration {
        self.keep_alive
    }

    pub fn subscriber_id(&self) -> SubscriberId {
        self.sink.id()
    }

    /// Relay until cancelled or the transport fails, then unregister and
    /// shut the writer down.
    pub async fn run<W>(self, mut writer: W, cancel: CancellationToken) -> SessionEnd
    where
        W: AsyncWrite + Unpin,
    {
        let Self {
            mut sink,
            keep_alive,
        } = self;
        let id = sink.id();

        let end = relay(&mut sink, &mut writer, keep_alive, &cancel).await;

        // Dropping the sink unregisters it, also when unwinding out of the
        // relay above.
        drop(sink);
        let _ = writer.shutdown().await;

        tracing::debug!(subscriber = id, ?end, "stream session closed");
        end
    }
}

async fn relay<W>(
    sink: &mut Sink,
    writer: &mut W,
    keep_alive: Duration,
    cancel: &CancellationToken,
) -> SessionEnd
where
    W: AsyncWrite + Unpin,
{
    if let Some(end) = send(writer, &Frame::comment("ok"), cancel).await {
        return end;
    }

    let mut ticker = tokio::time::interval_at(Instant::now() + keep_alive, keep_alive);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => return SessionEnd::Cancelled,
            message = sink.recv() => match message {
                Some(payload) => Frame::Data(payload),
                None => return SessionEnd::SinkClosed,
            },
            _ = ticker.tick() => Frame::comment("ping"),
        };

        if let Some(end) = send(writer, &frame, cancel).await {
            return end;
        }
    }
}

/// Write a frame, giving up early if cancelled while the transport is backed up.
async fn send<W>(writer: &mut W, frame: &Frame, cancel: &CancellationToken) -> Option<SessionEnd>
where
    W: AsyncWrite + Unpin,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Some(SessionEnd::Cancelled),
        result = write_frame(writer, frame) => result.err().map(|err| SessionEnd::TransportClosed(err.kind())),
    }
}
