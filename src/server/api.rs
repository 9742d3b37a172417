use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures::StreamExt;
use tokio::net::TcpListener;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use super::auth::{self, Authorizer};
use crate::config::PulseConfig;
use crate::error::AdmissionError;
use crate::hub::Hub;
use crate::stream::StreamSession;

/// Bytes the session may have in flight toward the HTTP body before its
/// writes wait on the client
const PIPE_CAPACITY: usize = 16 * 1024;

#[derive(Clone)]
pub struct AppState {
    /// `None` when events are disabled; the stream endpoint then answers 503
    pub hub: Option<Hub>,
    pub authorizer: Arc<dyn Authorizer>,
    pub keep_alive: Duration,
    /// Parent of every session's cancellation token
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn from_config(config: &PulseConfig, shutdown: CancellationToken) -> Self {
        let hub = config
            .events
            .enabled
            .then(|| Hub::new(config.events.buffer_capacity));

        Self {
            hub,
            authorizer: auth::from_config(&config.auth),
            keep_alive: config.keep_alive(),
            shutdown,
        }
    }
}

pub fn router(state: AppState, events_path: &str) -> Router {
    Router::new()
        .route("/health", get(|| async { Json("OK") }))
        .route(events_path, get(events_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `app` on `listener` until `shutdown` is cancelled.
pub async fn serve(listener: TcpListener, app: Router, shutdown: CancellationToken) -> Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "event server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("event server stopped");
    Ok(())
}

async fn events_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AdmissionError> {
    let hub = state.hub.as_ref().ok_or(AdmissionError::Unavailable)?;

    if !state.authorizer.authorize(&headers) {
        tracing::debug!("rejected unauthorized stream request");
        return Err(AdmissionError::Unauthorized);
    }

    let session = StreamSession::open(hub, state.keep_alive);
    let id = session.subscriber_id();
    let cancel = state.shutdown.child_token();
    let (writer, reader) = tokio::io::duplex(PIPE_CAPACITY);

    // Dropping the response body (client gone) cancels the session at once
    // instead of waiting for the next failed write.
    let guard = cancel.clone().drop_guard();

    tokio::spawn(async move {
        tracing::debug!(subscriber = id, "stream session started");
        session.run(writer, cancel).await;
    });

    let body = ReaderStream::new(reader).map(move |chunk| {
        let _guard = &guard;
        chunk
    });

    Ok((
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Body::from_stream(body),
    )
        .into_response())
}
