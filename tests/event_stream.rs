use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use dx_pulse::client::EventStream;
use dx_pulse::server::{self, AllowAll, AppState, Authorizer, TokenAuthorizer};
use dx_pulse::stream::frame::Frame;
use dx_pulse::{DebouncePolicy, Hub, PublishOutcome, Publisher};
use serde_json::json;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

struct TestServer {
    addr: SocketAddr,
    shutdown: CancellationToken,
    handle: JoinHandle<Result<()>>,
}

impl TestServer {
    async fn start(hub: Option<Hub>, authorizer: Arc<dyn Authorizer>) -> Result<Self> {
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();

        let state = AppState {
            hub,
            authorizer,
            keep_alive: Duration::from_secs(30),
            shutdown: shutdown.clone(),
        };
        let app = server::router(state, "/api/events");
        let handle = tokio::spawn(server::serve(listener, app, shutdown.clone()));

        Ok(Self {
            addr,
            shutdown,
            handle,
        })
    }

    fn url(&self) -> String {
        format!("http://{}/api/events", self.addr)
    }
}

async fn wait_for_subscribers(hub: &Hub, expected: usize) {
    for _ in 0..200 {
        if hub.subscriber_count() == expected {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "expected {expected} subscribers, found {}",
        hub.subscriber_count()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn publish_reaches_every_stream() -> Result<()> {
    let hub = Hub::new(8);
    let publisher = Publisher::new(hub.clone(), DebouncePolicy::default());
    let server = TestServer::start(Some(hub.clone()), Arc::new(AllowAll)).await?;

    let mut a = EventStream::connect(&server.url(), None).await?;
    let mut b = EventStream::connect(&server.url(), None).await?;
    assert_eq!(a.next_frame().await?, Some(Frame::comment("ok")));
    assert_eq!(b.next_frame().await?, Some(Frame::comment("ok")));
    wait_for_subscribers(&hub, 2).await;

    assert_eq!(
        publisher.publish("widget:test", &json!({"x": 1})),
        PublishOutcome::Forwarded(2)
    );
    publisher.publish("widget:test", &json!({"x": 2}));

    for stream in [&mut a, &mut b] {
        let first = timeout(Duration::from_secs(3), stream.next_event())
            .await??
            .expect("first event");
        assert_eq!(first.event_type, "widget:test");
        assert_eq!(first.data, json!({"x": 1}));

        let second = timeout(Duration::from_secs(3), stream.next_event())
            .await??
            .expect("second event");
        assert_eq!(second.data, json!({"x": 2}));
    }

    server.shutdown.cancel();
    server.handle.await??;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn disconnect_releases_subscriber() -> Result<()> {
    let hub = Hub::new(8);
    let server = TestServer::start(Some(hub.clone()), Arc::new(AllowAll)).await?;

    let mut stream = EventStream::connect(&server.url(), None).await?;
    assert_eq!(stream.next_frame().await?, Some(Frame::comment("ok")));
    wait_for_subscribers(&hub, 1).await;

    drop(stream);
    wait_for_subscribers(&hub, 0).await;
    assert_eq!(hub.broadcast(bytes::Bytes::from_static(b"{}")), 0);

    server.shutdown.cancel();
    server.handle.await??;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_closes_open_streams() -> Result<()> {
    let hub = Hub::new(8);
    let server = TestServer::start(Some(hub.clone()), Arc::new(AllowAll)).await?;

    let mut stream = EventStream::connect(&server.url(), None).await?;
    assert_eq!(stream.next_frame().await?, Some(Frame::comment("ok")));

    server.shutdown.cancel();
    let end = timeout(Duration::from_secs(3), stream.next_frame()).await?;
    assert!(matches!(end, Ok(None) | Err(_)));

    timeout(Duration::from_secs(3), server.handle).await???;
    assert_eq!(hub.subscriber_count(), 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn token_is_required_when_configured() -> Result<()> {
    let hub = Hub::new(8);
    let server = TestServer::start(
        Some(hub.clone()),
        Arc::new(TokenAuthorizer::new("s3cret", "session_token")),
    )
    .await?;

    let response = reqwest::get(server.url()).await?;
    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = serde_json::from_slice(&response.bytes().await?)?;
    assert_eq!(body["status"], 401);
    assert_eq!(hub.subscriber_count(), 0);

    assert!(EventStream::connect(&server.url(), Some("wrong")).await.is_err());

    let mut stream = EventStream::connect(&server.url(), Some("s3cret")).await?;
    assert_eq!(stream.next_frame().await?, Some(Frame::comment("ok")));
    wait_for_subscribers(&hub, 1).await;

    drop(stream);
    server.shutdown.cancel();
    server.handle.await??;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn disabled_events_answer_service_unavailable() -> Result<()> {
    let server = TestServer::start(None, Arc::new(AllowAll)).await?;

    let response = reqwest::get(server.url()).await?;
    assert_eq!(response.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);

    server.shutdown.cancel();
    server.handle.await??;
    Ok(())
}
