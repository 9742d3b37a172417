pub mod api;
pub mod auth;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use crate::config::PulseConfig;
use crate::publish::Publisher;

pub use api::{router, serve, AppState};
pub use auth::{AllowAll, Authorizer, TokenAuthorizer};

/// Validate `config`, then bind and run the event server it describes until
/// `shutdown` is cancelled. `on_ready` receives a publisher for the server's hub (none when
/// events are disabled) before the first connection is accepted.
pub async fn start<F>(config: &PulseConfig, shutdown: CancellationToken, on_ready: F) -> Result<()>
where
    F: FnOnce(Option<Publisher>),
{
    config.validate()?;

    let state = AppState::from_config(config, shutdown.clone());
    let publisher = state
        .hub
        .clone()
        .map(|hub| Publisher::new(hub, config.debounce_policy()));

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    on_ready(publisher);
    serve(listener, router(state, &config.server.path), shutdown).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_config() -> PulseConfig {
        let mut config = PulseConfig::default();
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 0;
        config
    }

    #[tokio::test]
    async fn test_start_rejects_relative_path() {
        let mut config = local_config();
        config.server.path = "events".to_string();

        let mut ready = false;
        let result = start(&config, CancellationToken::new(), |_| ready = true).await;
        assert!(result.is_err());
        assert!(!ready);
    }

    #[tokio::test]
    async fn test_start_rejects_zero_keep_alive() {
        let mut config = local_config();
        config.events.keep_alive_secs = 0;

        let mut ready = false;
        let result = start(&config, CancellationToken::new(), |_| ready = true).await;
        assert!(result.is_err());
        assert!(!ready);
    }

    #[tokio::test]
    async fn test_start_serves_until_shutdown() {
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let mut publisher = None;
        start(&local_config(), shutdown, |p| publisher = p)
            .await
            .unwrap();
        assert!(publisher.is_some());
    }
}
