//! Configuration
//!
//! Loaded from an optional TOML file, then overridden from the environment
//! (a `.env` file is honoured). Every field has a default, so an empty file
//! or no file at all gives a working server.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::hub::DEFAULT_BUFFER_CAPACITY;
use crate::publish::policy::{DEFAULT_DEBOUNCE_WINDOW, SITE_CHANGED};
use crate::publish::{DebouncePolicy, DebounceRule};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    pub server: ServerConfig,
    pub events: EventsConfig,
    pub auth: AuthConfig,
    pub debounce: Vec<DebounceRuleConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Route serving the event stream
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// When false the hub is never created and the stream endpoint answers 503
    pub enabled: bool,
    pub buffer_capacity: usize,
    pub keep_alive_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared secret; `None` admits everyone
    pub token: Option<String>,
    pub cookie_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebounceRuleConfig {
    /// Exact event type, or a prefix ending in `*`
    pub event_type: String,
    pub window_ms: u64,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            events: EventsConfig::default(),
            auth: AuthConfig::default(),
            debounce: vec![DebounceRuleConfig {
                event_type: SITE_CHANGED.to_string(),
                window_ms: DEFAULT_DEBOUNCE_WINDOW.as_millis() as u64,
            }],
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            path: "/api/events".to_string(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            keep_alive_secs: 30,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token: None,
            cookie_name: "session_token".to_string(),
        }
    }
}

impl PulseConfig {
    /// Load from `path` (if given) and the process environment, then validate
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("Invalid config: {}", path.display()))
    }

    /// Apply `PULSE_TOKEN` and `PULSE_PORT` from `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.set_token(lookup("PULSE_TOKEN"));
        if let Some(port) = lookup("PULSE_PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("PULSE_PORT is not a valid port: {port}"))?;
        }
        Ok(())
    }

    /// Replace the shared token. `None` and empty strings leave it unchanged.
    pub fn set_token(&mut self, token: Option<String>) {
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            self.auth.token = Some(token);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.events.buffer_capacity == 0 {
            bail!("events.buffer_capacity must be at least 1");
        }
        if self.events.keep_alive_secs == 0 {
            bail!("events.keep_alive_secs must be at least 1");
        }
        if self.auth.token.as_deref() == Some("") {
            bail!("auth.token must not be empty");
        }
        if !self.server.path.starts_with('/') {
            bail!("server.path must start with '/': {}", self.server.path);
        }
        for rule in &self.debounce {
            if rule.window_ms == 0 {
                bail!("debounce window for {} must be positive", rule.event_type);
            }
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.events.keep_alive_secs)
    }

    pub fn debounce_policy(&self) -> DebouncePolicy {
        self.debounce
            .iter()
            .map(|rule| {
                DebounceRule::new(rule.event_type.clone(), Duration::from_millis(rule.window_ms))
            })
            .collect()
    }
}
