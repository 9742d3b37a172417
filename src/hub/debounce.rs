//! Per-key debounce bookkeeping kept inside the hub lock.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Keys tracked per event type, and event types tracked overall, before
/// stale entries are pruned
const PRUNE_THRESHOLD: usize = 1024;

/// Groups related events for suppression (e.g. which widget an event concerns).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DebounceKey {
    Id(u64),
    Name(String),
}

impl fmt::Display for DebounceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DebounceKey::Id(id) => write!(f, "{id}"),
            DebounceKey::Name(name) => f.write_str(name),
        }
    }
}

impl From<u64> for DebounceKey {
    fn from(id: u64) -> Self {
        DebounceKey::Id(id)
    }
}

impl From<u32> for DebounceKey {
    fn from(id: u32) -> Self {
        DebounceKey::Id(u64::from(id))
    }
}

impl From<&str> for DebounceKey {
    fn from(name: &str) -> Self {
        DebounceKey::Name(name.to_string())
    }
}

impl From<String> for DebounceKey {
    fn from(name: String) -> Self {
        DebounceKey::Name(name)
    }
}

#[derive(Debug)]
struct Scope {
    window: Duration,
    last: HashMap<DebounceKey, Instant>,
    prune_at: usize,
}

impl Scope {
    fn new(window: Duration) -> Self {
        Self {
            window,
            last: HashMap::new(),
            prune_at: PRUNE_THRESHOLD,
        }
    }

    fn prune(&mut self, now: Instant) {
        let window = self.window;
        self.last
            .retain(|_, last| now.saturating_duration_since(*last) < window);
        // Keys that are all still live would otherwise trigger a prune on
        // every insert.
        self.prune_at = PRUNE_THRESHOLD.max(self.last.len() * 2);
    }
}

/// Last-forwarded timestamps, scoped by event type.
#[derive(Debug)]
pub(crate) struct DebounceState {
    scopes: HashMap<String, Scope>,
    prune_at: usize,
}

impl Default for DebounceState {
    fn default() -> Self {
        Self {
            scopes: HashMap::new(),
            prune_at: PRUNE_THRESHOLD,
        }
    }
}

impl DebounceState {
    pub(crate) fn admit(
        &mut self,
        event_type: &str,
        key: &DebounceKey,
        window: Duration,
        now: Instant,
    ) -> bool {
        if let Some(scope) = self.scopes.get_mut(event_type) {
            if let Some(last) = scope.last.get(key) {
                if now.saturating_duration_since(*last) < window {
                    return false;
                }
            }
            scope.window = window;
            if scope.last.len() >= scope.prune_at {
                scope.prune(now);
            }
            scope.last.insert(key.clone(), now);
            return true;
        }

        if self.scopes.len() >= self.prune_at {
            self.prune(now);
        }
        let mut scope = Scope::new(window);
        scope.last.insert(key.clone(), now);
        self.scopes.insert(event_type.to_string(), scope);
        true
    }

    /// Prune every scope and drop the ones left without live keys.
    fn prune(&mut self, now: Instant) {
        self.scopes.retain(|_, scope| {
            scope.prune(now);
            !scope.last.is_empty()
        });
        self.prune_at = PRUNE_THRESHOLD.max(self.scopes.len() * 2);
    }

    #[cfg(test)]
    fn tracked(&self, event_type: &str) -> usize {
        self.scopes.get(event_type).map_or(0, |s| s.last.len())
    }

    #[cfg(test)]
    fn scope_count(&self) -> usize {
        self.scopes.len()
    }
}
