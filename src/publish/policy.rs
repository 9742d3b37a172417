//! Which event types are debounced, and for how long.

use std::time::Duration;

/// Default window applied to site status notifications
pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_secs(5);

/// Event type whose bursts are debounced out of the box
pub const SITE_CHANGED: &str = "monitor:site_changed";

/// One debounced category: an exact event type, or a prefix ending in `*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebounceRule {
    pattern: String,
    window: Duration,
}

impl DebounceRule {
    pub fn new(pattern: impl Into<String>, window: Duration) -> Self {
        Self {
            pattern: pattern.into(),
            window,
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn matches(&self, event_type: &str) -> bool {
        match self.pattern.strip_suffix('*') {
            Some(prefix) => event_type.starts_with(prefix),
            None => self.pattern == event_type,
        }
    }
}

/// Ordered rule list; the first matching rule wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebouncePolicy {
    rules: Vec<DebounceRule>,
}

impl DebouncePolicy {
    /// A policy that debounces nothing
    pub fn none() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with_rule(mut self, pattern: impl Into<String>, window: Duration) -> Self {
        self.rules.push(DebounceRule::new(pattern, window));
        self
    }

    pub fn rules(&self) -> &[DebounceRule] {
        &self.rules
    }

    pub fn rule_for(&self, event_type: &str) -> Option<&DebounceRule> {
        self.rules.iter().find(|rule| rule.matches(event_type))
    }
}

impl Default for DebouncePolicy {
    fn default() -> Self {
        Self::none().with_rule(SITE_CHANGED, DEFAULT_DEBOUNCE_WINDOW)
    }
}

impl FromIterator<DebounceRule> for DebouncePolicy {
    fn from_iter<I: IntoIterator<Item = DebounceRule>>(iter: I) -> Self {
        Self {
            rules: iter.into_iter().collect(),
        }
    }
}
