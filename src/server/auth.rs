//! Admission checks for the event stream.

use std::sync::Arc;

use axum::http::{header, HeaderMap};
use sha2::{Digest, Sha256};

use crate::config::AuthConfig;

/// Decides whether a request may open a stream.
pub trait Authorizer: Send + Sync {
    fn authorize(&self, headers: &HeaderMap) -> bool;
}

/// Admits every request
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn authorize(&self, _headers: &HeaderMap) -> bool {
        true
    }
}

/// Accepts a shared token either as `Authorization: Bearer <token>` or as a
/// session cookie.
#[derive(Debug, Clone)]
pub struct TokenAuthorizer {
    digest: Vec<u8>,
    cookie_name: String,
}

impl TokenAuthorizer {
    pub fn new(token: impl AsRef<str>, cookie_name: impl Into<String>) -> Self {
        Self {
            digest: Sha256::digest(token.as_ref().as_bytes()).to_vec(),
            cookie_name: cookie_name.into(),
        }
    }

    // Comparing digests keeps the comparison independent of token length.
    fn matches(&self, candidate: &str) -> bool {
        Sha256::digest(candidate.as_bytes()).as_slice() == self.digest.as_slice()
    }
}

impl Authorizer for TokenAuthorizer {
    fn authorize(&self, headers: &HeaderMap) -> bool {
        if let Some(token) = bearer_token(headers) {
            if self.matches(token) {
                return true;
            }
        }
        cookie_values(headers, &self.cookie_name).any(|value| self.matches(value))
    }
}

/// Authorizer for the given config: token check if a token is set, else allow all
pub fn from_config(config: &AuthConfig) -> Arc<dyn Authorizer> {
    match &config.token {
        Some(token) => Arc::new(TokenAuthorizer::new(token, config.cookie_name.clone())),
        None => Arc::new(AllowAll),
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

fn cookie_values<'a>(headers: &'a HeaderMap, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(move |pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name).then_some(value)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_allow_all() {
        assert!(AllowAll.authorize(&HeaderMap::new()));
    }

    #[test]
    fn test_bearer_token() {
        let auth = TokenAuthorizer::new("s3cret", "session_token");
        assert!(auth.authorize(&headers(&[(header::AUTHORIZATION, "Bearer s3cret")])));
        assert!(!auth.authorize(&headers(&[(header::AUTHORIZATION, "Bearer nope")])));
        assert!(!auth.authorize(&headers(&[(header::AUTHORIZATION, "Basic s3cret")])));
        assert!(!auth.authorize(&HeaderMap::new()));
    }

    #[test]
    fn test_session_cookie() {
        let auth = TokenAuthorizer::new("s3cret", "session_token");
        assert!(auth.authorize(&headers(&[(
            header::COOKIE,
            "theme=dark; session_token=s3cret"
        )])));
        assert!(auth.authorize(&headers(&[
            (header::COOKIE, "theme=dark"),
            (header::COOKIE, "session_token=s3cret"),
        ])));
        assert!(!auth.authorize(&headers(&[(header::COOKIE, "other_token=s3cret")])));
    }

    #[test]
    fn test_wrong_bearer_falls_back_to_cookie() {
        let auth = TokenAuthorizer::new("s3cret", "sid");
        assert!(auth.authorize(&headers(&[
            (header::AUTHORIZATION, "Bearer stale"),
            (header::COOKIE, "sid=s3cret"),
        ])));
    }

    #[test]
    fn test_from_config() {
        let open = from_config(&AuthConfig::default());
        assert!(open.authorize(&HeaderMap::new()));

        let locked = from_config(&AuthConfig {
            token: Some("t".to_string()),
            ..AuthConfig::default()
        });
        assert!(!locked.authorize(&HeaderMap::new()));
    }
}
