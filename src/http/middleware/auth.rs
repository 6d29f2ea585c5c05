//! Authentication stage.
//! Single pass/fail gate on a bearer-style credential.

use std::collections::HashSet;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::config::AuthConfig;
use crate::http::middleware::{BoxFuture, Next, Stage};
use crate::http::request::{Exchange, Identity};
use crate::http::response::ApiError;

#[derive(Debug, Error)]
#[error("invalid auth header name `{0}`")]
pub struct InvalidAuthHeader(pub String);

/// Why a credential was rejected. Logged, and sent back as the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    Missing,
    Malformed,
    Unknown,
}

impl AuthFailure {
    fn message(self) -> &'static str {
        match self {
            AuthFailure::Missing => "missing credentials",
            AuthFailure::Malformed => "malformed credentials",
            AuthFailure::Unknown => "invalid credentials",
        }
    }
}

pub struct AuthStage {
    enabled: bool,
    header: HeaderName,
    scheme: String,
    public_paths: HashSet<String>,
    tokens: Vec<(String, Identity)>,
}

impl AuthStage {
    pub fn from_config(config: &AuthConfig) -> Result<Self, InvalidAuthHeader> {
        let header = HeaderName::from_bytes(config.header.as_bytes())
            .map_err(|_| InvalidAuthHeader(config.header.clone()))?;

        Ok(Self {
            enabled: config.enabled,
            header,
            scheme: config.scheme.clone(),
            public_paths: config.public_paths.iter().cloned().collect(),
            tokens: config
                .tokens
                .iter()
                .map(|t| (t.token.clone(), Identity::new(t.subject.clone())))
                .collect(),
        })
    }

    fn is_public(&self, path: &str) -> bool {
        !self.enabled || self.public_paths.contains(path)
    }

    /// Check the request credential and resolve it to an identity.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Identity, AuthFailure> {
        let raw = headers.get(&self.header).ok_or(AuthFailure::Missing)?;
        let value = raw.to_str().map_err(|_| AuthFailure::Malformed)?.trim();

        let token = if self.scheme.is_empty() {
            value
        } else {
            let (scheme, token) = value.split_once(' ').ok_or(AuthFailure::Malformed)?;
            if !scheme.eq_ignore_ascii_case(&self.scheme) {
                return Err(AuthFailure::Malformed);
            }
            token.trim()
        };

        if token.is_empty() {
            return Err(AuthFailure::Malformed);
        }

        // No early exit: every configured token is compared.
        let mut found = None;
        for (known, identity) in &self.tokens {
            if constant_time_eq(known.as_bytes(), token.as_bytes()) && found.is_none() {
                found = Some(identity);
            }
        }
        found.cloned().ok_or(AuthFailure::Unknown)
    }

    fn reject(&self, failure: AuthFailure) -> Response {
        let mut response = ApiError::Unauthorized(failure.message().to_string()).into_response();
        if !self.scheme.is_empty() {
            if let Ok(value) = HeaderValue::from_str(&self.scheme) {
                response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
            }
        }
        response
    }
}

impl Stage for AuthStage {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn process<'a>(&'a self, mut exchange: Exchange, next: Next<'a>) -> BoxFuture<'a, Response> {
        if self.is_public(exchange.request.uri().path()) {
            return next.run(exchange);
        }

        match self.authenticate(exchange.request.headers()) {
            Ok(identity) => {
                tracing::debug!(subject = %identity.subject, "Authenticated");
                exchange.context.set_identity(identity);
                next.run(exchange)
            }
            Err(failure) => {
                tracing::warn!(reason = failure.message(), "Authentication failed");
                let response = self.reject(failure);
                Box::pin(async move { response })
            }
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuthConfig, TokenConfig};
    use crate::http::middleware::{Chain, Handler};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn config() -> AuthConfig {
        AuthConfig {
            tokens: vec![TokenConfig {
                token: "s3cret".into(),
                subject: "alice".into(),
            }],
            ..AuthConfig::default()
        }
    }

    fn exchange(path: &str, authorization: Option<&str>) -> Exchange {
        let mut builder = Request::builder().uri(path);
        if let Some(value) = authorization {
            builder = builder.header("authorization", value);
        }
        Exchange::new(builder.body(Body::empty()).unwrap(), Duration::from_secs(5))
    }

    fn guarded(calls: &Arc<AtomicUsize>, subject: &Arc<Mutex<Option<String>>>) -> Chain {
        let calls = calls.clone();
        let subject = subject.clone();
        Chain::new(move |exchange: Exchange| {
            calls.fetch_add(1, Ordering::SeqCst);
            *subject.lock().unwrap() = exchange.context.identity().map(|i| i.subject.clone());
            async { StatusCode::OK }
        })
        .stage(AuthStage::from_config(&config()).unwrap())
    }

    #[tokio::test]
    async fn valid_token_attaches_identity() {
        let calls = Arc::new(AtomicUsize::new(0));
        let subject = Arc::new(Mutex::new(None));
        let chain = guarded(&calls, &subject);

        let response = chain.call(exchange("/user/u1", Some("Bearer s3cret"))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(subject.lock().unwrap().as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn rejected_requests_never_reach_terminal() {
        let calls = Arc::new(AtomicUsize::new(0));
        let subject = Arc::new(Mutex::new(None));
        let chain = guarded(&calls, &subject);

        let credentials = [
            None,
            Some("Bearer wrong"),
            Some("Basic s3cret"),
            Some("Bearer "),
            Some("s3cret"),
        ];
        for credential in credentials {
            let response = chain.call(exchange("/user/u1", credential)).await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "credential {credential:?}");
            assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn public_path_skips_auth() {
        let calls = Arc::new(AtomicUsize::new(0));
        let subject = Arc::new(Mutex::new(None));
        let chain = guarded(&calls, &subject);

        let response = chain.call(exchange("/", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(subject.lock().unwrap().is_none());
    }

    #[test]
    fn scheme_is_case_insensitive() {
        let stage = AuthStage::from_config(&config()).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("bearer s3cret"));
        assert_eq!(stage.authenticate(&headers).unwrap().subject, "alice");
    }

    #[test]
    fn raw_token_without_scheme() {
        let stage = AuthStage::from_config(&AuthConfig {
            header: "x-api-key".into(),
            scheme: String::new(),
            ..config()
        })
        .unwrap();

        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("s3cret"));
        assert!(stage.authenticate(&headers).is_ok());

        headers.insert("x-api-key", HeaderValue::from_static("nope"));
        assert_eq!(stage.authenticate(&headers), Err(AuthFailure::Unknown));
    }

    #[test]
    fn disabled_auth_treats_every_path_as_public() {
        let stage = AuthStage::from_config(&AuthConfig {
            enabled: false,
            ..config()
        })
        .unwrap();
        assert!(stage.is_public("/user/u1"));
    }

    #[test]
    fn invalid_header_name_is_rejected() {
        let err = AuthStage::from_config(&AuthConfig {
            header: "bad header".into(),
            ..config()
        });
        assert!(err.is_err());
    }

    #[test]
    fn constant_time_eq_works() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
    }
}
