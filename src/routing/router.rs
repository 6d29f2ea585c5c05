//! Route table and dispatch.
//!
//! # Responsibilities
//! - Store compiled (method, pattern, handler) routes
//! - Look up the single handler for a request
//! - Record bound parameters and the matched pattern in the request context
//!
//! # Design Decisions
//! - Immutable after `build()` (shared via Arc without locks)
//! - Duplicate registrations fail at startup, never at request time
//! - O(n) scan over routes; the most specific matching pattern wins
//! - Explicit `NotFound` / `MethodNotAllowed` rather than a silent default

use std::fmt;
use std::sync::Arc;

use axum::http::Method;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::http::middleware::{BoxFuture, Handler};
use crate::http::request::Exchange;
use crate::http::response::ApiError;
use crate::routing::pattern::{PathParams, PathPattern, PatternError};

/// Error raised while registering routes.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error("route {method} {pattern} conflicts with an existing registration of {existing}")]
    Duplicate {
        method: Method,
        pattern: String,
        existing: String,
    },
}

/// The pattern that served a request, attached to the response extensions so
/// outer stages can label logs and metrics with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedRoute(pub String);

struct Route {
    method: Method,
    pattern: PathPattern,
    handler: Arc<dyn Handler>,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern.as_str())
            .finish()
    }
}

/// Outcome of a route lookup.
pub enum RouteMatch<'a> {
    Found {
        handler: &'a Arc<dyn Handler>,
        params: PathParams,
        pattern: &'a str,
    },
    /// The path is known but not for this method.
    MethodNotAllowed { allowed: Vec<Method> },
    NotFound,
}

impl fmt::Debug for RouteMatch<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteMatch::Found { params, pattern, .. } => f
                .debug_struct("Found")
                .field("pattern", pattern)
                .field("params", params)
                .finish(),
            RouteMatch::MethodNotAllowed { allowed } => f
                .debug_struct("MethodNotAllowed")
                .field("allowed", allowed)
                .finish(),
            RouteMatch::NotFound => f.write_str("NotFound"),
        }
    }
}

/// Collects routes before freezing them into a [`Router`].
#[derive(Debug, Default)]
pub struct RouterBuilder {
    routes: Vec<Route>,
}

impl RouterBuilder {
    /// Register `handler` for `method` + `pattern`.
    pub fn route<H>(mut self, method: Method, pattern: &str, handler: H) -> Result<Self, RouteError>
    where
        H: Handler + 'static,
    {
        let pattern = PathPattern::parse(pattern)?;

        if let Some(existing) = self
            .routes
            .iter()
            .find(|r| r.method == method && r.pattern.same_shape(&pattern))
        {
            return Err(RouteError::Duplicate {
                method,
                pattern: pattern.as_str().to_string(),
                existing: existing.pattern.as_str().to_string(),
            });
        }

        tracing::debug!(method = %method, pattern = %pattern, "Route registered");
        self.routes.push(Route {
            method,
            pattern,
            handler: Arc::new(handler),
        });
        Ok(self)
    }

    pub fn build(self) -> Router {
        Router {
            routes: self.routes,
        }
    }
}

/// Immutable route table.
#[derive(Debug)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::default()
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Find the handler for `method` + `path`.
    ///
    /// `HEAD` falls back to the `GET` route of the same path when no explicit
    /// `HEAD` route is registered.
    pub fn route(&self, method: &Method, path: &str) -> RouteMatch<'_> {
        if let Some(found) = self.lookup(method, path) {
            return found;
        }
        if method == Method::HEAD {
            if let Some(found) = self.lookup(&Method::GET, path) {
                return found;
            }
        }

        let mut allowed: Vec<Method> = Vec::new();
        for route in &self.routes {
            if route.pattern.matches(path).is_some() && !allowed.contains(&route.method) {
                allowed.push(route.method.clone());
            }
        }

        if allowed.is_empty() {
            RouteMatch::NotFound
        } else {
            RouteMatch::MethodNotAllowed { allowed }
        }
    }

    fn lookup(&self, method: &Method, path: &str) -> Option<RouteMatch<'_>> {
        let mut best: Option<(&Route, PathParams)> = None;

        for route in self.routes.iter().filter(|r| r.method == method) {
            let Some(params) = route.pattern.matches(path) else {
                continue;
            };
            let better = match &best {
                Some((current, _)) => route.pattern.more_specific_than(&current.pattern),
                None => true,
            };
            if better {
                best = Some((route, params));
            }
        }

        best.map(|(route, params)| RouteMatch::Found {
            handler: &route.handler,
            params,
            pattern: route.pattern.as_str(),
        })
    }
}

impl Handler for Router {
    fn call(&self, mut exchange: Exchange) -> BoxFuture<'_, Response> {
        Box::pin(async move {
            let method = exchange.request.method().clone();
            let path = exchange.request.uri().path().to_string();

            match self.route(&method, &path) {
                RouteMatch::Found {
                    handler,
                    params,
                    pattern,
                } => {
                    exchange.context.set_route_match(params, pattern);
                    let mut response = handler.call(exchange).await;
                    response
                        .extensions_mut()
                        .insert(MatchedRoute(pattern.to_string()));
                    response
                }
                RouteMatch::MethodNotAllowed { allowed } => {
                    tracing::debug!(method = %method, path = %path, "Method not allowed");
                    ApiError::MethodNotAllowed { allowed }.into_response()
                }
                RouteMatch::NotFound => {
                    tracing::debug!(method = %method, path = %path, "No route matched");
                    ApiError::NotFound(format!("no route for {method} {path}")).into_response()
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::Exchange;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::time::Duration;

    fn named(name: &'static str) -> impl Handler {
        move |exchange: Exchange| async move {
            let params: Vec<String> = exchange
                .context
                .params()
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            format!("{name}:{}", params.join(","))
        }
    }

    fn router() -> Router {
        Router::builder()
            .route(Method::GET, "/", named("health"))
            .unwrap()
            .route(Method::GET, "/user/{userId}", named("user"))
            .unwrap()
            .route(Method::GET, "/conversation/{conversationId}", named("get"))
            .unwrap()
            .route(Method::POST, "/conversation", named("update"))
            .unwrap()
            .build()
    }

    async fn dispatch(router: &Router, method: Method, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .body(Body::empty())
            .unwrap();
        let response = router
            .call(Exchange::new(request, Duration::from_secs(5)))
            .await;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[test]
    fn test_registered_routes_resolve() {
        let router = router();
        assert_eq!(router.len(), 4);

        match router.route(&Method::GET, "/user/u1") {
            RouteMatch::Found { params, pattern, .. } => {
                assert_eq!(pattern, "/user/{userId}");
                assert_eq!(params.get("userId"), Some("u1"));
            }
            other => panic!("expected match, got {other:?}"),
        }

        match router.route(&Method::GET, "/conversation/c-1") {
            RouteMatch::Found { params, .. } => {
                assert_eq!(params.get("conversationId"), Some("c-1"));
            }
            other => panic!("expected match, got {other:?}"),
        }

        assert!(matches!(
            router.route(&Method::POST, "/conversation"),
            RouteMatch::Found { .. }
        ));
        assert!(matches!(
            router.route(&Method::GET, "/"),
            RouteMatch::Found { .. }
        ));
    }

    #[test]
    fn test_unregistered_routes() {
        let router = router();
        assert!(matches!(
            router.route(&Method::GET, "/users/u1"),
            RouteMatch::NotFound
        ));
        assert!(matches!(
            router.route(&Method::GET, "/user/"),
            RouteMatch::NotFound
        ));
        assert!(matches!(
            router.route(&Method::GET, "/user/u1/extra"),
            RouteMatch::NotFound
        ));

        match router.route(&Method::DELETE, "/conversation") {
            RouteMatch::MethodNotAllowed { allowed } => assert_eq!(allowed, vec![Method::POST]),
            other => panic!("expected 405, got {other:?}"),
        }
    }

    #[test]
    fn test_head_falls_back_to_get() {
        let router = router();
        assert!(matches!(
            router.route(&Method::HEAD, "/user/u1"),
            RouteMatch::Found { .. }
        ));
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let err = Router::builder()
            .route(Method::GET, "/user/{userId}", named("a"))
            .unwrap()
            .route(Method::GET, "/user/{id}", named("b"))
            .unwrap_err();
        assert!(matches!(err, RouteError::Duplicate { .. }));

        // Same pattern, different method is fine
        assert!(Router::builder()
            .route(Method::GET, "/conversation", named("a"))
            .unwrap()
            .route(Method::POST, "/conversation", named("b"))
            .is_ok());
    }

    #[test]
    fn test_invalid_pattern_fails_registration() {
        let err = Router::builder()
            .route(Method::GET, "user", named("a"))
            .unwrap_err();
        assert!(matches!(err, RouteError::Pattern(_)));
    }

    #[test]
    fn test_literal_beats_placeholder() {
        let router = Router::builder()
            .route(Method::GET, "/user/{userId}", named("param"))
            .unwrap()
            .route(Method::GET, "/user/me", named("literal"))
            .unwrap()
            .build();

        match router.route(&Method::GET, "/user/me") {
            RouteMatch::Found { pattern, .. } => assert_eq!(pattern, "/user/me"),
            other => panic!("expected match, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dispatch_binds_params() {
        let router = router();

        let (status, body) = dispatch(&router, Method::GET, "/user/u7").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "user:userId=u7");

        let (status, body) = dispatch(&router, Method::GET, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "health:");
    }

    #[tokio::test]
    async fn test_dispatch_not_found_and_not_allowed() {
        let router = router();

        let (status, body) = dispatch(&router, Method::GET, "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("not_found"));

        let (status, _) = dispatch(&router, Method::PUT, "/conversation").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }
}
