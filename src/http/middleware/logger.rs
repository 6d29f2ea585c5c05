//! Request logging stage.
//!
//! Assigns the request ID, opens the request span, and records outcome
//! and latency. Transparent to control flow: it never alters the status
//! and never swallows a failure.

use std::time::Instant;

use axum::http::HeaderValue;
use axum::response::Response;
use tracing::Instrument;

use crate::http::middleware::{BoxFuture, Next, Stage};
use crate::http::request::{Exchange, RequestId, X_REQUEST_ID};
use crate::observability::metrics;
use crate::routing::router::MatchedRoute;

/// Route label used when no route matched.
const UNMATCHED_ROUTE: &str = "unmatched";

#[derive(Debug, Default, Clone, Copy)]
pub struct LoggerStage;

impl LoggerStage {
    pub fn new() -> Self {
        Self
    }
}

impl Stage for LoggerStage {
    fn name(&self) -> &'static str {
        "logger"
    }

    fn process<'a>(&'a self, mut exchange: Exchange, next: Next<'a>) -> BoxFuture<'a, Response> {
        let request_id =
            RequestId::from_headers(exchange.request.headers()).unwrap_or_else(RequestId::new);
        let method = exchange.request.method().clone();
        let path = exchange.request.uri().path().to_string();
        exchange.context.set_request_id(request_id.clone());

        let span = tracing::info_span!(
            "request",
            request_id = %request_id,
            method = %method,
            path = %path,
        );

        Box::pin(
            async move {
                let start = Instant::now();
                tracing::debug!("Request started");

                let mut response = next.run(exchange).await;

                let status = response.status();
                let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
                let route = response
                    .extensions()
                    .get::<MatchedRoute>()
                    .map(|r| r.0.clone())
                    .unwrap_or_else(|| UNMATCHED_ROUTE.to_string());

                if status.is_server_error() {
                    tracing::warn!(status = status.as_u16(), duration_ms, route = %route, "Request failed");
                } else {
                    tracing::info!(status = status.as_u16(), duration_ms, route = %route, "Request completed");
                }
                metrics::record_request(method.as_str(), &route, status.as_u16(), start);

                if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
                    response.headers_mut().insert(&X_REQUEST_ID, value);
                }
                response
            }
            .instrument(span),
        )
    }
}
