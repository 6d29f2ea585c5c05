//! Panic recovery stage.
//!
//! Converts a panic anywhere downstream into a 500 response so one
//! request's defect never tears down the connection task or the server.
//! Must sit inside every stage that can fail unexpectedly.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use axum::response::{IntoResponse, Response};
use futures_util::FutureExt;

use crate::http::middleware::{BoxFuture, Next, Stage};
use crate::http::request::Exchange;
use crate::http::response::ApiError;
use crate::observability::metrics;

#[derive(Debug, Default, Clone, Copy)]
pub struct RecovererStage;

impl RecovererStage {
    pub fn new() -> Self {
        Self
    }
}

impl Stage for RecovererStage {
    fn name(&self) -> &'static str {
        "recoverer"
    }

    fn process<'a>(&'a self, exchange: Exchange, next: Next<'a>) -> BoxFuture<'a, Response> {
        let request_id = exchange
            .context
            .request_id()
            .map(|id| id.to_string())
            .unwrap_or_default();

        Box::pin(async move {
            // Constructing the downstream future may panic as well.
            let guarded = AssertUnwindSafe(async move { next.run(exchange).await });
            match guarded.catch_unwind().await {
                Ok(response) => response,
                Err(panic) => {
                    tracing::error!(
                        request_id = %request_id,
                        panic = %panic_message(panic.as_ref()),
                        "Handler panicked, request recovered"
                    );
                    metrics::record_panic();
                    ApiError::Internal.into_response()
                }
            }
        })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic payload"
    }
}
