//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Compose the pipeline: Logger → Auth → Recoverer around the Router
//! - Hand every request to the pipeline from a single catch-all axum route
//! - Bind the server to a listener and shut down gracefully

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::Response,
    routing::any,
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::handlers::api_router;
use crate::http::middleware::auth::InvalidAuthHeader;
use crate::http::middleware::{AuthStage, Chain, Handler, LoggerStage, RecovererStage};
use crate::http::request::Exchange;
use crate::lifecycle::Shutdown;
use crate::routing::router::RouteError;
use crate::store::ConversationStore;

/// Error raised while assembling the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("route table: {0}")]
    Route(#[from] RouteError),

    #[error("auth: {0}")]
    Auth(#[from] InvalidAuthHeader),
}

/// State shared with the dispatch handler.
#[derive(Clone)]
struct PipelineState {
    pipeline: Arc<Chain>,
    request_timeout: Duration,
}

/// HTTP server for the chat history API.
pub struct HttpServer {
    router: Router,
    config: AppConfig,
}

impl HttpServer {
    /// Create a server with the given configuration and store.
    pub fn new(config: AppConfig, store: Arc<dyn ConversationStore>) -> Result<Self, ServerError> {
        let pipeline = Self::build_pipeline(&config, store)?;
        tracing::info!(stages = ?pipeline.stage_names(), "Request pipeline assembled");

        let router = Self::build_router(&config, pipeline);
        Ok(Self { router, config })
    }

    /// Build the middleware chain around the route table.
    pub fn build_pipeline(
        config: &AppConfig,
        store: Arc<dyn ConversationStore>,
    ) -> Result<Chain, ServerError> {
        let routes = api_router(store, config.security.max_body_size)?;
        tracing::debug!(routes = routes.len(), "Route table built");

        Ok(Chain::new(routes)
            .stage(LoggerStage::new())
            .stage(AuthStage::from_config(&config.auth)?)
            .stage(RecovererStage::new()))
    }

    /// Build the axum router: one catch-all route feeding the pipeline.
    fn build_router(config: &AppConfig, pipeline: Chain) -> Router {
        let state = PipelineState {
            pipeline: Arc::new(pipeline),
            request_timeout: Duration::from_secs(config.timeouts.request_secs),
        };

        Router::new()
            .route("/{*path}", any(dispatch))
            .route("/", any(dispatch))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// The assembled axum app, for driving without a socket.
    pub fn into_app(self) -> Router {
        self.router
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: Shutdown,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            request_timeout_secs = self.config.timeouts.request_secs,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.wait().await;
                tracing::info!("Draining in-flight requests");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

/// Catch-all axum handler: wrap the request in an exchange and run the pipeline.
async fn dispatch(State(state): State<PipelineState>, request: Request<Body>) -> Response {
    let exchange = Exchange::new(request, state.request_timeout);
    state.pipeline.call(exchange).await
}
