//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use serde_json::Value;
use tokio::net::TcpListener;
use tower::ServiceExt;

use chat_history::config::{AppConfig, TokenConfig};
use chat_history::http::HttpServer;
use chat_history::lifecycle::Shutdown;
use chat_history::store::{ConversationStore, MemoryStore};

pub const TOKEN: &str = "test-token";
pub const SUBJECT: &str = "integration";

/// Default config with one known token.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.auth.tokens = vec![TokenConfig {
        token: TOKEN.into(),
        subject: SUBJECT.into(),
    }];
    config
}

/// The full app (pipeline included) over a fresh in-memory store.
pub fn app() -> axum::Router {
    app_with(test_config(), Arc::new(MemoryStore::new()))
}

pub fn app_with(config: AppConfig, store: Arc<dyn ConversationStore>) -> axum::Router {
    HttpServer::new(config, store).unwrap().into_app()
}

/// Send one request through a clone of `app`.
pub async fn send(app: &axum::Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub fn authed(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {TOKEN}"));
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub fn anonymous(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Serve `config` on an ephemeral port. Returns the bound address.
pub async fn spawn_server(config: AppConfig, shutdown: &Shutdown) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(config, Arc::new(MemoryStore::new())).unwrap();
    let shutdown = shutdown.clone();

    tokio::spawn(async move {
        let _ = server.run(listener, shutdown).await;
    });
    addr
}
