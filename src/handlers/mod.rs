//! Request handlers and their route table.
//!
//! # Data Flow
//! ```text
//! Router (params bound into RequestContext)
//!     → health.rs        GET  /
//!     → conversations.rs GET  /user/{userId}
//!                        GET  /conversation/{conversationId}
//!                        POST /conversation
//!         → ConversationStore (one call, bounded by the request deadline)
//!     → Json response or ApiError
//! ```
//!
//! # Design Decisions
//! - Handlers receive the store through construction, never through globals
//! - Identity is already checked by the auth stage; handlers do not re-check it
//! - Raw store errors are logged and mapped to an opaque 500

pub mod conversations;
pub mod health;

pub use conversations::{ConversationHandlers, ConversationUpdate};
pub use health::liveness;

use std::sync::Arc;

use axum::http::Method;

use crate::http::request::Exchange;
use crate::routing::router::{RouteError, Router};
use crate::store::ConversationStore;

/// Build the route table for the service.
pub fn api_router(
    store: Arc<dyn ConversationStore>,
    max_body_bytes: usize,
) -> Result<Router, RouteError> {
    let conversations = Arc::new(ConversationHandlers::new(store, max_body_bytes));

    let list = Arc::clone(&conversations);
    let get = Arc::clone(&conversations);
    let update = conversations;

    let router = Router::builder()
        .route(Method::GET, "/", liveness)?
        .route(Method::GET, "/user/{userId}", move |exchange: Exchange| {
            let handlers = Arc::clone(&list);
            async move { handlers.list_for_user(exchange).await }
        })?
        .route(Method::GET, "/conversation/{conversationId}", move |exchange: Exchange| {
            let handlers = Arc::clone(&get);
            async move { handlers.get_conversation(exchange).await }
        })?
        .route(Method::POST, "/conversation", move |exchange: Exchange| {
            let handlers = Arc::clone(&update);
            async move { handlers.update_conversation(exchange).await }
        })?
        .build();

    Ok(router)
}
