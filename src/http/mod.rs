//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum serve loop, catch-all dispatch)
//!     → request.rs (Exchange: request + RequestContext with deadline)
//!     → middleware/ (Logger → Auth → Recoverer)
//!     → routing::Router → handlers
//!     → response.rs (ApiError rendering)
//!     → Send to client
//! ```

pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::{Exchange, Identity, RequestContext, RequestId, X_REQUEST_ID};
pub use response::ApiError;
pub use server::{HttpServer, ServerError};
