//! Chat history service library.
//!
//! Serves stored chat conversations over HTTP through a fixed pipeline
//! (logging, authentication, panic recovery) in front of a small router.

pub mod config;
pub mod handlers;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod store;

pub use config::schema::AppConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
