//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline stages produce:
//!     → logging.rs (structured log events, one span per request)
//!     → metrics.rs (request counters, latency histograms, panics)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID is a field on the request span, so every event inside it carries it
//! - Metrics are cheap (atomic increments) and no-ops until a recorder is installed
//! - Route labels use the registered pattern, never the raw path

pub mod logging;
pub mod metrics;
