//! Per-request state carried through the pipeline.
//!
//! # Responsibilities
//! - Wrap the inbound request together with its [`RequestContext`]
//! - Hold the request ID, authenticated identity and path parameters
//! - Carry the request deadline so storage calls can be bounded
//!
//! # Design Decisions
//! - Each context field is written by exactly one stage (logger → request ID,
//!   auth → identity, router → params) and is `None`/empty until then
//! - Request ID accepted from the client only if it is short printable ASCII

use std::fmt;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, Request};
use tokio::time::Instant;
use uuid::Uuid;

use crate::routing::pattern::PathParams;

/// Header used to propagate the request ID.
pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

const MAX_REQUEST_ID_LEN: usize = 128;

/// Deadline used when `now + timeout` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365);

/// Correlation ID attached to every request and echoed on the response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    /// Generate a fresh UUID v4 request ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Reuse a client-supplied ID when it is safe to log and echo back.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let value = headers.get(&X_REQUEST_ID)?.to_str().ok()?;
        let valid = !value.is_empty()
            && value.len() <= MAX_REQUEST_ID_LEN
            && value.bytes().all(|b| b.is_ascii_graphic());
        valid.then(|| Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity attached by the auth stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject: String,
}

impl Identity {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
        }
    }
}

/// Context created at the start of request processing and discarded once the
/// response is written.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: Option<RequestId>,
    identity: Option<Identity>,
    params: PathParams,
    route: Option<String>,
    deadline: Instant,
}

impl RequestContext {
    /// Create an empty context whose deadline is `timeout` from now.
    pub fn new(timeout: Duration) -> Self {
        let now = Instant::now();
        let deadline = now
            .checked_add(timeout)
            .unwrap_or_else(|| now + FAR_FUTURE);
        Self {
            request_id: None,
            identity: None,
            params: PathParams::default(),
            route: None,
            deadline,
        }
    }

    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    pub fn set_request_id(&mut self, id: RequestId) {
        self.request_id = Some(id);
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn set_identity(&mut self, identity: Identity) {
        self.identity = Some(identity);
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// Pattern of the route that matched, once the router has run.
    pub fn route(&self) -> Option<&str> {
        self.route.as_deref()
    }

    pub fn set_route_match(&mut self, params: PathParams, route: &str) {
        self.params = params;
        self.route = Some(route.to_string());
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}

/// An inbound request and its context, as seen by stages and handlers.
#[derive(Debug)]
pub struct Exchange {
    pub request: Request<Body>,
    pub context: RequestContext,
}

impl Exchange {
    pub fn new(request: Request<Body>, timeout: Duration) -> Self {
        Self {
            request,
            context: RequestContext::new(timeout),
        }
    }
}
