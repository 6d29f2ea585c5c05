//! Request pipeline: stages composed around a terminal handler.
//!
//! # Data Flow
//! ```text
//! Chain [Logger, Auth, Recoverer] wrapping Router:
//!
//!     Logger ──▶ Auth ──▶ Recoverer ──▶ Router ──▶ handler
//!        ◀──────    ◀───────     ◀────────    ◀────────
//! ```
//!
//! # Design Decisions
//! - First stage added is outermost; unwinding runs in reverse
//! - A stage may short-circuit by returning without calling `next`
//! - `Chain` is itself a `Handler`, so chains nest
//! - Futures are boxed so stages stay object-safe

pub mod auth;
pub mod logger;
pub mod recoverer;

pub use auth::AuthStage;
pub use logger::LoggerStage;
pub use recoverer::RecovererStage;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::response::{IntoResponse, Response};

use crate::http::request::Exchange;

/// Boxed, sendable future returned by stages and handlers.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Terminal request handler.
pub trait Handler: Send + Sync {
    fn call(&self, exchange: Exchange) -> BoxFuture<'_, Response>;
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Exchange) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + 'static,
{
    fn call(&self, exchange: Exchange) -> BoxFuture<'_, Response> {
        let fut = (self)(exchange);
        Box::pin(async move { fut.await.into_response() })
    }
}

/// One unit of the pipeline, wrapping everything after it.
pub trait Stage: Send + Sync {
    /// Name used in startup logs.
    fn name(&self) -> &'static str;

    fn process<'a>(&'a self, exchange: Exchange, next: Next<'a>) -> BoxFuture<'a, Response>;
}

/// Continuation handed to a stage: the remaining stages plus the terminal.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    stages: &'a [Arc<dyn Stage>],
    terminal: &'a dyn Handler,
}

impl<'a> Next<'a> {
    /// Run the rest of the pipeline.
    pub fn run(self, exchange: Exchange) -> BoxFuture<'a, Response> {
        match self.stages.split_first() {
            Some((stage, rest)) => stage.process(
                exchange,
                Next {
                    stages: rest,
                    terminal: self.terminal,
                },
            ),
            None => self.terminal.call(exchange),
        }
    }
}

/// Ordered stages folded around a terminal handler.
pub struct Chain {
    stages: Vec<Arc<dyn Stage>>,
    terminal: Arc<dyn Handler>,
}

impl Chain {
    pub fn new<H>(terminal: H) -> Self
    where
        H: Handler + 'static,
    {
        Self {
            stages: Vec::new(),
            terminal: Arc::new(terminal),
        }
    }

    /// Append a stage inside every stage added before it.
    pub fn stage<S>(mut self, stage: S) -> Self
    where
        S: Stage + 'static,
    {
        self.stages.push(Arc::new(stage));
        self
    }

    /// Stage names, outermost first.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }
}

impl Handler for Chain {
    fn call(&self, exchange: Exchange) -> BoxFuture<'_, Response> {
        Next {
            stages: &self.stages,
            terminal: self.terminal.as_ref(),
        }
        .run(exchange)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{HeaderValue, Request, StatusCode};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records entry/exit into a shared journal and tags request/response.
    struct Probe {
        tag: &'static str,
        journal: Arc<Mutex<Vec<String>>>,
    }

    impl Stage for Probe {
        fn name(&self) -> &'static str {
            self.tag
        }

        fn process<'a>(&'a self, mut exchange: Exchange, next: Next<'a>) -> BoxFuture<'a, Response> {
            Box::pin(async move {
                self.journal.lock().unwrap().push(format!("pre:{}", self.tag));
                exchange
                    .request
                    .headers_mut()
                    .append("x-trail", HeaderValue::from_static(self.tag));

                let mut response = next.run(exchange).await;

                self.journal.lock().unwrap().push(format!("post:{}", self.tag));
                response
                    .headers_mut()
                    .append("x-unwind", HeaderValue::from_static(self.tag));
                response
            })
        }
    }

    struct Gate;

    impl Stage for Gate {
        fn name(&self) -> &'static str {
            "gate"
        }

        fn process<'a>(&'a self, _exchange: Exchange, _next: Next<'a>) -> BoxFuture<'a, Response> {
            Box::pin(async { StatusCode::FORBIDDEN.into_response() })
        }
    }

    fn exchange() -> Exchange {
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        Exchange::new(request, Duration::from_secs(5))
    }

    fn probe(tag: &'static str, journal: &Arc<Mutex<Vec<String>>>) -> Probe {
        Probe {
            tag,
            journal: journal.clone(),
        }
    }

    #[tokio::test]
    async fn stages_run_in_registration_order_and_unwind_in_reverse() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let seen_by_terminal = Arc::new(Mutex::new(Vec::new()));

        let terminal_journal = journal.clone();
        let seen = seen_by_terminal.clone();
        let chain = Chain::new(move |exchange: Exchange| {
            let journal = terminal_journal.clone();
            let seen = seen.clone();
            async move {
                journal.lock().unwrap().push("terminal".to_string());
                let trail: Vec<String> = exchange
                    .request
                    .headers()
                    .get_all("x-trail")
                    .iter()
                    .map(|v| v.to_str().unwrap().to_string())
                    .collect();
                *seen.lock().unwrap() = trail;
                StatusCode::OK
            }
        })
        .stage(probe("A", &journal))
        .stage(probe("B", &journal))
        .stage(probe("C", &journal));

        assert_eq!(chain.stage_names(), vec!["A", "B", "C"]);

        let response = chain.call(exchange()).await;
        assert_eq!(response.status(), StatusCode::OK);

        assert_eq!(
            *journal.lock().unwrap(),
            vec!["pre:A", "pre:B", "pre:C", "terminal", "post:C", "post:B", "post:A"]
        );
        assert_eq!(*seen_by_terminal.lock().unwrap(), vec!["A", "B", "C"]);

        let unwind: Vec<&str> = response
            .headers()
            .get_all("x-unwind")
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect();
        assert_eq!(unwind, vec!["C", "B", "A"]);
    }

    #[tokio::test]
    async fn short_circuit_skips_inner_stages_and_terminal() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let chain = Chain::new(move |_exchange: Exchange| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { StatusCode::OK }
        })
        .stage(probe("outer", &journal))
        .stage(Gate)
        .stage(probe("inner", &journal));

        let response = chain.call(exchange()).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(*journal.lock().unwrap(), vec!["pre:outer", "post:outer"]);
    }

    #[tokio::test]
    async fn empty_chain_calls_terminal() {
        let chain = Chain::new(|_exchange: Exchange| async { "done" });
        let response = chain.call(exchange()).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn chains_nest() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let inner = Chain::new(|_exchange: Exchange| async { StatusCode::NO_CONTENT })
            .stage(probe("inner", &journal));
        let outer = Chain::new(inner).stage(probe("outer", &journal));

        let response = outer.call(exchange()).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            *journal.lock().unwrap(),
            vec!["pre:outer", "pre:inner", "post:inner", "post:outer"]
        );
    }
}
