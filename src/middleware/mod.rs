//! Middleware chain.
//!
//! A middleware receives the request and a [`Next`] continuation standing for
//! the rest of the chain. It may answer on its own without calling `next`,
//! call `next` and post-process the reply, or hand the reply back untouched.
//! The chain ends with an [`Endpoint`], which has no continuation.
//!
//! ```text
//! LogRequest → Gzip → StaticContent → Render → LogError → RouteMatch → AutoTemplate → Run
//!  ─────────────────────── request flows right ──────────────────────────────────────►
//!  ◄─────────────────────── reply flows back left ─────────────────────────────────────
//! ```
//!
//! The chain is assembled once at startup with [`Pipeline::builder`]; per
//! request only an index advances. Every step returns the same
//! [`BoxFuture`], whether its work is synchronous or not.
//!
//! Closures are middlewares too:
//!
//! ```rust
//! use minihttpd::middleware::{Next, Pipeline, Run};
//! use minihttpd::{ApplicationContext, Request, Routes};
//! use minihttpd::renderer::Json;
//! use std::rc::Rc;
//!
//! let app = ApplicationContext::builder()
//!     .routes(Routes::new())
//!     .default_renderer(Rc::new(Json))
//!     .build()
//!     .unwrap();
//!
//! let pipeline = Pipeline::builder(app)
//!     .with(|req: Request, next: Next| async move {
//!         tracing::debug!(path = req.path(), "before");
//!         next.run(req).await
//!     })
//!     .run(Run);
//! ```

mod auto_template;
mod gzip;
mod log_error;
mod log_request;
mod render;
mod route;
mod run;
mod static_content;

use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use bytes::Bytes;
use http::StatusCode;
use tracing::error;

use crate::context::ApplicationContext;
use crate::error::Error;
use crate::logger::format_error_chain;
use crate::request::Request;
use crate::response::{Reply, Response};

pub use auto_template::AutoTemplate;
pub use gzip::{DEFAULT_MIN_SIZE, Gzip};
pub use log_error::LogError;
pub use log_request::LogRequest;
pub use render::Render;
pub use route::RouteMatch;
pub use run::Run;
pub use static_content::{CACHE_CONTROL, StaticContent};

/// The single future type produced by handlers, middlewares and endpoints.
///
/// Not `Send`: the whole pipeline runs on one thread.
pub type BoxFuture = Pin<Box<dyn Future<Output = Result<Reply, Error>> + 'static>>;

/// A step of the chain that may delegate to the rest of it.
pub trait Middleware: 'static {
    fn handle(&self, req: Request, next: Next) -> BoxFuture;
}

impl<F, Fut> Middleware for F
where
    F: Fn(Request, Next) -> Fut + 'static,
    Fut: Future<Output = Result<Reply, Error>> + 'static,
{
    fn handle(&self, req: Request, next: Next) -> BoxFuture {
        Box::pin(self(req, next))
    }
}

/// The terminal step of the chain.
pub trait Endpoint: 'static {
    fn call(&self, req: Request) -> BoxFuture;
}

impl<F, Fut> Endpoint for F
where
    F: Fn(Request) -> Fut + 'static,
    Fut: Future<Output = Result<Reply, Error>> + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        Box::pin(self(req))
    }
}

struct Chain {
    middlewares: Vec<Box<dyn Middleware>>,
    endpoint: Box<dyn Endpoint>,
}

/// Continuation invoking the remainder of the chain.
pub struct Next {
    chain: Rc<Chain>,
    index: usize,
}

impl Next {
    /// Runs the remaining middlewares, then the endpoint.
    pub fn run(self, req: Request) -> BoxFuture {
        match self.chain.middlewares.get(self.index) {
            Some(middleware) => {
                let next = Next { chain: Rc::clone(&self.chain), index: self.index + 1 };
                middleware.handle(req, next)
            }
            None => self.chain.endpoint.call(req),
        }
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

/// A fully assembled chain bound to its application context.
///
/// Cloning is cheap; the server hands one clone to every connection.
#[derive(Clone)]
pub struct Pipeline {
    app: Rc<ApplicationContext>,
    chain: Rc<Chain>,
}

/// Collects middlewares in registration order.
pub struct PipelineBuilder {
    app: Rc<ApplicationContext>,
    middlewares: Vec<Box<dyn Middleware>>,
}

impl PipelineBuilder {
    /// Appends a middleware. Middlewares see the request in registration
    /// order and the reply in reverse order.
    pub fn with(mut self, middleware: impl Middleware) -> Self {
        self.middlewares.push(Box::new(middleware));
        self
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Closes the chain with its endpoint.
    pub fn run(self, endpoint: impl Endpoint) -> Pipeline {
        Pipeline {
            app: self.app,
            chain: Rc::new(Chain { middlewares: self.middlewares, endpoint: Box::new(endpoint) }),
        }
    }
}

impl Pipeline {
    pub fn builder(app: Rc<ApplicationContext>) -> PipelineBuilder {
        PipelineBuilder { app, middlewares: Vec::new() }
    }

    pub fn app(&self) -> &Rc<ApplicationContext> {
        &self.app
    }

    /// Runs one buffered request through the chain. Never fails.
    ///
    /// Normally the [`Render`] middleware turns every outcome into a response.
    /// When the chain has none, data still reaching this point is rendered
    /// with the request's renderer, intentional errors through
    /// `render_error`, and anything else is logged and answered with a bare
    /// `500`.
    pub async fn handle(&self, req: http::Request<Bytes>) -> Response {
        let req = Request::new(req, Rc::clone(&self.app));
        let next = Next { chain: Rc::clone(&self.chain), index: 0 };
        let result = next.run(req.clone()).await;

        let ctx = req.context();
        match result {
            Ok(Reply::Response(response)) => response,
            Ok(Reply::Data(data)) => {
                ctx.renderer().render(&req, ctx.take_response(), &ctx.render_options(), data.as_ref())
            }
            Err(e) if e.is_intentional() => {
                ctx.renderer().render_error(&req, ctx.take_response(), &ctx.render_options(), &e)
            }
            Err(e) => {
                error!(
                    method = %req.method(),
                    uri = %req.uri(),
                    error = %format_error_chain(&e),
                    "Internal server error",
                );
                Response::empty(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::testing::*;
    use super::*;
    use crate::error::HttpError;
    use crate::response::Data;
    use crate::router::Routes;

    fn tracer(log: Rc<RefCell<Vec<String>>>, name: &'static str) -> impl Middleware {
        move |req: Request, next: Next| {
            let log = Rc::clone(&log);
            async move {
                log.borrow_mut().push(format!("{name} in"));
                let reply = next.run(req).await;
                log.borrow_mut().push(format!("{name} out"));
                reply
            }
        }
    }

    #[tokio::test]
    async fn middlewares_wrap_like_an_onion() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let endpoint_log = Rc::clone(&log);
        let pipeline = Pipeline::builder(app(Routes::new()))
            .with(tracer(Rc::clone(&log), "a"))
            .with(tracer(Rc::clone(&log), "b"))
            .run(move |_req: Request| {
                endpoint_log.borrow_mut().push("endpoint".to_owned());
                async { Ok::<_, Error>(Reply::Response(Response::text("done"))) }
            });

        let response = pipeline.handle(get("/")).await;
        assert_eq!(body_text(response).await, "done");
        assert_eq!(*log.borrow(), ["a in", "b in", "endpoint", "b out", "a out"]);
    }

    #[tokio::test]
    async fn short_circuit_skips_the_rest() {
        let pipeline = Pipeline::builder(app(Routes::new()))
            .with(|_req: Request, _next: Next| async {
                Ok::<_, Error>(Reply::Response(Response::empty(StatusCode::NO_CONTENT)))
            })
            .run(|_req: Request| async { Err::<Reply, _>(Error::internal("endpoint must not run")) });

        let response = pipeline.handle(get("/")).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn unrendered_outcomes_are_handled_at_the_top() {
        let pipeline = Pipeline::builder(app(Routes::new()))
            .run(|req: Request| async move {
                let outcome: Result<Reply, Error> = match req.path() {
                    "/data" => Ok(Reply::data(["task1"])),
                    "/missing" => Err(HttpError::not_found().into()),
                    _ => Err(Error::internal("boom")),
                };
                outcome
            });

        let data = pipeline.handle(get("/data")).await;
        assert_eq!(data.status(), StatusCode::OK);
        assert_eq!(body_text(data).await, r#"["task1"]"#);

        let missing = pipeline.handle(get("/missing")).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let failed = pipeline.handle(get("/boom")).await;
        assert_eq!(failed.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_text(failed).await.is_empty());
    }

    #[tokio::test]
    async fn endpoint_only_pipeline_runs_routes() {
        let routes = Routes::new().on("/api/task/get", |_req| async { Data(["task1", "task2"]) });
        let pipeline = Pipeline::builder(app(routes)).with(RouteMatch).run(Run);

        let response = pipeline.handle(get("/api/task/get")).await;
        assert_eq!(body_text(response).await, r#"["task1","task2"]"#);
    }
}
