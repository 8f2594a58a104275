//! # minihttpd
//!
//! A small middleware-based HTTP server for single-threaded, non-blocking
//! applications. hyper parses HTTP and tokio drives the sockets; minihttpd
//! adds the request pipeline on top:
//!
//! - request logging with `tracing`,
//! - exact-path routing,
//! - rendering to JSON or to minijinja HTML pages,
//! - static files,
//! - streaming gzip compression,
//! - validated request parameters.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::rc::Rc;
//!
//! use minihttpd::params::{NotEmpty, Param, Trim};
//! use minihttpd::renderer::Json;
//! use minihttpd::{ApplicationContext, Data, Error, HttpError, Request, Routes, Server};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Error> {
//!     minihttpd::logger::init("info")?;
//!
//!     let routes = Routes::new()
//!         .on("/", |_req| async { Err::<Data<()>, _>(HttpError::redirect("/api/task/get")) })
//!         .on("/api/task/get", |_req| async { Data(["task1", "task2"]) })
//!         .on("/api/task/add", add);
//!
//!     let app = ApplicationContext::builder()
//!         .routes(routes)
//!         .default_renderer(Rc::new(Json))
//!         .build()?;
//!
//!     let pipeline = minihttpd::default_stack(app)?;
//!     Server::bind("0.0.0.0:8080")?.serve(pipeline).await
//! }
//!
//! async fn add(req: Request) -> Result<Data<String>, Error> {
//!     let task = Param::new("task").filter(Trim).validator(NotEmpty).from_both(&req)?;
//!     Ok(Data(format!("added {task}")))
//! }
//! ```
//!
//! ## Handlers
//!
//! A handler is any `async fn(Request) -> impl IntoReply`. Return
//! [`Data`] to let the route's renderer format the value, a [`Response`] to
//! answer verbatim, or an [`HttpError`] (usually through `Result`) for a
//! deliberate 4xx/3xx answer. Any other error is logged and rendered as an
//! opaque `500`.

mod body;
mod context;
mod error;
mod finite;
mod handler;
mod request;
mod response;
mod router;
mod server;
mod stack;

pub mod logger;
pub mod middleware;
pub mod mime;
pub mod params;
pub mod renderer;

pub use body::{Body, GzipReader};
pub use context::{ApplicationContext, ApplicationContextBuilder, RenderOptions, RequestContext};
pub use error::{Error, HttpError, ValidationError};
pub use handler::Handler;
pub use request::Request;
pub use response::{ContentType, Data, IntoReply, Renderable, Reply, Response, ResponseBuilder};
pub use router::{Route, Routes};
pub use server::{DEFAULT_MAX_BODY_SIZE, Server};
pub use stack::default_stack;
