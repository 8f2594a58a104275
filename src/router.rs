//! Route table.
//!
//! Exact path match, one hash lookup. No patterns, no parameters, no method
//! dispatch: a path maps to one [`Route`], the handler decides what to do with
//! the method. Build the table once at startup and hand it to
//! [`ApplicationContext::builder`](crate::ApplicationContext::builder).

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::error::Error;
use crate::handler::{BoxedHandler, Handler};
use crate::renderer::Renderer;
use crate::request::Request;
use crate::response::IntoReply;

/// A handler plus an optional renderer overriding the application default.
///
/// Cloning is cheap: the handler and renderer are reference-counted.
#[derive(Clone)]
pub struct Route {
    handler: BoxedHandler,
    renderer: Option<Rc<dyn Renderer>>,
    view: Option<PathBuf>,
}

impl Route {
    /// Closures get their argument type inferred:
    /// `Route::new(|req| async move { ... })`.
    pub fn new<F, Fut, R>(handler: F) -> Self
    where
        F: Fn(Request) -> Fut + 'static,
        Fut: Future<Output = R> + 'static,
        R: IntoReply + 'static,
    {
        Self { handler: handler.into_boxed_handler(), renderer: None, view: None }
    }

    pub fn with_renderer(mut self, renderer: Rc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Path stem of the route's view files, without extension.
    ///
    /// With `pages/demo`, [`AutoTemplate`](crate::middleware::AutoTemplate)
    /// renders `pages/demo.html` and inlines `pages/demo.js` and
    /// `pages/demo.css` when they exist. Relative stems resolve against the
    /// application root path.
    pub fn with_view(mut self, stem: impl Into<PathBuf>) -> Self {
        self.view = Some(stem.into());
        self
    }

    pub(crate) fn handler(&self) -> &BoxedHandler {
        &self.handler
    }

    pub fn renderer(&self) -> Option<Rc<dyn Renderer>> {
        self.renderer.clone()
    }

    pub fn view(&self) -> Option<&Path> {
        self.view.as_deref()
    }
}

/// Mapping of decoded URI path → [`Route`].
///
/// Registration never fails on the spot; problems (relative path, query
/// string, duplicate) are collected and reported by [`Routes::validate`],
/// which the application context runs at startup.
#[derive(Clone, Default)]
pub struct Routes {
    table: HashMap<String, Route>,
    invalid: Vec<String>,
}

impl Routes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `route` under `path`. Returns `self` for chaining.
    ///
    /// ```rust
    /// use minihttpd::{Data, Route, Routes};
    ///
    /// let routes = Routes::new()
    ///     .on("/api/task/get", |_req| async { Data(["task1", "task2"]) })
    ///     .route("/health", Route::new(|_req| async { Data("ok") }));
    /// assert_eq!(routes.len(), 2);
    /// ```
    pub fn route(mut self, path: &str, route: Route) -> Self {
        if let Some(problem) = check_path(path) {
            self.invalid.push(format!("invalid route `{path}`: {problem}"));
        } else if self.table.insert(path.to_owned(), route).is_some() {
            self.invalid.push(format!("invalid route `{path}`: registered twice"));
        }
        self
    }

    /// Shorthand for `route(path, Route::new(handler))`.
    pub fn on<F, Fut, R>(self, path: &str, handler: F) -> Self
    where
        F: Fn(Request) -> Fut + 'static,
        Fut: Future<Output = R> + 'static,
        R: IntoReply + 'static,
    {
        self.route(path, Route::new(handler))
    }

    pub fn lookup(&self, path: &str) -> Option<&Route> {
        self.table.get(path)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Fails with every registration problem found.
    pub fn validate(&self) -> Result<(), Error> {
        if self.invalid.is_empty() {
            Ok(())
        } else {
            Err(Error::config(self.invalid.join("; ")))
        }
    }
}

fn check_path(path: &str) -> Option<&'static str> {
    if !path.starts_with('/') {
        Some("paths must be absolute")
    } else if path.contains(['?', '#']) {
        Some("paths must not carry a query string or fragment")
    } else {
        None
    }
}
