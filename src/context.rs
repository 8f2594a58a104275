//! Application-wide and per-request context.
//!
//! [`ApplicationContext`] is built once at startup and shared read-only by
//! every request. [`RequestContext`] is created when a request enters the
//! pipeline and is the scratch space successive middlewares use to talk to
//! each other: the router records the matched [`Route`], handlers add render
//! options or tweak the response-in-progress, the render middleware reads it
//! all back.
//!
//! Everything runs on one thread, so the per-request state is plain
//! `RefCell`s: no lock is ever taken. Borrows are scoped to the closure
//! passed to [`RequestContext::with_response`] and friends, so they cannot be
//! held across an `.await`.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use http::Uri;
use percent_encoding::percent_decode_str;
use serde_json::{Map, Value};

use crate::error::Error;
use crate::renderer::Renderer;
use crate::response::Response;
use crate::router::{Route, Routes};

/// Free-form data handed to renderers, e.g. `inlineScripts` for HTML pages.
pub type RenderOptions = Map<String, Value>;

// ── ApplicationContext ────────────────────────────────────────────────────────

/// Process-wide configuration, read-only once built.
pub struct ApplicationContext {
    routes: Routes,
    public_path: Option<PathBuf>,
    root_path: Option<PathBuf>,
    default_renderer: Rc<dyn Renderer>,
}

impl ApplicationContext {
    pub fn builder() -> ApplicationContextBuilder {
        ApplicationContextBuilder::default()
    }

    pub fn routes(&self) -> &Routes { &self.routes }

    /// Directory static files are served from, if any.
    pub fn public_path(&self) -> Option<&Path> { self.public_path.as_deref() }

    /// Base directory relative view stems are resolved against.
    pub fn root_path(&self) -> Option<&Path> { self.root_path.as_deref() }

    pub fn default_renderer(&self) -> Rc<dyn Renderer> {
        Rc::clone(&self.default_renderer)
    }
}

/// Builder for [`ApplicationContext`]. A default renderer is required.
#[derive(Default)]
pub struct ApplicationContextBuilder {
    routes: Option<Routes>,
    public_path: Option<PathBuf>,
    root_path: Option<PathBuf>,
    default_renderer: Option<Rc<dyn Renderer>>,
}

impl ApplicationContextBuilder {
    pub fn routes(mut self, routes: Routes) -> Self {
        self.routes = Some(routes);
        self
    }

    pub fn public_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.public_path = Some(path.into());
        self
    }

    pub fn root_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.root_path = Some(path.into());
        self
    }

    pub fn default_renderer(mut self, renderer: Rc<dyn Renderer>) -> Self {
        self.default_renderer = Some(renderer);
        self
    }

    /// Validates the configuration. Fails on a missing default renderer or
    /// a malformed route table.
    pub fn build(self) -> Result<Rc<ApplicationContext>, Error> {
        let default_renderer = self
            .default_renderer
            .ok_or_else(|| Error::config("a default renderer is required"))?;
        let routes = self.routes.unwrap_or_default();
        routes.validate()?;
        Ok(Rc::new(ApplicationContext {
            routes,
            public_path: self.public_path,
            root_path: self.root_path,
            default_renderer,
        }))
    }
}

// ── RequestContext ────────────────────────────────────────────────────────────

/// Per-request mutable state, owned by one pipeline invocation.
pub struct RequestContext {
    app: Rc<ApplicationContext>,
    path: String,
    route: RefCell<Option<Route>>,
    response: RefCell<Response>,
    render_options: RefCell<RenderOptions>,
}

impl RequestContext {
    pub(crate) fn new(app: Rc<ApplicationContext>, uri: &Uri) -> Self {
        Self {
            app,
            path: decode_path(uri.path()),
            route: RefCell::new(None),
            response: RefCell::new(Response::default()),
            render_options: RefCell::new(RenderOptions::new()),
        }
    }

    pub fn app(&self) -> &ApplicationContext { &self.app }

    /// Percent-decoded, absolute URI path.
    pub fn path(&self) -> &str { &self.path }

    /// Route attached by the router middleware.
    pub fn route(&self) -> Option<Route> {
        self.route.borrow().clone()
    }

    pub fn set_route(&self, route: Route) {
        *self.route.borrow_mut() = Some(route);
    }

    /// The matched route's renderer, else the application default.
    pub fn renderer(&self) -> Rc<dyn Renderer> {
        self.route
            .borrow()
            .as_ref()
            .and_then(Route::renderer)
            .unwrap_or_else(|| self.app.default_renderer())
    }

    /// Mutates the response-in-progress (status, headers) that renderers
    /// start from.
    pub fn with_response<R>(&self, f: impl FnOnce(&mut Response) -> R) -> R {
        f(&mut self.response.borrow_mut())
    }

    /// Takes the response-in-progress, leaving a fresh one behind.
    pub fn take_response(&self) -> Response {
        std::mem::take(&mut *self.response.borrow_mut())
    }

    pub fn with_render_options<R>(&self, f: impl FnOnce(&mut RenderOptions) -> R) -> R {
        f(&mut self.render_options.borrow_mut())
    }

    /// Snapshot of the render options.
    pub fn render_options(&self) -> RenderOptions {
        self.render_options.borrow().clone()
    }
}

fn decode_path(raw: &str) -> String {
    let decoded = percent_decode_str(raw).decode_utf8_lossy();
    if decoded.starts_with('/') {
        decoded.into_owned()
    } else {
        format!("/{decoded}")
    }
}
