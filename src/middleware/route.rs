use tracing::debug;

use crate::middleware::{BoxFuture, Middleware, Next};
use crate::request::Request;

/// Attaches the route matching the decoded request path, if any.
///
/// A miss is not an error here: the request continues without a route and
/// [`Run`](crate::middleware::Run) answers `404`.
#[derive(Clone, Copy, Debug, Default)]
pub struct RouteMatch;

impl Middleware for RouteMatch {
    fn handle(&self, req: Request, next: Next) -> BoxFuture {
        match req.app().routes().lookup(req.path()) {
            Some(route) => req.context().set_route(route.clone()),
            None => debug!(path = req.path(), "no route"),
        }
        next.run(req)
    }
}
