use crate::error::{Error, HttpError};
use crate::middleware::{BoxFuture, Endpoint};
use crate::request::Request;
use crate::response::Reply;

/// Terminal endpoint: runs the handler of the route attached by
/// [`RouteMatch`](crate::middleware::RouteMatch), or fails with a `404`
/// [`HttpError`] when there is none.
#[derive(Clone, Copy, Debug, Default)]
pub struct Run;

impl Endpoint for Run {
    fn call(&self, req: Request) -> BoxFuture {
        match req.context().route() {
            Some(route) => route.handler().call(req),
            None => Box::pin(async { Err::<Reply, Error>(HttpError::not_found().into()) }),
        }
    }
}
