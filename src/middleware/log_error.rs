use tracing::debug;

use crate::logger::format_error_chain;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::request::Request;

/// Logs unexpected errors on their way back through the chain, then passes
/// them on unchanged.
///
/// Intentional [`HttpError`](crate::HttpError)s are meant to be rendered and
/// are not logged.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogError;

impl Middleware for LogError {
    fn handle(&self, req: Request, next: Next) -> BoxFuture {
        Box::pin(async move {
            next.run(req.clone()).await.inspect_err(|e| {
                if !e.is_intentional() {
                    debug!(
                        method = %req.method(),
                        uri = %req.uri(),
                        error = %format_error_chain(e),
                        "request raised an error",
                    );
                }
            })
        })
    }
}
