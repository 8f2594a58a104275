use std::time::Instant;

use tracing::{Instrument, error, info, info_span};

use crate::logger::format_error_chain;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::request::Request;
use crate::response::Reply;

/// Opens a span per request and logs its outcome with the latency.
///
/// Everything logged further down the chain carries the span's `method` and
/// `path` fields.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogRequest;

impl Middleware for LogRequest {
    fn handle(&self, req: Request, next: Next) -> BoxFuture {
        let span = info_span!("request", method = %req.method(), path = req.path());
        Box::pin(
            async move {
                let start = Instant::now();
                let result = next.run(req).await;
                let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
                match &result {
                    Ok(Reply::Response(response)) => {
                        info!(status = response.status().as_u16(), latency_ms, "served");
                    }
                    Ok(Reply::Data(_)) => info!(latency_ms, "served, not rendered yet"),
                    Err(e) => match e.as_http() {
                        Some(http) => info!(status = http.status().as_u16(), latency_ms, "served"),
                        None => error!(error = %format_error_chain(e), latency_ms, "failed"),
                    },
                }
                result
            }
            .instrument(span),
        )
    }
}
