use std::collections::HashSet;
use std::rc::Rc;

use http::header::{
    ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, HeaderValue, VARY,
};

use crate::body::{Body, GzipReader};
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::request::Request;
use crate::response::{Reply, Response};

/// Responses up to this many bytes are not worth compressing (about one MTU).
pub const DEFAULT_MIN_SIZE: u64 = 1400;

/// Gzip-compresses responses on the fly.
///
/// A response is compressed only when all of these hold:
///
/// 1. the client lists `gzip` in `Accept-Encoding` (and not with `q=0`),
/// 2. the response has no `Content-Encoding` yet,
/// 3. its declared or known size exceeds the minimum size,
/// 4. its `Content-Type` is one of the compressible types,
/// 5. its body can be read again as a stream.
///
/// The compressed body is streamed; `Content-Length` is dropped.
#[derive(Clone, Debug)]
pub struct Gzip {
    compressible: Rc<HashSet<String>>,
    min_size: u64,
}

impl Gzip {
    /// `compressible` holds lower-case media types without parameters, e.g.
    /// [`MimeDb::compressible`](crate::mime::MimeDb::compressible).
    pub fn new(compressible: HashSet<String>) -> Self {
        Self { compressible: Rc::new(compressible), min_size: DEFAULT_MIN_SIZE }
    }

    /// Overrides [`DEFAULT_MIN_SIZE`].
    pub fn min_size(mut self, bytes: u64) -> Self {
        self.min_size = bytes;
        self
    }

    fn should_compress(&self, response: &Response) -> bool {
        let headers = response.headers();
        if headers.contains_key(CONTENT_ENCODING) {
            return false;
        }

        let declared = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        if declared.is_some_and(|len| len <= self.min_size) {
            return false;
        }
        if response.body().size().is_some_and(|len| len <= self.min_size) {
            return false;
        }

        let Some(content_type) = response.header(CONTENT_TYPE) else {
            return false;
        };
        let essence = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
        if !self.compressible.contains(&essence) {
            return false;
        }

        response.body().is_streamable()
    }

    fn compress(&self, mut response: Response) -> Response {
        if !self.should_compress(&response) {
            return response;
        }
        let body = response.take_body();
        let size = body.size();
        match body.into_reader() {
            Ok(reader) => {
                let headers = response.headers_mut();
                headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
                headers.remove(CONTENT_LENGTH);
                headers.append(VARY, HeaderValue::from_static("Accept-Encoding"));
                response.set_body(Body::from_reader(GzipReader::new(reader, size), None));
            }
            Err(body) => response.set_body(body),
        }
        response
    }
}

/// Whether `Accept-Encoding` lists `gzip` with a non-zero quality.
fn accepts_gzip(req: &Request) -> bool {
    req.headers()
        .get_all(ACCEPT_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|coding| {
            let mut parts = coding.split(';').map(str::trim);
            let name = parts.next().unwrap_or_default();
            name.eq_ignore_ascii_case("gzip") && !parts.any(is_zero_quality)
        })
}

fn is_zero_quality(param: &str) -> bool {
    param
        .split_once('=')
        .filter(|(key, _)| key.trim().eq_ignore_ascii_case("q"))
        .and_then(|(_, value)| value.trim().parse::<f32>().ok())
        .is_some_and(|q| q == 0.0)
}

impl Middleware for Gzip {
    fn handle(&self, req: Request, next: Next) -> BoxFuture {
        let this = self.clone();
        Box::pin(async move {
            let accepts = accepts_gzip(&req);
            match next.run(req).await? {
                Reply::Response(response) if accepts => Ok(Reply::Response(this.compress(response))),
                reply => Ok(reply),
            }
        })
    }
}
