//! Incoming HTTP request type.

use std::collections::HashMap;
use std::rc::Rc;

use bytes::Bytes;
use http::{HeaderMap, Method, Uri, header};
use serde_json::{Map, Value};

use crate::context::{ApplicationContext, RequestContext};

/// An incoming HTTP request.
///
/// The request itself is immutable and cheap to clone: middlewares that need
/// it after calling `next` simply keep a clone. Mutable per-request state lives
/// in the attached [`RequestContext`].
#[derive(Clone)]
pub struct Request {
    inner: Rc<Inner>,
}

struct Inner {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    context: RequestContext,
}

impl Request {
    /// Wraps a buffered request and attaches a fresh [`RequestContext`].
    pub fn new(req: http::Request<Bytes>, app: Rc<ApplicationContext>) -> Self {
        let (parts, body) = req.into_parts();
        let context = RequestContext::new(app, &parts.uri);
        Self {
            inner: Rc::new(Inner {
                method: parts.method,
                uri: parts.uri,
                headers: parts.headers,
                body,
                context,
            }),
        }
    }

    pub fn method(&self) -> &Method { &self.inner.method }
    pub fn uri(&self) -> &Uri { &self.inner.uri }
    pub fn headers(&self) -> &HeaderMap { &self.inner.headers }
    pub fn body(&self) -> &[u8] { &self.inner.body }

    /// Percent-decoded URI path, without the query string.
    pub fn path(&self) -> &str {
        self.inner.context.path()
    }

    /// Header lookup; multiple values are joined with `", "`.
    /// Values that are not visible ASCII are skipped.
    pub fn header(&self, name: &str) -> Option<String> {
        let values: Vec<&str> = self.inner.headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        (!values.is_empty()).then(|| values.join(", "))
    }

    /// Decoded query string parameters. The last occurrence of a name wins.
    pub fn query_params(&self) -> HashMap<String, String> {
        self.inner.uri.query()
            .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default()
    }

    /// Body parsed according to its content type.
    ///
    /// `application/x-www-form-urlencoded` bodies yield string values,
    /// `application/json` bodies must hold an object. Anything else is `None`.
    pub fn parsed_body(&self) -> Option<Map<String, Value>> {
        let content_type = self.inner.headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
        let essence = content_type.split(';').next().unwrap_or_default().trim();
        if essence.eq_ignore_ascii_case("application/x-www-form-urlencoded") {
            let form = url::form_urlencoded::parse(&self.inner.body)
                .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
                .collect();
            return Some(form);
        }
        if essence.eq_ignore_ascii_case("application/json") {
            return match serde_json::from_slice(&self.inner.body) {
                Ok(Value::Object(map)) => Some(map),
                _ => None,
            };
        }
        None
    }

    /// Per-request mutable state.
    pub fn context(&self) -> &RequestContext {
        &self.inner.context
    }

    /// Process-wide configuration.
    pub fn app(&self) -> &ApplicationContext {
        self.inner.context.app()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::Json;

    fn app() -> Rc<ApplicationContext> {
        ApplicationContext::builder().default_renderer(Rc::new(Json)).build().unwrap()
    }

    fn request(req: http::Request<Bytes>) -> Request {
        Request::new(req, app())
    }

    #[test]
    fn path_is_decoded_and_query_parsed() {
        let req = request(
            http::Request::get("/files/hello%20world.txt?a=1&b=two%20words&a=3")
                .body(Bytes::new())
                .unwrap(),
        );
        assert_eq!(req.path(), "/files/hello world.txt");
        let query = req.query_params();
        assert_eq!(query["a"], "3");
        assert_eq!(query["b"], "two words");
    }

    #[test]
    fn form_body_is_parsed() {
        let req = request(
            http::Request::post("/api/task/add")
                .header("content-type", "application/x-www-form-urlencoded")
                .body(Bytes::from_static(b"task=buy+milk"))
                .unwrap(),
        );
        assert_eq!(req.parsed_body().unwrap()["task"], "buy milk");
    }

    #[test]
    fn json_body_is_parsed() {
        let req = request(
            http::Request::post("/api/task/add")
                .header("content-type", "application/json; charset=utf-8")
                .body(Bytes::from_static(br#"{"task":"x","n":2}"#))
                .unwrap(),
        );
        let body = req.parsed_body().unwrap();
        assert_eq!(body["n"], 2);

        let not_object = request(
            http::Request::post("/")
                .header("content-type", "application/json")
                .body(Bytes::from_static(b"[1,2]"))
                .unwrap(),
        );
        assert!(not_object.parsed_body().is_none());
    }

    #[test]
    fn repeated_headers_are_joined() {
        let req = request(
            http::Request::get("/")
                .header("accept-encoding", "br")
                .header("accept-encoding", "gzip")
                .body(Bytes::new())
                .unwrap(),
        );
        assert_eq!(req.header("Accept-Encoding").as_deref(), Some("br, gzip"));
        assert!(req.header("x-missing").is_none());
    }
}
