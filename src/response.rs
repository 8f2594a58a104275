//! Outgoing HTTP response type, handler replies and the [`IntoReply`]
//! conversion trait.
//!
//! A handler either builds a [`Response`] itself, which passes through the
//! render middleware untouched, or returns plain data wrapped in [`Data`],
//! which the route's renderer turns into a response.

use std::fmt;

use bytes::Bytes;
use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::body::Body;
use crate::error::{Error, HttpError};
use crate::finite;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values for use with [`ResponseBuilder::bytes`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContentType {
    Css,          // text/css
    Html,         // text/html; charset=utf-8
    JavaScript,   // application/javascript
    Json,         // application/json
    OctetStream,  // application/octet-stream
    Text,         // text/plain; charset=utf-8
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Css         => "text/css",
            Self::Html        => "text/html; charset=utf-8",
            Self::JavaScript  => "application/javascript",
            Self::Json        => "application/json",
            Self::OctetStream => "application/octet-stream",
            Self::Text        => "text/plain; charset=utf-8",
        }
    }

    pub(crate) fn header_value(self) -> HeaderValue {
        HeaderValue::from_static(self.as_str())
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response.
///
/// # Shortcuts (200 OK)
///
/// ```rust
/// use minihttpd::Response;
///
/// Response::json(r#"{"id":1}"#);
/// Response::text("hello");
/// ```
///
/// # Builder (custom status or headers)
///
/// ```rust
/// use http::StatusCode;
/// use minihttpd::{ContentType, Response};
///
/// Response::builder()
///     .status(StatusCode::CREATED)
///     .header("location", "/users/42")
///     .json(r#"{"id":42}"#);
///
/// Response::builder().bytes(ContentType::Css, "body { margin: 0 }");
/// ```
#[derive(Debug, Default)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Body,
}

impl Response {
    /// `200 OK` with `application/json`.
    pub fn json(body: impl Into<Body>) -> Self {
        Self::builder().bytes(ContentType::Json, body)
    }

    /// `200 OK` with `text/plain; charset=utf-8`.
    pub fn text(body: impl Into<String>) -> Self {
        Self::builder().text(body)
    }

    /// `200 OK` with `text/html; charset=utf-8`.
    pub fn html(body: impl Into<String>) -> Self {
        Self::builder().bytes(ContentType::Html, body.into())
    }

    /// Response with no body.
    pub fn empty(status: StatusCode) -> Self {
        Self { status, ..Self::default() }
    }

    /// Builder for responses that need a custom status or extra headers.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { status: StatusCode::OK, headers: HeaderMap::new() }
    }

    pub fn status(&self) -> StatusCode { self.status }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn headers_mut(&mut self) -> &mut HeaderMap { &mut self.headers }
    pub fn body(&self) -> &Body { &self.body }

    /// Header value as text, if present and visible ASCII.
    pub fn header(&self, name: impl header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn set_content_type(&mut self, content_type: ContentType) {
        self.headers.insert(header::CONTENT_TYPE, content_type.header_value());
    }

    pub fn set_body(&mut self, body: impl Into<Body>) {
        self.body = body.into();
    }

    /// Moves the body out, leaving an empty one.
    pub fn take_body(&mut self) -> Body {
        std::mem::take(&mut self.body)
    }

    pub fn into_body(self) -> Body {
        self.body
    }

    pub(crate) fn into_http(self) -> http::Response<Body> {
        let mut res = http::Response::new(self.body);
        *res.status_mut() = self.status;
        *res.headers_mut() = self.headers;
        res
    }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`].
///
/// Obtain via [`Response::builder()`]. Defaults to `200 OK`. Terminated by a
/// typed body method.
pub struct ResponseBuilder {
    status: StatusCode,
    headers: HeaderMap,
}

impl ResponseBuilder {
    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Appends a header. Names or values that are not valid HTTP are dropped
    /// with a warning.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            _ => warn!(name, "dropping invalid response header"),
        }
        self
    }

    /// Terminate with a JSON body (`application/json`).
    pub fn json(self, body: impl Into<Body>) -> Response {
        self.bytes(ContentType::Json, body)
    }

    /// Terminate with a plain-text body.
    pub fn text(self, body: impl Into<String>) -> Response {
        self.bytes(ContentType::Text, body.into())
    }

    /// Terminate with a typed body.
    pub fn bytes(mut self, content_type: ContentType, body: impl Into<Body>) -> Response {
        self.headers.insert(header::CONTENT_TYPE, content_type.header_value());
        self.body(body)
    }

    /// Terminate with any body; set `content-type` yourself.
    pub fn body(self, body: impl Into<Body>) -> Response {
        Response { status: self.status, headers: self.headers, body: body.into() }
    }

    /// Terminate with no body (e.g. `204 No Content`).
    pub fn no_body(self) -> Response {
        self.body(Body::empty())
    }
}

// ── Renderable data ───────────────────────────────────────────────────────────

/// Data a renderer can format.
///
/// Serialization happens at render time and may fail; renderers decide how
/// a failure is answered. Non-finite floats are a failure: JSON cannot hold
/// them. Blanket-implemented for every `Serialize` type.
pub trait Renderable {
    fn to_json(&self) -> serde_json::Result<Vec<u8>>;
    fn to_value(&self) -> serde_json::Result<Value>;
}

impl<T: Serialize + ?Sized> Renderable for T {
    fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        finite::check(self)?;
        serde_json::to_vec(self)
    }

    fn to_value(&self) -> serde_json::Result<Value> {
        finite::check(self)?;
        serde_json::to_value(self)
    }
}

/// Wraps serializable handler output so the route's renderer formats it.
///
/// ```rust
/// use minihttpd::{Data, Request};
///
/// async fn tasks(_req: Request) -> Data<Vec<&'static str>> {
///     Data(vec!["task1", "task2"])
/// }
/// ```
#[derive(Clone, Debug)]
pub struct Data<T>(pub T);

// ── Reply ─────────────────────────────────────────────────────────────────────

/// What a handler, and therefore every middleware, produces.
pub enum Reply {
    /// A ready response, passed through untouched.
    Response(Response),
    /// Data still to be rendered.
    Data(Box<dyn Renderable>),
}

impl Reply {
    pub fn data(data: impl Serialize + 'static) -> Self {
        Self::Data(Box::new(data))
    }

    /// The response, if already rendered.
    pub fn into_response(self) -> Option<Response> {
        match self {
            Self::Response(r) => Some(r),
            Self::Data(_) => None,
        }
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Response(r) => f.debug_tuple("Response").field(r).finish(),
            Self::Data(_) => f.write_str("Data(..)"),
        }
    }
}

// ── IntoReply ─────────────────────────────────────────────────────────────────

/// Conversion of handler output into `Result<Reply, Error>`.
///
/// Implemented for [`Response`], [`Data`], [`serde_json::Value`],
/// [`HttpError`] (answers with that error) and `Result<T, E>` of any of them.
pub trait IntoReply {
    fn into_reply(self) -> Result<Reply, Error>;
}

impl IntoReply for Reply {
    fn into_reply(self) -> Result<Reply, Error> { Ok(self) }
}

impl IntoReply for Response {
    fn into_reply(self) -> Result<Reply, Error> { Ok(Reply::Response(self)) }
}

impl<T: Serialize + 'static> IntoReply for Data<T> {
    fn into_reply(self) -> Result<Reply, Error> { Ok(Reply::data(self.0)) }
}

impl IntoReply for Value {
    fn into_reply(self) -> Result<Reply, Error> { Ok(Reply::data(self)) }
}

impl IntoReply for HttpError {
    fn into_reply(self) -> Result<Reply, Error> { Err(self.into()) }
}

impl<T, E> IntoReply for Result<T, E>
where
    T: IntoReply,
    E: Into<Error>,
{
    fn into_reply(self) -> Result<Reply, Error> {
        self.map_err(Into::into)?.into_reply()
    }
}

impl From<Response> for Reply {
    fn from(r: Response) -> Self { Self::Response(r) }
}

impl From<Bytes> for Response {
    fn from(bytes: Bytes) -> Self {
        Response::builder().bytes(ContentType::OctetStream, bytes)
    }
}
