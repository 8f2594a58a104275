//! Unified error type.
//!
//! Two families of errors travel back through the middleware chain.
//!
//! - [`HttpError`] is *intentional*: a handler raises it to answer with a
//!   given status (404, 400, a redirect, ...). It is rendered faithfully and
//!   never logged as a failure.
//! - Everything else is *unclassified*: logged server-side with its full cause
//!   chain, rendered to the client as an opaque `500`.
//!
//! [`Error::Config`] is the odd one out: it only ever surfaces at startup, when
//! the application is wired together, and is never rendered.

use http::StatusCode;
use serde_json::Value;

/// The error type of every pipeline operation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An intentional HTTP-level answer, see [`HttpError`].
    #[error(transparent)]
    Http(#[from] HttpError),

    /// Socket, file or body stream failure.
    #[error("io error")]
    Io(#[from] std::io::Error),

    /// Invalid application wiring: missing collaborator, malformed route
    /// table, unreadable MIME database, bad listen address.
    #[error("configuration: {0}")]
    Config(String),

    /// Any other failure raised by application code.
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl Error {
    /// Wraps an arbitrary error as an unclassified failure.
    pub fn internal(err: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>) -> Self {
        Self::Internal(err.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// `true` for errors that are expected control flow ([`HttpError`]).
    pub fn is_intentional(&self) -> bool {
        matches!(self, Self::Http(_))
    }

    pub fn as_http(&self) -> Option<&HttpError> {
        match self {
            Self::Http(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        Self::Http(e.into())
    }
}

// ── HttpError ────────────────────────────────────────────────────────────────

/// An error meant to be shown to the requester.
///
/// Carries the status to answer with, a safe-to-display message and an
/// optional structured payload that renderers include as-is.
///
/// ```rust
/// use minihttpd::HttpError;
/// use serde_json::json;
///
/// let e = HttpError::bad_request("missing task")
///     .with_details(json!({ "field": "task" }));
/// assert_eq!(e.status().as_u16(), 400);
/// ```
#[derive(Clone, Debug, thiserror::Error)]
#[error("{status}: {message}")]
pub struct HttpError {
    status: StatusCode,
    message: String,
    details: Option<Value>,
    location: Option<String>,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into(), details: None, location: None }
    }

    /// `404 Not Found`.
    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Not found")
    }

    /// `400 Bad Request`.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// `302 Found` redirect to `url`.
    pub fn redirect(url: impl Into<String>) -> Self {
        Self::redirect_with(StatusCode::FOUND, url)
    }

    /// Redirect with an explicit 3xx status (301, 303, 307, 308...).
    pub fn redirect_with(status: StatusCode, url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            status,
            message: format!("Redirecting to {url}"),
            details: None,
            location: Some(url),
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    /// Redirect target, if this is a redirect.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }
}

// ── ValidationError ──────────────────────────────────────────────────────────

/// A request parameter failed validation.
///
/// Converts into a `400` [`HttpError`], so `?` in a handler returning
/// `Result<_, Error>` answers the client with the validation message.
#[derive(Clone, Debug, thiserror::Error)]
#[error("Invalid parameter {name}: {}", .messages.join("; "))]
pub struct ValidationError {
    name: String,
    messages: Vec<String>,
}

impl ValidationError {
    pub fn new(name: impl Into<String>, messages: Vec<String>) -> Self {
        Self { name: name.into(), messages }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }
}

impl From<ValidationError> for HttpError {
    fn from(e: ValidationError) -> Self {
        HttpError::bad_request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_http_errors_are_intentional() {
        assert!(Error::from(HttpError::not_found()).is_intentional());
        assert!(!Error::internal("boom").is_intentional());
        assert!(!Error::config("no renderer").is_intentional());
    }

    #[test]
    fn redirect_carries_location() {
        let e = HttpError::redirect("/demo");
        assert_eq!(e.status(), StatusCode::FOUND);
        assert_eq!(e.location(), Some("/demo"));
        assert!(HttpError::not_found().location().is_none());
    }

    #[test]
    fn validation_error_becomes_bad_request() {
        let v = ValidationError::new("task", vec!["Value is required".into(), "too short".into()]);
        let e = Error::from(v);
        let http = e.as_http().unwrap();
        assert_eq!(http.status(), StatusCode::BAD_REQUEST);
        assert_eq!(http.message(), "Invalid parameter task: Value is required; too short");
    }
}
