//! Output formatting.
//!
//! A renderer turns handler data, or an error, into a response. The render
//! middleware invokes it the same way whatever the handler returned; which
//! renderer runs is decided per route, falling back to the application
//! default.

mod html;
mod json;

use crate::context::RenderOptions;
use crate::error::Error;
use crate::request::Request;
use crate::response::{Renderable, Response};

pub use html::Html;
pub use json::Json;

/// Formats replies and errors into responses.
///
/// Both methods start from `response`, the response-in-progress of the
/// request, so statuses or headers set earlier by handlers survive. Neither
/// can fail: a renderer that cannot do its job answers with an error response
/// instead.
pub trait Renderer {
    fn render(
        &self,
        req: &Request,
        response: Response,
        options: &RenderOptions,
        data: &dyn Renderable,
    ) -> Response;

    /// Intentional [`HttpError`](crate::HttpError)s render with their own
    /// status and message. Anything else renders as a `500` that discloses
    /// nothing.
    fn render_error(
        &self,
        req: &Request,
        response: Response,
        options: &RenderOptions,
        error: &Error,
    ) -> Response;

    /// Whether the renderer uses view templates, see
    /// [`AutoTemplate`](crate::middleware::AutoTemplate).
    fn supports_views(&self) -> bool {
        false
    }
}
