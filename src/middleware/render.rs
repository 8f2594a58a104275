use std::rc::Rc;

use http::header::{HeaderValue, LOCATION};
use tracing::warn;

use crate::error::Error;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::renderer::Renderer;
use crate::request::Request;
use crate::response::{Reply, Response};

/// Turns every outcome of the rest of the chain into a response.
///
/// - a ready response passes through,
/// - data is rendered with the route's renderer, else this middleware's
///   default, starting from the request's response-in-progress and render
///   options,
/// - a redirect answers with its status and a `Location` header,
/// - any other error goes through the renderer's `render_error`.
pub struct Render {
    default_renderer: Rc<dyn Renderer>,
}

impl Render {
    /// `default_renderer` mainly renders requests that matched no route.
    pub fn new(default_renderer: Rc<dyn Renderer>) -> Self {
        Self { default_renderer }
    }
}

impl Middleware for Render {
    fn handle(&self, req: Request, next: Next) -> BoxFuture {
        let default_renderer = Rc::clone(&self.default_renderer);
        Box::pin(async move {
            let result = next.run(req.clone()).await;

            let ctx = req.context();
            let renderer = ctx.route().and_then(|r| r.renderer()).unwrap_or(default_renderer);
            let response = match result {
                Ok(Reply::Response(response)) => response,
                Ok(Reply::Data(data)) => {
                    renderer.render(&req, ctx.take_response(), &ctx.render_options(), data.as_ref())
                }
                Err(e) => render_error(renderer.as_ref(), &req, e),
            };
            Ok(Reply::Response(response))
        })
    }
}

fn render_error(renderer: &dyn Renderer, req: &Request, error: Error) -> Response {
    let ctx = req.context();
    if let Some((status, location)) = error.as_http().and_then(|e| Some((e.status(), e.location()?))) {
        match HeaderValue::try_from(location) {
            Ok(location) => {
                let mut response = ctx.take_response();
                response.set_status(status);
                response.headers_mut().insert(LOCATION, location);
                return response;
            }
            Err(_) => {
                warn!(location, "redirect target is not a valid header value");
                let error = Error::internal(format!("invalid redirect target {location:?}"));
                return renderer.render_error(req, ctx.take_response(), &ctx.render_options(), &error);
            }
        }
    }
    renderer.render_error(req, ctx.take_response(), &ctx.render_options(), &error)
}

#[cfg(test)]
mod tests {
    use http::StatusCode;
    use http::header::CONTENT_TYPE;

    use super::*;
    use crate::error::HttpError;
    use crate::middleware::testing::*;
    use crate::middleware::{Pipeline, RouteMatch, Run};
    use crate::renderer::{Html, Json};
    use crate::response::Data;
    use crate::router::{Route, Routes};

    fn pipeline(routes: Routes) -> Pipeline {
        Pipeline::builder(app(routes))
            .with(Render::new(Rc::new(Json)))
            .with(RouteMatch)
            .run(Run)
    }

    #[tokio::test]
    async fn data_is_rendered_from_the_response_in_progress() {
        let routes = Routes::new().on("/created", |req: Request| async move {
            req.context().with_response(|r| r.set_status(StatusCode::CREATED));
            Data(["task1"])
        });
        let response = pipeline(routes).handle(get("/created")).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.header(CONTENT_TYPE), Some("application/json"));
        assert_eq!(body_text(response).await, r#"["task1"]"#);
    }

    #[tokio::test]
    async fn responses_pass_through() {
        let routes = Routes::new().on("/raw", |_req| async { Response::text("raw") });
        let response = pipeline(routes).handle(get("/raw")).await;
        assert_eq!(response.header(CONTENT_TYPE), Some("text/plain; charset=utf-8"));
        assert_eq!(body_text(response).await, "raw");
    }

    #[tokio::test]
    async fn redirects_set_location() {
        let routes = Routes::new().on("/", |_req| async {
            Err::<Data<()>, _>(HttpError::redirect("/demo"))
        });
        let response = pipeline(routes).handle(get("/")).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.header(LOCATION), Some("/demo"));
    }

    #[tokio::test]
    async fn route_renderer_wins_over_default() {
        let html: Rc<dyn Renderer> = Rc::new(Html::new());
        let routes = Routes::new().route(
            "/page",
            Route::new(|_req| async { Err::<Data<()>, _>(HttpError::bad_request("nope")) })
                .with_renderer(html),
        );
        let response = pipeline(routes).handle(get("/page")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.header(CONTENT_TYPE), Some("text/html; charset=utf-8"));
        assert_eq!(body_text(response).await, "nope");
    }

    #[tokio::test]
    async fn unexpected_errors_are_opaque() {
        let routes = Routes::new().on("/boom", |_req| async {
            Err::<Data<()>, _>(Error::internal("secret detail"))
        });
        let response = pipeline(routes).handle(get("/boom")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_text(response).await.is_empty());
    }
}
