use http::StatusCode;
use serde_json::json;

use crate::body::Body;
use crate::context::RenderOptions;
use crate::error::Error;
use crate::renderer::Renderer;
use crate::request::Request;
use crate::response::{ContentType, Renderable, Response};

/// Renders data as `application/json`.
///
/// Intentional errors become `{"message": ..., "details": ...}` with the
/// error's status. Data that cannot be serialized yields a `500` with a
/// plain-text `Error: <reason>` body.
#[derive(Clone, Copy, Debug, Default)]
pub struct Json;

impl Renderer for Json {
    fn render(
        &self,
        _req: &Request,
        mut response: Response,
        _options: &RenderOptions,
        data: &dyn Renderable,
    ) -> Response {
        match data.to_json() {
            Ok(bytes) => {
                response.set_content_type(ContentType::Json);
                response.set_body(bytes);
            }
            Err(e) => {
                response.set_status(StatusCode::INTERNAL_SERVER_ERROR);
                response.set_content_type(ContentType::Text);
                response.set_body(format!("Error: {e}"));
            }
        }
        response
    }

    fn render_error(
        &self,
        _req: &Request,
        mut response: Response,
        _options: &RenderOptions,
        error: &Error,
    ) -> Response {
        response.set_content_type(ContentType::Json);
        match error.as_http() {
            Some(e) => {
                let body = json!({ "message": e.message(), "details": e.details() });
                response.set_status(e.status());
                response.set_body(body.to_string());
            }
            None => {
                response.set_status(StatusCode::INTERNAL_SERVER_ERROR);
                response.set_body(Body::empty());
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::rc::Rc;

    use bytes::Bytes;
    use http::header::CONTENT_TYPE;

    use super::*;
    use crate::context::ApplicationContext;
    use crate::error::HttpError;

    fn request() -> Request {
        let app = ApplicationContext::builder().default_renderer(Rc::new(Json)).build().unwrap();
        Request::new(http::Request::get("/").body(Bytes::new()).unwrap(), app)
    }

    async fn text(response: Response) -> String {
        let bytes = response.into_body().collect_bytes().await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn renders_serializable_data() {
        let r = Json.render(&request(), Response::default(), &RenderOptions::new(), &vec!["task1", "task2"]);
        assert_eq!(r.status(), StatusCode::OK);
        assert_eq!(r.header(CONTENT_TYPE), Some("application/json"));
        assert_eq!(text(r).await, r#"["task1","task2"]"#);
    }

    #[tokio::test]
    async fn serialization_failure_is_a_500() {
        // log(0) in a handler: a domain error, not a null
        let data = HashMap::from([("foo", f64::ln(0.0))]);
        let r = Json.render(&request(), Response::default(), &RenderOptions::new(), &data);
        assert_eq!(r.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(r.header(CONTENT_TYPE), Some("text/plain; charset=utf-8"));
        assert!(text(r).await.starts_with("Error"));

        let r = Json.render(&request(), Response::default(), &RenderOptions::new(), &vec![f64::NAN]);
        assert_eq!(r.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn http_errors_keep_status_and_details() {
        let err: Error = HttpError::bad_request("missing task")
            .with_details(serde_json::json!({ "field": "task" }))
            .into();
        let r = Json.render_error(&request(), Response::default(), &RenderOptions::new(), &err);
        assert_eq!(r.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = serde_json::from_str(&text(r).await).unwrap();
        assert_eq!(body["message"], "missing task");
        assert_eq!(body["details"]["field"], "task");
    }

    #[tokio::test]
    async fn other_errors_disclose_nothing() {
        let err = Error::internal("database password is hunter2");
        let r = Json.render_error(&request(), Response::default(), &RenderOptions::new(), &err);
        assert_eq!(r.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(text(r).await.is_empty());
    }
}
