use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::context::RenderOptions;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::request::Request;

/// Points view-capable renderers at the files of the route's view stem.
///
/// Runs after the handler. When the request's renderer supports views and the
/// matched route has a view stem `S` (see [`Route::with_view`](crate::Route::with_view)):
///
/// - `viewFilePath` becomes `S.html`, unless the handler already set it,
/// - the content of `S.js` is appended to `inlineScripts`,
/// - the content of `S.css` is appended to `inlineCss`.
///
/// Relative stems resolve against the application root path.
#[derive(Clone, Copy, Debug, Default)]
pub struct AutoTemplate;

impl Middleware for AutoTemplate {
    fn handle(&self, req: Request, next: Next) -> BoxFuture {
        Box::pin(async move {
            let result = next.run(req.clone()).await;

            let ctx = req.context();
            let Some(route) = ctx.route() else {
                return result;
            };
            let Some(stem) = route.view() else {
                return result;
            };
            if !ctx.renderer().supports_views() {
                return result;
            }

            let stem = match req.app().root_path() {
                Some(root) if stem.is_relative() => root.join(stem),
                _ => stem.to_path_buf(),
            };
            let view = sibling(&stem, "html");
            let script = read_file(&sibling(&stem, "js")).await;
            let css = read_file(&sibling(&stem, "css")).await;

            ctx.with_render_options(|options| {
                options
                    .entry("viewFilePath")
                    .or_insert_with(|| Value::String(view.to_string_lossy().into_owned()));
                append(options, "inlineScripts", script);
                append(options, "inlineCss", css);
            });
            result
        })
    }
}

/// `stem` + `.ext`, keeping any dot already in the stem.
fn sibling(stem: &Path, ext: &str) -> PathBuf {
    let mut path = OsString::from(stem.as_os_str());
    path.push(".");
    path.push(ext);
    PathBuf::from(path)
}

async fn read_file(path: &Path) -> Option<String> {
    tokio::fs::read_to_string(path).await.ok()
}

fn append(options: &mut RenderOptions, key: &str, snippet: Option<String>) {
    let entry = options.entry(key).or_insert_with(|| Value::Array(Vec::new()));
    if let (Value::Array(list), Some(snippet)) = (entry, snippet) {
        list.push(Value::String(snippet));
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::rc::Rc;

    use http::StatusCode;
    use serde_json::json;

    use super::*;
    use crate::context::ApplicationContext;
    use crate::middleware::testing::*;
    use crate::middleware::{Pipeline, Render, RouteMatch, Run};
    use crate::renderer::{Html, Json, Renderer};
    use crate::response::Data;
    use crate::router::{Route, Routes};

    fn pages() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("pages")).unwrap();
        fs::write(dir.path().join("pages/demo.html"), "<h1>{{ title }}</h1>").unwrap();
        fs::write(dir.path().join("pages/demo.js"), "start();").unwrap();
        fs::write(dir.path().join("pages/other.html"), "<h2>{{ title }}</h2>").unwrap();
        fs::write(
            dir.path().join("layout.html"),
            "{{ content }}{% for s in inlineScripts %}<script>{{ s }}</script>{% endfor %}\
             {% for c in inlineCss %}<style>{{ c }}</style>{% endfor %}",
        )
        .unwrap();
        dir
    }

    fn pipeline(dir: &tempfile::TempDir, routes: Routes) -> Pipeline {
        let app = ApplicationContext::builder()
            .routes(routes)
            .root_path(dir.path())
            .default_renderer(Rc::new(Json))
            .build()
            .unwrap();
        Pipeline::builder(app)
            .with(Render::new(Rc::new(Json)))
            .with(RouteMatch)
            .with(AutoTemplate)
            .run(Run)
    }

    fn html(dir: &tempfile::TempDir) -> Rc<dyn Renderer> {
        Rc::new(Html::new().with_layout(dir.path().join("layout.html")))
    }

    #[tokio::test]
    async fn discovers_view_and_inline_script() {
        let dir = pages();
        let routes = Routes::new().route(
            "/demo",
            Route::new(|_req| async { Data(json!({ "title": "Demo" })) })
                .with_renderer(html(&dir))
                .with_view("pages/demo"),
        );
        let response = pipeline(&dir, routes).handle(get("/demo")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "<h1>Demo</h1><script>start();</script>");
    }

    #[tokio::test]
    async fn handler_choice_of_view_is_kept() {
        let dir = pages();
        let other = dir.path().join("pages/other.html").to_string_lossy().into_owned();
        let routes = Routes::new().route(
            "/demo",
            Route::new(move |req: Request| {
                let other = other.clone();
                async move {
                    req.context().with_render_options(|o| o.insert("viewFilePath".into(), other.into()));
                    Data(json!({ "title": "Other" }))
                }
            })
            .with_renderer(html(&dir))
            .with_view("pages/demo"),
        );
        let response = pipeline(&dir, routes).handle(get("/demo")).await;
        assert_eq!(body_text(response).await, "<h2>Other</h2><script>start();</script>");
    }

    #[tokio::test]
    async fn json_routes_are_untouched() {
        let dir = pages();
        let routes = Routes::new().route(
            "/api",
            Route::new(|_req| async { Data(["task1"]) }).with_view("pages/demo"),
        );
        let response = pipeline(&dir, routes).handle(get("/api")).await;
        assert_eq!(body_text(response).await, r#"["task1"]"#);
    }

    #[test]
    fn sibling_appends_the_extension() {
        assert_eq!(sibling(Path::new("pages/demo.v2"), "js"), PathBuf::from("pages/demo.v2.js"));
    }
}
