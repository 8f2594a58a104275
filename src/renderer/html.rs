use std::path::{Path, PathBuf};

use http::StatusCode;
use minijinja::{Environment, Value as TemplateValue, context};
use serde_json::Value;
use tracing::warn;

use crate::context::RenderOptions;
use crate::error::Error;
use crate::logger::format_error_chain;
use crate::renderer::Renderer;
use crate::request::Request;
use crate::response::{ContentType, Renderable, Response};

/// Renders data through minijinja templates into an HTML page.
///
/// Recognized render options:
///
/// | option           | meaning                                                 |
/// |------------------|---------------------------------------------------------|
/// | `viewFilePath`   | template rendered with the handler data as its context  |
/// | `layoutFilePath` | page layout, overriding the renderer's default layout  |
/// | `inlineCss`      | list of CSS snippets handed to the layout               |
/// | `inlineScripts`  | list of JS snippets handed to the layout                |
/// | `headCss`        | list of stylesheet URLs, duplicates removed             |
/// | `bottomScripts`  | list of script URLs, duplicates removed                 |
///
/// The view sees the fields of the data when it serializes to an object, and
/// `data` otherwise. The layout sees `content` (the rendered view) plus the
/// four lists above. `content` and the inline snippets are inserted without
/// escaping.
///
/// Templates are read from disk on every render with blocking reads.
#[derive(Clone, Debug, Default)]
pub struct Html {
    default_layout: Option<PathBuf>,
}

impl Html {
    pub fn new() -> Self {
        Self::default()
    }

    /// Layout used when the `layoutFilePath` option is absent.
    pub fn with_layout(mut self, path: impl Into<PathBuf>) -> Self {
        self.default_layout = Some(path.into());
        self
    }

    fn content(&self, data: &dyn Renderable, options: &RenderOptions) -> Result<String, Error> {
        let mut content = String::new();

        if let Some(view) = options.get("viewFilePath").and_then(Value::as_str) {
            let ctx = match data.to_value().map_err(Error::internal)? {
                object @ Value::Object(_) => TemplateValue::from_serialize(&object),
                other => context! { data => TemplateValue::from_serialize(&other) },
            };
            content = render_file(Path::new(view), ctx)?;
        }

        let layout = options
            .get("layoutFilePath")
            .and_then(Value::as_str)
            .map(PathBuf::from)
            .or_else(|| self.default_layout.clone());

        if let Some(layout) = layout {
            let ctx = context! {
                content => TemplateValue::from_safe_string(content),
                inlineCss => snippets(options.get("inlineCss")),
                inlineScripts => snippets(options.get("inlineScripts")),
                headCss => unique(options.get("headCss")),
                bottomScripts => unique(options.get("bottomScripts")),
            };
            content = render_file(&layout, ctx)?;
        }

        Ok(content)
    }
}

impl Renderer for Html {
    fn render(
        &self,
        req: &Request,
        mut response: Response,
        options: &RenderOptions,
        data: &dyn Renderable,
    ) -> Response {
        match self.content(data, options) {
            Ok(page) => {
                response.set_content_type(ContentType::Html);
                response.set_body(page);
                response
            }
            Err(e) => {
                warn!(path = req.path(), error = %format_error_chain(&e), "Unexpected rendering error");
                self.render_error(req, response, options, &e)
            }
        }
    }

    fn render_error(
        &self,
        _req: &Request,
        mut response: Response,
        _options: &RenderOptions,
        error: &Error,
    ) -> Response {
        response.set_content_type(ContentType::Html);
        match error.as_http() {
            Some(e) => {
                response.set_status(e.status());
                response.set_body(e.message().to_owned());
            }
            None => {
                response.set_status(StatusCode::INTERNAL_SERVER_ERROR);
                response.set_body("Internal server error");
            }
        }
        response
    }

    fn supports_views(&self) -> bool {
        true
    }
}

fn render_file(path: &Path, ctx: TemplateValue) -> Result<String, Error> {
    let source = std::fs::read_to_string(path)?;
    let name = path.to_string_lossy();
    let env = Environment::new();
    let template = env.template_from_named_str(&name, &source).map_err(Error::internal)?;
    template.render(ctx).map_err(Error::internal)
}

/// Strings of a list option, marked safe. Missing or non-list options yield an
/// empty list so layouts can iterate unconditionally.
fn snippets(option: Option<&Value>) -> TemplateValue {
    strings(option).map(TemplateValue::from_safe_string).collect::<Vec<_>>().into()
}

/// Strings of a list option, first occurrence kept.
fn unique(option: Option<&Value>) -> TemplateValue {
    let mut seen = Vec::new();
    for s in strings(option) {
        if !seen.contains(&s) {
            seen.push(s);
        }
    }
    seen.into()
}

fn strings(option: Option<&Value>) -> impl Iterator<Item = String> + '_ {
    option
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|v| v.as_str().map(str::to_owned))
}
