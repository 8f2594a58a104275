//! The standard middleware stack.

use std::rc::Rc;

use tracing::{info, warn};

use crate::context::ApplicationContext;
use crate::error::Error;
use crate::middleware::{
    AutoTemplate, Gzip, LogError, LogRequest, Pipeline, Render, RouteMatch, Run, StaticContent,
};
use crate::mime::MimeDb;

/// Assembles the full-featured pipeline:
///
/// ```text
/// LogRequest → Gzip → [StaticContent] → Render → LogError → RouteMatch → AutoTemplate → Run
/// ```
///
/// Static files are served only when the application has a public path,
/// which must then be an existing directory.
pub fn default_stack(app: Rc<ApplicationContext>) -> Result<Pipeline, Error> {
    let mime = MimeDb::load()?;

    let mut builder = Pipeline::builder(Rc::clone(&app))
        .with(LogRequest)
        .with(Gzip::new(mime.compressible().clone()));

    if let Some(public) = app.public_path() {
        let statics = StaticContent::new(public, mime.names_by_extension().clone())?;
        info!(path = %statics.root().display(), "serving all files of the public path");
        warn!("do not keep secrets in the public path");
        builder = builder.with(statics);
    }

    Ok(builder
        .with(Render::new(app.default_renderer()))
        .with(LogError)
        .with(RouteMatch)
        .with(AutoTemplate)
        .run(Run))
}
