use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use http::StatusCode;
use http::header::{CACHE_CONTROL as CACHE_CONTROL_HEADER, CONTENT_LENGTH, CONTENT_TYPE, HeaderValue};
use tracing::debug;

use crate::body::Body;
use crate::error::Error;
use crate::middleware::{BoxFuture, Endpoint, Middleware, Next};
use crate::request::Request;
use crate::response::{Reply, Response};

/// `Cache-Control` sent with every static file. Change the URL when the
/// content changes.
pub const CACHE_CONTROL: &str = "public, max-age=31536000";

/// Serves files below a public directory.
///
/// Requests resolving to a regular file inside the directory are answered
/// directly, without calling the rest of the chain. Anything else (missing
/// file, directory, a path escaping the root through `..` or a symlink) is
/// handed to the next middleware, or answered `404` when this is the
/// endpoint of the chain.
///
/// Do not keep secrets in the public directory: every file in it is served.
#[derive(Clone)]
pub struct StaticContent {
    root: Rc<PathBuf>,
    mime_types: Rc<HashMap<String, String>>,
}

impl StaticContent {
    /// `mime_types` maps a file extension (without the dot) to a content
    /// type, e.g. [`MimeDb::names_by_extension`](crate::mime::MimeDb::names_by_extension).
    ///
    /// Fails when `root` is not an existing directory.
    pub fn new(root: impl AsRef<Path>, mime_types: HashMap<String, String>) -> Result<Self, Error> {
        let root = root.as_ref();
        let canonical = std::fs::canonicalize(root)
            .map_err(|e| Error::config(format!("public path {}: {e}", root.display())))?;
        if !canonical.is_dir() {
            return Err(Error::config(format!("public path {} is not a directory", root.display())));
        }
        Ok(Self { root: Rc::new(canonical), mime_types: Rc::new(mime_types) })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Canonical path and size of the file `path` designates, if it may be
    /// served.
    async fn resolve(&self, path: &str) -> Option<(PathBuf, u64)> {
        let candidate = self.root.join(path.trim_start_matches('/'));
        let resolved = tokio::fs::canonicalize(&candidate).await.ok()?;
        if !resolved.starts_with(self.root.as_path()) {
            debug!(path, "refusing to serve outside the public path");
            return None;
        }
        let metadata = tokio::fs::metadata(&resolved).await.ok()?;
        metadata.is_file().then(|| (resolved, metadata.len()))
    }

    async fn serve(&self, req: &Request) -> Result<Option<Response>, Error> {
        let Some((path, size)) = self.resolve(req.path()).await else {
            return Ok(None);
        };
        let file = tokio::fs::File::open(&path).await?;

        let mut response = Response::empty(StatusCode::OK);
        let headers = response.headers_mut();
        headers.insert(CACHE_CONTROL_HEADER, HeaderValue::from_static(CACHE_CONTROL));
        headers.insert(CONTENT_LENGTH, HeaderValue::from(size));
        if let Some(mime) = self.content_type(&path) {
            headers.insert(CONTENT_TYPE, mime);
        }
        response.set_body(Body::from_reader(file, Some(size)));
        Ok(Some(response))
    }

    fn content_type(&self, path: &Path) -> Option<HeaderValue> {
        let extension = path.extension()?.to_str()?;
        let mime = self.mime_types.get(extension)?;
        HeaderValue::try_from(mime.as_str()).ok()
    }
}

impl Middleware for StaticContent {
    fn handle(&self, req: Request, next: Next) -> BoxFuture {
        let this = self.clone();
        Box::pin(async move {
            match this.serve(&req).await? {
                Some(response) => Ok(Reply::Response(response)),
                None => next.run(req).await,
            }
        })
    }
}

impl Endpoint for StaticContent {
    fn call(&self, req: Request) -> BoxFuture {
        let this = self.clone();
        Box::pin(async move {
            let response = this.serve(&req).await?.unwrap_or_else(|| Response::empty(StatusCode::NOT_FOUND));
            Ok(Reply::Response(response))
        })
    }
}
