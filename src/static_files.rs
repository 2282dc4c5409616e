//! Static-file fallback.
//!
//! An opaque serving capability: given a request context and a root
//! directory, serve the file at the request path or signal not-found. The
//! dispatcher uses it when no route matches and the route handler exposes a
//! static root.
//!
//! Not-found and every other I/O failure are distinct outcomes: not-found
//! falls through to the `next` continuation or a `404`, while any other
//! serving error is fatal for the request and surfaces as a `500`.

use std::fmt;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use crate::context::Context;

/// A static-serving failure.
#[derive(Debug)]
pub enum StaticError {
    /// No file exists at the request path.
    NotFound,
    /// The file exists but could not be served.
    Io(std::io::Error),
}

impl fmt::Display for StaticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => f.write_str("not found"),
            Self::Io(e) => write!(f, "io: {e}"),
        }
    }
}

impl std::error::Error for StaticError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::NotFound => None,
        }
    }
}

/// Serves files under a root directory. One instance is shared read-only
/// across all connections.
pub struct StaticFiles {
    root: PathBuf,
}

impl StaticFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Serves the file at the context's request path, writing the response
    /// through the context on success.
    ///
    /// Directory requests resolve to their `index.html`. Paths escaping the
    /// root (`..` or other non-normal components) are treated as not-found.
    pub async fn serve(&self, ctx: &Context) -> Result<(), StaticError> {
        let rel = Path::new(ctx.path().trim_start_matches('/'));
        if rel.components().any(|c| !matches!(c, Component::Normal(_))) {
            return Err(StaticError::NotFound);
        }

        let mut full = self.root.join(rel);
        match tokio::fs::metadata(&full).await {
            Ok(meta) if meta.is_dir() => full.push("index.html"),
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StaticError::NotFound),
            Err(e) => return Err(StaticError::Io(e)),
        }

        let bytes = tokio::fs::read(&full).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => StaticError::NotFound,
            _ => StaticError::Io(e),
        })?;

        ctx.send(content_type_for(&full), bytes);
        Ok(())
    }
}

/// Content type by file extension. Unknown extensions are served as opaque
/// bytes.
pub(crate) fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css",
        Some("js" | "mjs") => "text/javascript",
        Some("json") => "application/json",
        Some("txt") => "text/plain; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("ico") => "image/x-icon",
        Some("wasm") => "application/wasm",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}
