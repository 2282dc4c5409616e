//! Handler output and response rendering.
//!
//! Handlers do not render responses; they return an [`Output`], and a
//! [`ResponderRegistry`] decides which [`Responder`] renders it onto the
//! context. The dispatcher never inspects the output itself, so applications
//! can carry their own registry with custom rendering strategies.
//!
//! [`Responders`] is the built-in registry: one responder per output kind.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;

use crate::context::{Context, StreamEmitter};
use crate::error::DispatchError;
use crate::handler::BoxFuture;
use crate::routes::RouteMatch;
use crate::static_files::content_type_for;

// ── Output ────────────────────────────────────────────────────────────────────

/// A handler's output: one variant per response kind.
pub enum Output {
    /// A JSON document, rendered with `application/json`.
    Json(Value),
    /// A text body with an explicit content type.
    Text { content_type: String, body: String },
    /// A `302 Found` redirect.
    Redirect(String),
    /// A file on disk, rendered with a content type from its extension.
    File(PathBuf),
    /// A long-lived Server-Sent-Events response. The producer receives the
    /// emitter and controls the stream's lifetime.
    Stream(StreamProducer),
}

/// The producer side of a streaming output. Typically moves the emitter into
/// a spawned task.
pub type StreamProducer = Box<dyn FnOnce(StreamEmitter) + Send>;

impl Output {
    pub fn json(value: Value) -> Self {
        Self::Json(value)
    }

    pub fn text(body: impl Into<String>) -> Self {
        Self::Text { content_type: "text/plain; charset=utf-8".to_owned(), body: body.into() }
    }

    pub fn html(body: impl Into<String>) -> Self {
        Self::Text { content_type: "text/html; charset=utf-8".to_owned(), body: body.into() }
    }

    pub fn redirect(location: impl Into<String>) -> Self {
        Self::Redirect(location.into())
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    pub fn stream(producer: impl FnOnce(StreamEmitter) + Send + 'static) -> Self {
        Self::Stream(Box::new(producer))
    }
}

impl fmt::Debug for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(value) => f.debug_tuple("Json").field(value).finish(),
            Self::Text { content_type, body } => f
                .debug_struct("Text")
                .field("content_type", content_type)
                .field("body", body)
                .finish(),
            Self::Redirect(location) => f.debug_tuple("Redirect").field(location).finish(),
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

// ── Responder contracts ───────────────────────────────────────────────────────

/// Renders one output kind onto the context.
pub trait Responder: Send + Sync {
    fn respond<'a>(
        &'a self,
        route: &'a RouteMatch,
        ctx: &'a Arc<Context>,
        output: Output,
    ) -> BoxFuture<'a, Result<(), DispatchError>>;
}

/// Maps a handler output to its rendering strategy.
///
/// Returning `None` is an internal failure: every output the application
/// produces must have a responder.
pub trait ResponderRegistry: Send + Sync {
    fn find(&self, route: &RouteMatch, ctx: &Context, output: &Output)
        -> Option<&dyn Responder>;
}

// ── Built-in registry ─────────────────────────────────────────────────────────

/// The built-in registry: each [`Output`] kind maps to its responder.
pub struct Responders;

impl ResponderRegistry for Responders {
    fn find(
        &self,
        _route: &RouteMatch,
        _ctx: &Context,
        output: &Output,
    ) -> Option<&dyn Responder> {
        Some(match output {
            Output::Json(_) => &JsonResponder,
            Output::Text { .. } => &TextResponder,
            Output::Redirect(_) => &RedirectResponder,
            Output::File(_) => &FileResponder,
            Output::Stream(_) => &StreamResponder,
        })
    }
}

fn mismatch(expected: &str) -> DispatchError {
    DispatchError::internal(format!("responder expected {expected} output"))
}

/// Renders [`Output::Json`] as `application/json`.
pub struct JsonResponder;

impl Responder for JsonResponder {
    fn respond<'a>(
        &'a self,
        _route: &'a RouteMatch,
        ctx: &'a Arc<Context>,
        output: Output,
    ) -> BoxFuture<'a, Result<(), DispatchError>> {
        Box::pin(async move {
            let Output::Json(value) = output else {
                return Err(mismatch("json"));
            };
            ctx.send("application/json", serde_json::to_vec(&value)?);
            Ok(())
        })
    }
}

/// Renders [`Output::Text`] with its declared content type.
pub struct TextResponder;

impl Responder for TextResponder {
    fn respond<'a>(
        &'a self,
        _route: &'a RouteMatch,
        ctx: &'a Arc<Context>,
        output: Output,
    ) -> BoxFuture<'a, Result<(), DispatchError>> {
        Box::pin(async move {
            let Output::Text { content_type, body } = output else {
                return Err(mismatch("text"));
            };
            ctx.send(&content_type, body.into_bytes());
            Ok(())
        })
    }
}

/// Renders [`Output::Redirect`] as `302 Found`.
pub struct RedirectResponder;

impl Responder for RedirectResponder {
    fn respond<'a>(
        &'a self,
        _route: &'a RouteMatch,
        ctx: &'a Arc<Context>,
        output: Output,
    ) -> BoxFuture<'a, Result<(), DispatchError>> {
        Box::pin(async move {
            let Output::Redirect(location) = output else {
                return Err(mismatch("redirect"));
            };
            ctx.redirect(&location);
            Ok(())
        })
    }
}

/// Renders [`Output::File`] by reading the file and sending its bytes.
///
/// A missing file is an exposed `404`; any other read failure stays internal.
pub struct FileResponder;

impl Responder for FileResponder {
    fn respond<'a>(
        &'a self,
        _route: &'a RouteMatch,
        ctx: &'a Arc<Context>,
        output: Output,
    ) -> BoxFuture<'a, Result<(), DispatchError>> {
        Box::pin(async move {
            let Output::File(path) = output else {
                return Err(mismatch("file"));
            };
            let bytes = tokio::fs::read(&path).await.map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    DispatchError::exposed(404, "Not Found")
                } else {
                    DispatchError::internal(e)
                }
            })?;
            ctx.send(content_type_for(&path), bytes);
            Ok(())
        })
    }
}

/// Renders [`Output::Stream`] by switching the context into SSE mode and
/// handing the emitter to the producer.
pub struct StreamResponder;

impl Responder for StreamResponder {
    fn respond<'a>(
        &'a self,
        _route: &'a RouteMatch,
        ctx: &'a Arc<Context>,
        output: Output,
    ) -> BoxFuture<'a, Result<(), DispatchError>> {
        Box::pin(async move {
            let Output::Stream(producer) = output else {
                return Err(mismatch("stream"));
            };
            producer(ctx.stream());
            Ok(())
        })
    }
}
