//! Route ownership.
//!
//! The dispatcher does not own routes; a [`RouteHandler`] does. It answers
//! two questions (does a route exist for `(method, path)`, and what output
//! does it produce) and may expose a static-file root enabling the
//! dispatcher's fallback.
//!
//! [`Routes`] is the built-in implementation: one radix tree per HTTP
//! method, O(path-length) lookup, type-erased async handlers.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use matchit::Router as MatchitRouter;

use crate::context::Context;
use crate::error::DispatchError;
use crate::handler::{BoxFuture, BoxedHandler, Handler};
use crate::respond::Output;

// ── RouteMatch ────────────────────────────────────────────────────────────────

/// Proof that a route exists for a request.
///
/// Produced by [`RouteHandler::find`] and carried unmodified through the
/// rest of the dispatch chain. The dispatcher imposes no invariants on it
/// beyond "non-`None` implies a route exists".
#[derive(Clone)]
pub struct RouteMatch {
    /// The registered pattern that matched, e.g. `/items/{id}`.
    pub pattern: String,
    /// Captured path parameters.
    pub params: HashMap<String, String>,
    handler: Option<BoxedHandler>,
}

impl RouteMatch {
    /// A match with no attached handler, for custom [`RouteHandler`]
    /// implementations that resolve the handler themselves.
    pub fn new(pattern: impl Into<String>, params: HashMap<String, String>) -> Self {
        Self { pattern: pattern.into(), params, handler: None }
    }

    pub(crate) fn with_handler(mut self, handler: BoxedHandler) -> Self {
        self.handler = Some(handler);
        self
    }

    /// A captured path parameter: for pattern `/items/{id}` on `/items/42`,
    /// `route.param("id")` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

impl fmt::Debug for RouteMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteMatch")
            .field("pattern", &self.pattern)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

// ── RouteHandler contract ─────────────────────────────────────────────────────

/// The external owner of the route table.
///
/// Shared read-only across all in-flight requests; implementations must not
/// mutate during dispatch.
pub trait RouteHandler: Send + Sync {
    /// Returns a match if a route exists for the lower-cased `method` and
    /// `path`, else `None`.
    fn find(&self, method: &str, path: &str) -> Option<RouteMatch>;

    /// Runs the matched route's handler and produces its output.
    fn handle(
        &self,
        ctx: Arc<Context>,
        route: RouteMatch,
    ) -> BoxFuture<'static, Result<Output, DispatchError>>;

    /// A directory to serve when no route matches. `None` disables the
    /// static fallback.
    fn static_root(&self) -> Option<&Path> {
        None
    }
}

// ── Default implementation ────────────────────────────────────────────────────

/// The built-in route table.
///
/// One radix tree per HTTP method. Build it once at startup; registrations
/// chain:
///
/// ```rust,no_run
/// # use basejump::{Output, RouteMatch, Routes};
/// let routes = Routes::new()
///     .get("/items/{id}", |_ctx, route: RouteMatch| async move {
///         let id = route.param("id").unwrap_or("?").to_owned();
///         Ok(Output::json(serde_json::json!({ "id": id })))
///     })
///     .static_dir("public");
/// ```
pub struct Routes {
    table: HashMap<String, MatchitRouter<Entry>>,
    static_root: Option<PathBuf>,
}

struct Entry {
    pattern: String,
    handler: BoxedHandler,
}

impl Routes {
    pub fn new() -> Self {
        Self { table: HashMap::new(), static_root: None }
    }

    /// Registers a handler for a method + path pair. Returns `self` for
    /// chaining. Path parameters use `{name}` syntax.
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid route pattern.
    pub fn on(mut self, method: &str, path: &str, handler: impl Handler) -> Self {
        let entry = Entry {
            pattern: path.to_owned(),
            handler: handler.into_boxed_handler(),
        };
        self.table
            .entry(method.to_ascii_lowercase())
            .or_default()
            .insert(path, entry)
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on("get", path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on("post", path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.on("put", path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.on("delete", path, handler)
    }

    /// Enables the static-file fallback rooted at `root`.
    pub fn static_dir(mut self, root: impl Into<PathBuf>) -> Self {
        self.static_root = Some(root.into());
        self
    }
}

impl Default for Routes {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteHandler for Routes {
    fn find(&self, method: &str, path: &str) -> Option<RouteMatch> {
        let tree = self.table.get(method)?;
        let matched = tree.at(path).ok()?;
        let params = matched
            .params
            .iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some(
            RouteMatch::new(matched.value.pattern.clone(), params)
                .with_handler(Arc::clone(&matched.value.handler)),
        )
    }

    fn handle(
        &self,
        ctx: Arc<Context>,
        route: RouteMatch,
    ) -> BoxFuture<'static, Result<Output, DispatchError>> {
        match route.handler.clone() {
            Some(handler) => handler.call(ctx, route),
            None => Box::pin(async {
                Err(DispatchError::internal("route match carries no handler"))
            }),
        }
    }

    fn static_root(&self) -> Option<&Path> {
        self.static_root.as_deref()
    }
}
