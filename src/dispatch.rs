//! The dispatcher.
//!
//! Turns one raw connection into exactly one rendered response. Per request:
//!
//! 1. Build a [`Context`] from the raw request.
//! 2. Ask the [`RouteHandler`] for a match on `(method, path)`.
//! 3. No match, static fallback configured: serve the file; on not-found,
//!    invoke the `next` continuation if one was supplied, else `404`. Any
//!    other static error is fatal for the request.
//! 4. No match, no fallback: `next` or `404`.
//! 5. Match: log the request, then run parse, handle, responder lookup and
//!    render as one fallible chain.
//! 6. Any failure in that chain is caught exactly once, logged, and
//!    translated by [`Context::handle_error`]. No retries; every request
//!    terminates in exactly one response.

use std::net::SocketAddr;
use std::sync::Arc;

use http::{Response, StatusCode};
use tracing::{error, info, warn};

use crate::body::{BodyParser, FormDecoder};
use crate::context::{Context, RawBody, ResponseBody};
use crate::error::DispatchError;
use crate::handler::BoxFuture;
use crate::respond::ResponderRegistry;
use crate::routes::{RouteHandler, RouteMatch};
use crate::static_files::{StaticError, StaticFiles};

/// An optional continuation supplied by an enclosing dispatch layer. Invoked
/// instead of responding `404` when nothing here can answer the request.
pub type Next = Box<dyn FnOnce() -> BoxFuture<'static, Response<ResponseBody>> + Send>;

/// The per-connection orchestrator. Shared behind `Arc` across connection
/// tasks; holds no per-request state.
pub struct Dispatcher {
    handler: Arc<dyn RouteHandler>,
    responders: Arc<dyn ResponderRegistry>,
    files: Option<StaticFiles>,
    parser: Arc<dyn BodyParser>,
}

impl Dispatcher {
    /// Binds a route handler and responder registry into a dispatcher.
    ///
    /// If the handler exposes a static root, the static fallback is
    /// instantiated here, once, and shared across all connections.
    pub fn attach(handler: Arc<dyn RouteHandler>, responders: Arc<dyn ResponderRegistry>) -> Self {
        let files = handler.static_root().map(StaticFiles::new);
        Self { handler, responders, files, parser: Arc::new(FormDecoder) }
    }

    /// Replaces the default body parser.
    pub fn with_parser(mut self, parser: Arc<dyn BodyParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Dispatches one request with no enclosing continuation.
    pub async fn dispatch(
        &self,
        request: http::Request<RawBody>,
        remote: SocketAddr,
    ) -> Response<ResponseBody> {
        self.dispatch_with(request, remote, None).await
    }

    /// Dispatches one request. `next`, if supplied, is invoked instead of a
    /// `404` when no route matches and the static fallback cannot serve the
    /// path. This composes the dispatcher under another dispatch layer.
    pub async fn dispatch_with(
        &self,
        request: http::Request<RawBody>,
        remote: SocketAddr,
        next: Option<Next>,
    ) -> Response<ResponseBody> {
        let ctx = Arc::new(Context::new(request, remote));

        let Some(route) = self.handler.find(ctx.method(), ctx.path()) else {
            if let Some(files) = &self.files {
                match files.serve(&ctx).await {
                    Ok(()) => return finish(&ctx),
                    Err(StaticError::NotFound) => {}
                    Err(e) => {
                        error!(path = %ctx.path(), "static serving failed: {e}");
                        ctx.handle_error(&DispatchError::internal(e));
                        return finish(&ctx);
                    }
                }
            }
            return match next {
                Some(next) => next().await,
                None => {
                    ctx.error(404, "Not Found");
                    finish(&ctx)
                }
            };
        };

        info!(method = %ctx.method(), path = %ctx.path(), ip = %ctx.ip(), "request");

        // The single catch point: one failure anywhere in the chain aborts
        // the rest and produces one error response.
        if let Err(e) = self.run(&ctx, route).await {
            error!(method = %ctx.method(), path = %ctx.path(), "dispatch failed: {e}");
            ctx.handle_error(&e);
        }
        finish(&ctx)
    }

    async fn run(&self, ctx: &Arc<Context>, route: RouteMatch) -> Result<(), DispatchError> {
        ctx.parse(self.parser.as_ref()).await?;
        let output = self.handler.handle(Arc::clone(ctx), route.clone()).await?;
        let responder = self
            .responders
            .find(&route, ctx, &output)
            .ok_or_else(|| {
                DispatchError::internal(format!("no responder for route {}", route.pattern))
            })?;
        responder.respond(&route, ctx, output).await
    }
}

/// Takes the context's finished response. A chain that rendered nothing is a
/// responder bug; it still terminates in exactly one response.
fn finish(ctx: &Context) -> Response<ResponseBody> {
    if let Some(response) = ctx.take_response() {
        return response;
    }
    warn!(path = %ctx.path(), "no response written, replying 500");
    ctx.error(500, "Server Error");
    ctx.take_response().unwrap_or_else(|| {
        let mut response = Response::new(ResponseBody::empty());
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        response
    })
}
