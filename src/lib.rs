//! # basejump
//!
//! A minimal HTTP request-dispatch layer. Nothing more. Nothing less.
//!
//! ## The contract
//!
//! basejump owns exactly one thing: the path from an inbound connection to
//! exactly one rendered response. Everything on either side of that path is
//! a collaborator you hand it:
//!
//! - A **[`RouteHandler`]** owns the route table and decides match and
//!   output. [`Routes`] is the built-in radix-tree implementation.
//! - A **[`ResponderRegistry`]** maps handler output to a rendering
//!   strategy. [`Responders`] is the built-in one-responder-per-kind
//!   registry.
//! - A **[`BodyParser`]** turns the raw body into named fields and files.
//!   [`FormDecoder`] covers JSON objects and url-encoded forms.
//!
//! The [`Dispatcher`] glues them together and adds a static-file fallback
//! for unmatched paths, with a single catch point that translates every
//! failure into one error response. [`Settings`] loads the `basejump`
//! section of a
//! JSON configuration file and resolves plugin names against an explicit
//! [`PluginRegistry`].
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use basejump::{Dispatcher, Output, Responders, RouteMatch, Routes, Server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let routes = Routes::new()
//!         .get("/items/{id}", |_ctx, route: RouteMatch| async move {
//!             let id = route.param("id").unwrap_or("?").to_owned();
//!             Ok(Output::json(serde_json::json!({ "id": id })))
//!         })
//!         .static_dir("public");
//!
//!     let app = Dispatcher::attach(Arc::new(routes), Arc::new(Responders));
//!     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! }
//! ```
//!
//! ## Error policy
//!
//! Failure kinds are chosen at the throw site via [`DispatchError`], never
//! inferred at the catch site: bad input is a `400` with the message, an
//! exposed error carries its own status and message, and anything else is a
//! `500 Server Error` whose detail is logged but never leaked.

mod body;
mod context;
mod dispatch;
mod error;
mod handler;
mod respond;
mod routes;
mod server;
mod settings;
mod static_files;

pub mod health;

pub use body::{BodyEntry, BodyParser, FormDecoder, ParsedBody, UploadedFile};
pub use context::{Context, Params, RawBody, ResponseBody, StreamEmitter};
pub use dispatch::{Dispatcher, Next};
pub use error::{ConfigError, DispatchError, Error};
pub use handler::{BoxFuture, Handler};
pub use respond::{
    FileResponder, JsonResponder, Output, RedirectResponder, Responder, ResponderRegistry,
    Responders, StreamProducer, StreamResponder, TextResponder,
};
pub use routes::{RouteHandler, RouteMatch, Routes};
pub use server::Server;
pub use settings::{PluginRegistry, ResolvedPlugin, Settings};
pub use static_files::{StaticError, StaticFiles};
