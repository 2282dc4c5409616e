//! Built-in health-check handlers.
//!
//! Register them on your route table:
//!
//! ```rust,no_run
//! use basejump::{Routes, health};
//!
//! let routes = Routes::new()
//!     .get("/healthz", health::liveness)
//!     .get("/readyz", health::readiness);
//! ```
//!
//! Override `readiness` with a custom handler if you need to gate on
//! dependency availability (database connections, downstream services, etc.).

use std::sync::Arc;

use crate::context::Context;
use crate::error::DispatchError;
use crate::respond::Output;
use crate::routes::RouteMatch;

/// Liveness probe handler.
///
/// Always returns `200 OK` with body `"ok"`. If the process can respond to
/// HTTP at all, it is alive — this handler intentionally has no dependencies.
pub async fn liveness(_ctx: Arc<Context>, _route: RouteMatch) -> Result<Output, DispatchError> {
    Ok(Output::text("ok"))
}

/// Readiness probe handler (default implementation).
///
/// Returns `200 OK` with body `"ready"`. Replace this with your own handler
/// if your application needs a warm-up period or must verify dependency
/// health before accepting traffic.
pub async fn readiness(_ctx: Arc<Context>, _route: RouteMatch) -> Result<Output, DispatchError> {
    Ok(Output::text("ready"))
}
