//! Minimal basejump example — JSON endpoints, an SSE stream, static files.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/items/42
//!   curl -X POST http://localhost:3000/items \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"alice"}'
//!   curl -N http://localhost:3000/events
//!   curl http://localhost:3000/healthz

use std::sync::Arc;
use std::time::Duration;

use basejump::{Context, DispatchError, Dispatcher, Output, Responders, RouteMatch, Routes, Server, health};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let routes = Routes::new()
        .get("/items/{id}", get_item)
        .post("/items", create_item)
        .get("/events", events)
        .get("/healthz", health::liveness)
        .get("/readyz", health::readiness)
        .static_dir("public");

    let app = Dispatcher::attach(Arc::new(routes), Arc::new(Responders));

    Server::bind("0.0.0.0:3000")
        .serve(app)
        .await
        .expect("server error");
}

// GET /items/{id}
async fn get_item(_ctx: Arc<Context>, route: RouteMatch) -> Result<Output, DispatchError> {
    let id = route.param("id").unwrap_or("unknown").to_owned();
    Ok(Output::json(serde_json::json!({ "id": id, "name": "alice" })))
}

// POST /items
//
// The body bag is populated by the dispatcher before the handler runs.
// A string error becomes a 400 with the string as the body.
async fn create_item(ctx: Arc<Context>, _route: RouteMatch) -> Result<Output, DispatchError> {
    let body = ctx.params().body().ok_or_else(|| DispatchError::bad_input("missing body"))?;
    let name = body
        .get("name")
        .and_then(|entry| entry.as_str())
        .ok_or_else(|| DispatchError::bad_input("missing field: name"))?;

    Ok(Output::json(serde_json::json!({ "id": "99", "name": name })))
}

// GET /events — pushes one frame per second for ten seconds.
//
// The emitter moves into a spawned task; the stream stays open until the
// client disconnects or the producer stops writing.
async fn events(_ctx: Arc<Context>, _route: RouteMatch) -> Result<Output, DispatchError> {
    Ok(Output::stream(|emit| {
        tokio::spawn(async move {
            for n in 0..10 {
                if !emit.emit(&serde_json::json!({ "tick": n })) {
                    break;
                }
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        });
    }))
}
