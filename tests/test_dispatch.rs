//! Tests for the dispatch pipeline: match-or-fallback routing, the error
//! taxonomy, the `next` continuation, and output rendering.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use basejump::{
    Context, DispatchError, Dispatcher, Next, Output, RawBody, Responder, ResponderRegistry,
    Responders, ResponseBody, RouteMatch, Routes,
};
use bytes::Bytes;
use http_body_util::BodyExt;

fn remote() -> SocketAddr {
    "9.9.9.9:4242".parse().unwrap()
}

fn request(method: &str, uri: &str) -> http::Request<RawBody> {
    http::Request::builder()
        .method(method)
        .uri(uri)
        .body(RawBody::Empty)
        .unwrap()
}

async fn body_text(response: http::Response<ResponseBody>) -> String {
    let collected = response.into_body().collect().await.unwrap();
    String::from_utf8(collected.to_bytes().to_vec()).unwrap()
}

fn dispatcher(routes: Routes) -> Dispatcher {
    Dispatcher::attach(Arc::new(routes), Arc::new(Responders))
}

#[tokio::test]
async fn matched_route_invokes_handler_exactly_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let routes = Routes::new().get("/hit", move |_ctx, _route| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Output::text("hit"))
        }
    });
    let app = dispatcher(routes);

    let response = app.dispatch(request("GET", "/hit"), remote()).await;
    assert_eq!(response.status(), 200);
    assert_eq!(body_text(response).await, "hit");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn path_params_reach_the_handler() {
    let routes = Routes::new().get("/items/{id}", |_ctx, route: RouteMatch| async move {
        let id = route.param("id").unwrap_or("?").to_owned();
        Ok(Output::json(serde_json::json!({ "id": id })))
    });
    let app = dispatcher(routes);

    let response = app.dispatch(request("GET", "/items/42"), remote()).await;
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-type"], "application/json");
    assert_eq!(body_text(response).await, r#"{"id":"42"}"#);
}

#[tokio::test]
async fn unmatched_route_is_404_not_found() {
    let routes = Routes::new().get("/only", |_ctx, _route| async { Ok(Output::text("only")) });
    let app = dispatcher(routes);

    let response = app.dispatch(request("GET", "/missing"), remote()).await;
    assert_eq!(response.status(), 404);
    assert_eq!(body_text(response).await, "Not Found");
}

#[tokio::test]
async fn method_mismatch_is_also_404() {
    let routes = Routes::new().get("/thing", |_ctx, _route| async { Ok(Output::text("ok")) });
    let app = dispatcher(routes);

    let response = app.dispatch(request("POST", "/thing"), remote()).await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn bad_input_renders_400_with_the_message() {
    let routes = Routes::new().get("/fail", |_ctx, _route| async {
        Err::<Output, _>(DispatchError::bad_input("bad input"))
    });
    let app = dispatcher(routes);

    let response = app.dispatch(request("GET", "/fail"), remote()).await;
    assert_eq!(response.status(), 400);
    assert_eq!(body_text(response).await, "bad input");
}

#[tokio::test]
async fn exposed_error_renders_its_own_status() {
    let routes = Routes::new().get("/fail", |_ctx, _route| async {
        Err::<Output, _>(DispatchError::exposed(403, "forbidden"))
    });
    let app = dispatcher(routes);

    let response = app.dispatch(request("GET", "/fail"), remote()).await;
    assert_eq!(response.status(), 403);
    assert_eq!(body_text(response).await, "forbidden");
}

#[tokio::test]
async fn internal_error_never_leaks_detail() {
    let routes = Routes::new().get("/fail", |_ctx, _route| async {
        Err::<Output, _>(DispatchError::internal("database password is hunter2"))
    });
    let app = dispatcher(routes);

    let response = app.dispatch(request("GET", "/fail"), remote()).await;
    assert_eq!(response.status(), 500);
    let body = body_text(response).await;
    assert_eq!(body, "Server Error");
    assert!(!body.contains("hunter2"));
}

#[tokio::test]
async fn parser_failure_is_caught_as_internal() {
    let routes =
        Routes::new().post("/items", |_ctx, _route| async { Ok(Output::text("unreached")) });
    let app = dispatcher(routes);

    let req = http::Request::builder()
        .method("POST")
        .uri("/items")
        .header("content-type", "application/json")
        .body(RawBody::from(Bytes::from_static(b"{not json")))
        .unwrap();

    let response = app.dispatch(req, remote()).await;
    assert_eq!(response.status(), 500);
    assert_eq!(body_text(response).await, "Server Error");
}

#[tokio::test]
async fn parsed_body_is_available_to_the_handler() {
    let routes = Routes::new().post("/items", |ctx: Arc<Context>, _route| async move {
        let body = ctx.params().body().expect("parsed before handle");
        let name = body.get("name").and_then(|entry| entry.as_str()).unwrap_or("?");
        Ok(Output::text(name.to_owned()))
    });
    let app = dispatcher(routes);

    let req = http::Request::builder()
        .method("POST")
        .uri("/items")
        .header("content-type", "application/json")
        .body(RawBody::from(Bytes::from_static(br#"{"name":"alice"}"#)))
        .unwrap();

    let response = app.dispatch(req, remote()).await;
    assert_eq!(body_text(response).await, "alice");
}

#[tokio::test]
async fn next_continuation_replaces_the_404() {
    let routes = Routes::new();
    let app = dispatcher(routes);

    let next: Next = Box::new(|| {
        Box::pin(async {
            let ctx = Context::new(request("GET", "/"), remote());
            ctx.error(418, "handled upstream");
            ctx.take_response().unwrap()
        })
    });

    let response = app
        .dispatch_with(request("GET", "/missing"), remote(), Some(next))
        .await;
    assert_eq!(response.status(), 418);
    assert_eq!(body_text(response).await, "handled upstream");
}

#[tokio::test]
async fn redirect_output_renders_302() {
    let routes =
        Routes::new().get("/old", |_ctx, _route| async { Ok(Output::redirect("/new")) });
    let app = dispatcher(routes);

    let response = app.dispatch(request("GET", "/old"), remote()).await;
    assert_eq!(response.status(), 302);
    assert_eq!(response.headers()["location"], "/new");
}

#[tokio::test]
async fn file_output_serves_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.json");
    std::fs::write(&path, br#"{"done":true}"#).unwrap();

    let routes = Routes::new().get("/report", move |_ctx, _route| {
        let path = path.clone();
        async move { Ok(Output::file(path)) }
    });
    let app = dispatcher(routes);

    let response = app.dispatch(request("GET", "/report"), remote()).await;
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-type"], "application/json");
    assert_eq!(body_text(response).await, r#"{"done":true}"#);
}

#[tokio::test]
async fn missing_file_output_is_an_exposed_404() {
    let routes = Routes::new().get("/report", |_ctx, _route| async {
        Ok(Output::file("/definitely/not/here.json"))
    });
    let app = dispatcher(routes);

    let response = app.dispatch(request("GET", "/report"), remote()).await;
    assert_eq!(response.status(), 404);
    assert_eq!(body_text(response).await, "Not Found");
}

#[tokio::test]
async fn stream_output_renders_sse_frames() {
    let routes = Routes::new().get("/events", |_ctx, _route| async {
        Ok(Output::stream(|emit| {
            emit.emit(&serde_json::json!({ "x": 1 }));
        }))
    });
    let app = dispatcher(routes);

    let mut response = app.dispatch(request("GET", "/events"), remote()).await;
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-type"], "text/event-stream");

    let body = response.body_mut();
    let first = body.frame().await.unwrap().unwrap().into_data().ok().expect("data frame");
    assert_eq!(&first[..], b"event: update\n");
    let second = body.frame().await.unwrap().unwrap().into_data().ok().expect("data frame");
    assert_eq!(&second[..], b"\ndata: {\"x\":1}\n\n");
}

/// A registry that refuses everything: the dispatcher must translate the
/// missing responder into a 500, not drop the request.
struct NoResponders;

impl ResponderRegistry for NoResponders {
    fn find(
        &self,
        _route: &RouteMatch,
        _ctx: &Context,
        _output: &Output,
    ) -> Option<&dyn Responder> {
        None
    }
}

#[tokio::test]
async fn missing_responder_is_a_server_error() {
    let routes = Routes::new().get("/x", |_ctx, _route| async { Ok(Output::text("x")) });
    let app = Dispatcher::attach(Arc::new(routes), Arc::new(NoResponders));

    let response = app.dispatch(request("GET", "/x"), remote()).await;
    assert_eq!(response.status(), 500);
    assert_eq!(body_text(response).await, "Server Error");
}

#[tokio::test]
async fn health_probes_answer() {
    let routes = Routes::new()
        .get("/healthz", basejump::health::liveness)
        .get("/readyz", basejump::health::readiness);
    let app = dispatcher(routes);

    let live = app.dispatch(request("GET", "/healthz"), remote()).await;
    assert_eq!(live.status(), 200);
    assert_eq!(body_text(live).await, "ok");

    let ready = app.dispatch(request("GET", "/readyz"), remote()).await;
    assert_eq!(body_text(ready).await, "ready");
}
