//! Tests for request-context construction, the parameter bag, and the
//! response write operations.

use std::collections::HashMap;
use std::net::SocketAddr;

use basejump::{
    BodyEntry, BodyParser, BoxFuture, Context, DispatchError, FormDecoder, ParsedBody, RawBody,
    UploadedFile,
};
use bytes::Bytes;
use http_body_util::BodyExt;
use serde_json::Value;

fn remote() -> SocketAddr {
    "9.9.9.9:4242".parse().unwrap()
}

fn request(method: &str, uri: &str) -> http::request::Builder {
    http::Request::builder().method(method).uri(uri)
}

async fn body_text(response: http::Response<basejump::ResponseBody>) -> String {
    let collected = response.into_body().collect().await.unwrap();
    String::from_utf8(collected.to_bytes().to_vec()).unwrap()
}

/// Parser stub producing a fixed field/file bag, including a name collision
/// on `avatar`.
struct StubParser;

impl BodyParser for StubParser {
    fn parse<'a>(
        &'a self,
        _content_type: Option<&'a str>,
        _body: Bytes,
    ) -> BoxFuture<'a, Result<ParsedBody, DispatchError>> {
        Box::pin(async {
            let mut fields = HashMap::new();
            fields.insert("name".to_owned(), Value::String("alice".to_owned()));
            fields.insert("avatar".to_owned(), Value::String("as a field".to_owned()));
            let mut files = HashMap::new();
            files.insert(
                "avatar".to_owned(),
                UploadedFile {
                    filename: "avatar.png".to_owned(),
                    content_type: Some("image/png".to_owned()),
                    content: Bytes::from_static(b"png bytes"),
                },
            );
            Ok(ParsedBody { fields, files })
        })
    }
}

#[test]
fn derives_method_path_and_query() {
    let req = request("GET", "/items/42?sort=asc&page=2")
        .body(RawBody::Empty)
        .unwrap();
    let ctx = Context::new(req, remote());

    assert_eq!(ctx.method(), "get");
    assert_eq!(ctx.path(), "/items/42");
    assert_eq!(ctx.params().query().get("sort").unwrap(), "asc");
    assert_eq!(ctx.params().query().get("page").unwrap(), "2");
}

#[test]
fn forwarded_for_wins_over_socket_address() {
    let req = request("GET", "/")
        .header("x-forwarded-for", "1.2.3.4, 5.6.7.8")
        .body(RawBody::Empty)
        .unwrap();
    let ctx = Context::new(req, remote());
    assert_eq!(ctx.ip(), "1.2.3.4");
}

#[test]
fn falls_back_to_socket_address() {
    let req = request("GET", "/").body(RawBody::Empty).unwrap();
    let ctx = Context::new(req, remote());
    assert_eq!(ctx.ip(), "9.9.9.9");
}

#[test]
fn header_lookup_is_case_insensitive() {
    let req = request("GET", "/")
        .header("content-type", "application/json")
        .body(RawBody::Empty)
        .unwrap();
    let ctx = Context::new(req, remote());
    assert_eq!(ctx.params().header("Content-Type").unwrap(), "application/json");
}

#[tokio::test]
async fn body_is_none_before_parse_and_merged_after() {
    let req = request("POST", "/upload")
        .body(RawBody::from(Bytes::from_static(b"ignored by stub")))
        .unwrap();
    let ctx = Context::new(req, remote());

    assert!(ctx.params().body().is_none());

    ctx.parse(&StubParser).await.unwrap();
    let body = ctx.params().body().unwrap();

    assert_eq!(body.get("name").unwrap().as_str().unwrap(), "alice");
    // The file entry overwrites the same-named field entry.
    let avatar = body.get("avatar").unwrap();
    assert!(avatar.as_field().is_none());
    assert_eq!(avatar.as_file().unwrap().filename, "avatar.png");
}

#[tokio::test]
async fn second_parse_is_a_noop() {
    let req = request("POST", "/upload")
        .body(RawBody::from(Bytes::from_static(b"x")))
        .unwrap();
    let ctx = Context::new(req, remote());

    ctx.parse(&StubParser).await.unwrap();
    // FormDecoder would fail on this body; the raw body is already consumed,
    // so the second parse never reaches it.
    ctx.parse(&FormDecoder).await.unwrap();

    assert_eq!(
        ctx.params().body().unwrap().get("name").unwrap().as_str().unwrap(),
        "alice"
    );
}

#[tokio::test]
async fn send_sets_content_type_and_body() {
    let req = request("GET", "/").body(RawBody::Empty).unwrap();
    let ctx = Context::new(req, remote());

    ctx.send("application/json", r#"{"ok":true}"#.as_bytes().to_vec());
    let response = ctx.take_response().unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-type"], "application/json");
    assert_eq!(body_text(response).await, r#"{"ok":true}"#);
}

#[tokio::test]
async fn error_writes_status_and_plain_text() {
    let req = request("GET", "/").body(RawBody::Empty).unwrap();
    let ctx = Context::new(req, remote());

    ctx.error(404, "Not Found");
    let response = ctx.take_response().unwrap();

    assert_eq!(response.status(), 404);
    assert_eq!(response.headers()["content-type"], "text/plain");
    assert_eq!(body_text(response).await, "Not Found");
}

#[test]
fn duplicate_query_keys_keep_the_last_value() {
    let req = request("GET", "/?a=1&a=2").body(RawBody::Empty).unwrap();
    let ctx = Context::new(req, remote());
    assert_eq!(ctx.params().query().get("a").unwrap(), "2");
}

#[tokio::test]
async fn invalid_status_degrades_to_a_generic_500() {
    let req = request("GET", "/").body(RawBody::Empty).unwrap();
    let ctx = Context::new(req, remote());

    // The message was vetted for the thrown status, not for a 500.
    ctx.error(1000, "out-of-range detail");
    let response = ctx.take_response().unwrap();

    assert_eq!(response.status(), 500);
    assert_eq!(body_text(response).await, "Server Error");
}

#[tokio::test]
async fn redirect_sets_location() {
    let req = request("GET", "/old").body(RawBody::Empty).unwrap();
    let ctx = Context::new(req, remote());

    ctx.redirect("/new");
    let response = ctx.take_response().unwrap();

    assert_eq!(response.status(), 302);
    assert_eq!(response.headers()["location"], "/new");
}

#[tokio::test]
async fn first_write_wins() {
    let req = request("GET", "/").body(RawBody::Empty).unwrap();
    let ctx = Context::new(req, remote());

    ctx.send("text/plain", "first".as_bytes().to_vec());
    ctx.error(500, "second");

    let response = ctx.take_response().unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(body_text(response).await, "first");
}

#[tokio::test]
async fn handle_error_classifies_by_kind() {
    for (err, status, body) in [
        (DispatchError::bad_input("bad input"), 400, "bad input"),
        (DispatchError::exposed(403, "forbidden"), 403, "forbidden"),
        (DispatchError::internal("secret detail"), 500, "Server Error"),
    ] {
        let req = request("GET", "/").body(RawBody::Empty).unwrap();
        let ctx = Context::new(req, remote());

        ctx.handle_error(&err);
        let response = ctx.take_response().unwrap();

        assert_eq!(response.status(), status);
        assert_eq!(body_text(response).await, body);
    }
}
