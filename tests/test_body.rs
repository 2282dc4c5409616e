//! Tests for the default body parser.

use basejump::{BodyParser, FormDecoder};
use bytes::Bytes;
use serde_json::Value;

async fn parse(content_type: Option<&str>, body: &'static [u8]) -> Result<basejump::ParsedBody, basejump::DispatchError> {
    FormDecoder.parse(content_type, Bytes::from_static(body)).await
}

#[tokio::test]
async fn json_object_becomes_fields() {
    let parsed = parse(Some("application/json"), br#"{"name":"alice","age":30}"#)
        .await
        .unwrap();

    assert_eq!(parsed.fields["name"], Value::String("alice".to_owned()));
    assert_eq!(parsed.fields["age"], Value::from(30));
    assert!(parsed.files.is_empty());
}

#[tokio::test]
async fn content_type_parameters_are_ignored() {
    let parsed = parse(Some("application/json; charset=utf-8"), br#"{"ok":true}"#)
        .await
        .unwrap();
    assert_eq!(parsed.fields["ok"], Value::Bool(true));
}

#[tokio::test]
async fn urlencoded_form_becomes_string_fields() {
    let parsed = parse(
        Some("application/x-www-form-urlencoded"),
        b"name=alice&greeting=hello%20world",
    )
    .await
    .unwrap();

    assert_eq!(parsed.fields["name"], Value::String("alice".to_owned()));
    assert_eq!(parsed.fields["greeting"], Value::String("hello world".to_owned()));
}

#[tokio::test]
async fn empty_body_parses_to_empty_bag() {
    let parsed = parse(None, b"").await.unwrap();
    assert!(parsed.fields.is_empty());
    assert!(parsed.files.is_empty());

    // Content type is irrelevant when there is nothing to parse.
    let parsed = parse(Some("text/csv"), b"").await.unwrap();
    assert!(parsed.fields.is_empty());
}

#[tokio::test]
async fn invalid_json_is_a_failure() {
    assert!(parse(Some("application/json"), b"{not json").await.is_err());
}

#[tokio::test]
async fn non_object_json_is_a_failure() {
    assert!(parse(Some("application/json"), b"[1,2,3]").await.is_err());
}

#[tokio::test]
async fn unsupported_content_type_is_a_failure() {
    assert!(parse(Some("text/csv"), b"a,b,c").await.is_err());
    assert!(parse(None, b"opaque bytes").await.is_err());
}
