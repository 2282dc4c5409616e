//! Request-body parsing.
//!
//! The dispatcher treats body parsing as an opaque capability: given the raw
//! request body, produce named fields and named files, or fail. The
//! [`BodyParser`] trait is that seam; [`FormDecoder`] is the built-in
//! implementation covering JSON objects and url-encoded forms. A multipart
//! decoder plugs in through the same trait without touching the pipeline.

use std::collections::HashMap;

use bytes::Bytes;
use serde_json::Value;

use crate::error::DispatchError;
use crate::handler::BoxFuture;

/// The result of parsing a request body: named fields and named files.
#[derive(Debug, Default)]
pub struct ParsedBody {
    pub fields: HashMap<String, Value>,
    pub files: HashMap<String, UploadedFile>,
}

/// A file received in a request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// The client-supplied file name.
    pub filename: String,
    /// The declared content type, if any.
    pub content_type: Option<String>,
    /// The file's bytes.
    pub content: Bytes,
}

/// One entry in the merged body bag: a parsed field or an uploaded file.
///
/// Fields are merged first and files second, so a file overwrites a
/// same-named field.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyEntry {
    Field(Value),
    File(UploadedFile),
}

impl BodyEntry {
    /// The entry as a string, if it is a string field.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Field(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// The entry as a parsed field value.
    pub fn as_field(&self) -> Option<&Value> {
        match self {
            Self::Field(value) => Some(value),
            Self::File(_) => None,
        }
    }

    /// The entry as an uploaded file.
    pub fn as_file(&self) -> Option<&UploadedFile> {
        match self {
            Self::File(file) => Some(file),
            Self::Field(_) => None,
        }
    }
}

/// Asynchronous request-body parsing capability.
pub trait BodyParser: Send + Sync {
    /// Parses `body` into named fields and files. `content_type` is the raw
    /// `content-type` header value, if the request carried one.
    fn parse<'a>(
        &'a self,
        content_type: Option<&'a str>,
        body: Bytes,
    ) -> BoxFuture<'a, Result<ParsedBody, DispatchError>>;
}

/// The default body parser.
///
/// Decodes `application/json` objects (one field per top-level key) and
/// `application/x-www-form-urlencoded` forms. An empty body parses to an
/// empty bag regardless of content type. A non-empty body of any other type
/// is a parser failure, which the dispatcher renders as `500`.
pub struct FormDecoder;

impl BodyParser for FormDecoder {
    fn parse<'a>(
        &'a self,
        content_type: Option<&'a str>,
        body: Bytes,
    ) -> BoxFuture<'a, Result<ParsedBody, DispatchError>> {
        Box::pin(async move {
            if body.is_empty() {
                return Ok(ParsedBody::default());
            }

            // Strip parameters such as `; charset=utf-8`.
            let mime = content_type
                .unwrap_or("")
                .split(';')
                .next()
                .unwrap_or("")
                .trim();

            match mime {
                "application/json" => match serde_json::from_slice(&body)? {
                    Value::Object(map) => Ok(ParsedBody {
                        fields: map.into_iter().collect(),
                        files: HashMap::new(),
                    }),
                    _ => Err(DispatchError::internal("JSON request body must be an object")),
                },
                "application/x-www-form-urlencoded" => {
                    let fields = url::form_urlencoded::parse(&body)
                        .into_owned()
                        .map(|(name, value)| (name, Value::String(value)))
                        .collect();
                    Ok(ParsedBody { fields, files: HashMap::new() })
                }
                other => Err(DispatchError::internal(format!(
                    "unsupported request body type: {other:?}"
                ))),
            }
        })
    }
}
