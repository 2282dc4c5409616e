//! Per-request context.
//!
//! One [`Context`] wraps one inbound request/response pair. It derives the
//! fields handlers care about (lower-cased method, path, client ip, the
//! query/header/body parameter bag) and owns the outgoing response: handlers
//! and responders write through [`send`](Context::send),
//! [`stream`](Context::stream), [`redirect`](Context::redirect) or
//! [`error`](Context::error), and the dispatcher takes the finished response
//! at the end of the chain.
//!
//! The context is shared as `Arc<Context>` across the handler and responder
//! chain of a single request. It is never shared across requests, so the
//! interior mutexes are uncontended; they exist only so the write operations
//! take `&self`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::{Arc, Mutex, OnceLock};
use std::task::Poll;
use std::time::Duration;

use bytes::Bytes;
use http::header::{CONNECTION, CONTENT_TYPE, LOCATION};
use http::{HeaderMap, HeaderValue, Response, StatusCode, Uri};
use hyper::body::{Body, Frame, SizeHint};
use http_body_util::{BodyExt, Full};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::warn;

use crate::body::{BodyEntry, BodyParser};
use crate::error::DispatchError;

/// Period of the SSE keep-alive tick. A single space is written on each tick
/// so intermediaries do not terminate an idle stream.
const KEEP_ALIVE_PERIOD: Duration = Duration::from_secs(30);

type CloseHooks = Arc<Mutex<Vec<Box<dyn FnOnce() + Send>>>>;

// ── Raw request body ──────────────────────────────────────────────────────────

/// The unconsumed inbound request body.
///
/// Held by the context until [`Context::parse`] collects it. The `Bytes`
/// variant lets tests and enclosing layers construct requests without a live
/// hyper connection.
pub enum RawBody {
    /// A live hyper request body.
    Incoming(hyper::body::Incoming),
    /// An already-buffered body.
    Bytes(Bytes),
    /// No body.
    Empty,
}

impl RawBody {
    async fn into_bytes(self) -> Result<Bytes, DispatchError> {
        match self {
            Self::Incoming(body) => Ok(body.collect().await?.to_bytes()),
            Self::Bytes(bytes) => Ok(bytes),
            Self::Empty => Ok(Bytes::new()),
        }
    }
}

impl From<Bytes> for RawBody {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<&'static str> for RawBody {
    fn from(s: &'static str) -> Self {
        Self::Bytes(Bytes::from_static(s.as_bytes()))
    }
}

impl From<()> for RawBody {
    fn from((): ()) -> Self {
        Self::Empty
    }
}

// ── Parameter bag ─────────────────────────────────────────────────────────────

/// The three-part request parameter bag: query, header, body.
///
/// `query` and `header` are available from construction. `body` is `None`
/// until [`Context::parse`] resolves.
pub struct Params {
    query: HashMap<String, String>,
    header: HeaderMap,
    body: OnceLock<HashMap<String, BodyEntry>>,
}

impl Params {
    /// Decoded query-string parameters.
    ///
    /// Duplicate keys collapse to the last occurrence: `?a=1&a=2` yields
    /// `a = "2"`.
    pub fn query(&self) -> &HashMap<String, String> {
        &self.query
    }

    /// The raw request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.header
    }

    /// A single header value, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.header.get(name).and_then(|value| value.to_str().ok())
    }

    /// The parsed body bag. `None` until `parse()` has resolved.
    pub fn body(&self) -> Option<&HashMap<String, BodyEntry>> {
        self.body.get()
    }
}

// ── Context ───────────────────────────────────────────────────────────────────

/// The per-request context. See the module docs.
pub struct Context {
    method: String,
    uri: Uri,
    path: String,
    ip: String,
    params: Params,
    raw_body: Mutex<Option<RawBody>>,
    reply: Mutex<Option<Response<ResponseBody>>>,
    close_hooks: CloseHooks,
}

impl Context {
    /// Wraps a raw request. Derives method, path, ip and the query/header
    /// parameters. Performs no I/O and never fails.
    pub fn new(request: http::Request<RawBody>, remote: SocketAddr) -> Self {
        let (parts, body) = request.into_parts();

        let method = parts.method.as_str().to_ascii_lowercase();
        let path = parts.uri.path().to_owned();
        let query = parts
            .uri
            .query()
            .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();

        // First forwarded-for hop wins over the peer socket address.
        let ip = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(|value| value.trim().to_owned())
            .unwrap_or_else(|| remote.ip().to_string());

        Self {
            method,
            uri: parts.uri,
            path,
            ip,
            params: Params { query, header: parts.headers, body: OnceLock::new() },
            raw_body: Mutex::new(Some(body)),
            reply: Mutex::new(None),
            close_hooks: Arc::default(),
        }
    }

    /// Lower-cased HTTP verb, e.g. `"get"`.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The parsed request URI (path + query).
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// The path component used for route matching.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Client address: first `x-forwarded-for` entry, else the peer socket.
    pub fn ip(&self) -> &str {
        &self.ip
    }

    /// The query/header/body parameter bag.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Collects the raw body and runs it through `parser`, merging parsed
    /// fields and files into the body bag. Fields are applied first, files
    /// second, so a file with the same name as a field wins.
    ///
    /// Parser failures propagate unchanged; the dispatcher catches them.
    /// Calling `parse` a second time is a no-op.
    pub async fn parse(&self, parser: &dyn BodyParser) -> Result<&Self, DispatchError> {
        let raw = self.raw_body.lock().unwrap().take();
        let Some(raw) = raw else { return Ok(self) };

        let bytes = raw.into_bytes().await?;
        let content_type = self.params.header("content-type").map(str::to_owned);
        let parsed = parser.parse(content_type.as_deref(), bytes).await?;

        let mut body = HashMap::with_capacity(parsed.fields.len() + parsed.files.len());
        for (name, value) in parsed.fields {
            body.insert(name, BodyEntry::Field(value));
        }
        for (name, file) in parsed.files {
            body.insert(name, BodyEntry::File(file));
        }
        let _ = self.params.body.set(body);
        Ok(self)
    }

    /// Writes a full response with the given content type and closes it.
    ///
    /// The first write wins; a second write on the same context is logged
    /// and dropped.
    pub fn send(&self, content_type: &str, body: impl Into<Bytes>) {
        let mut response = Response::new(ResponseBody::full(body.into(), &self.close_hooks));
        if let Ok(value) = HeaderValue::from_str(content_type) {
            response.headers_mut().insert(CONTENT_TYPE, value);
        }
        self.reply(response);
    }

    /// Writes a `302 Found` redirect to `location`.
    pub fn redirect(&self, location: &str) {
        let mut response = Response::new(ResponseBody::full(Bytes::new(), &self.close_hooks));
        *response.status_mut() = StatusCode::FOUND;
        if let Ok(value) = HeaderValue::from_str(location) {
            response.headers_mut().insert(LOCATION, value);
        }
        self.reply(response);
    }

    /// Writes a plain-text error response with the given status code.
    ///
    /// A status outside the valid HTTP range degrades to a generic
    /// `500 Server Error`; the caller's message was vetted for the status it
    /// was thrown with, not for a 500, so it is withheld.
    pub fn error(&self, status: u16, message: &str) {
        let (status, message) = match StatusCode::from_u16(status) {
            Ok(status) => (status, message),
            Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Server Error"),
        };
        let mut response = Response::new(ResponseBody::full(
            Bytes::copy_from_slice(message.as_bytes()),
            &self.close_hooks,
        ));
        *response.status_mut() = status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        self.reply(response);
    }

    /// Switches the response into Server-Sent-Events streaming mode.
    ///
    /// Sets the `text/event-stream` content type and `keep-alive` connection
    /// headers, emits the initial `event: update\n` control frame, and starts
    /// a keep-alive tick that writes a single space every 30 seconds until
    /// the connection closes. The returned [`StreamEmitter`] writes one
    /// `data:` frame per call. The stream stays open until the client
    /// disconnects.
    ///
    /// Only one emitter may be active per context.
    pub fn stream(&self) -> StreamEmitter {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(Bytes::from_static(b"event: update\n"));

        let mut response = Response::new(ResponseBody::channel(rx, &self.close_hooks));
        let headers = response.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        self.reply(response);

        let keep_alive = tx.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval_at(
                tokio::time::Instant::now() + KEEP_ALIVE_PERIOD,
                KEEP_ALIVE_PERIOD,
            );
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        if keep_alive.send(Bytes::from_static(b" ")).is_err() {
                            break;
                        }
                    }
                    () = keep_alive.closed() => break,
                }
            }
        });

        StreamEmitter { tx }
    }

    /// Registers `hook` to run when the underlying connection terminates.
    /// Registrations are independent; every hook runs once.
    pub fn onclose(&self, hook: impl FnOnce() + Send + 'static) {
        self.close_hooks.lock().unwrap().push(Box::new(hook));
    }

    /// Translates a dispatch failure into an error response.
    ///
    /// Bad input yields `400` with the message, an exposed error yields its
    /// own status and message, and anything else yields `500 Server Error`
    /// with the original detail withheld.
    pub fn handle_error(&self, err: &DispatchError) {
        match err {
            DispatchError::BadInput(message) => self.error(400, message),
            DispatchError::Exposed { status, message } => self.error(*status, message),
            DispatchError::Internal(_) => self.error(500, "Server Error"),
        }
    }

    /// Takes the finished response. Used by the dispatcher once the chain
    /// has run; `None` means nothing was written.
    pub fn take_response(&self) -> Option<Response<ResponseBody>> {
        self.reply.lock().unwrap().take()
    }

    fn reply(&self, response: Response<ResponseBody>) {
        let mut slot = self.reply.lock().unwrap();
        if slot.is_some() {
            warn!(path = %self.path, "response already written, dropping second write");
            let mut discarded = response;
            discarded.body_mut().disarm();
            return;
        }
        *slot = Some(response);
    }
}

// ── Stream emitter ────────────────────────────────────────────────────────────

/// Handle for pushing Server-Sent-Events frames on a streaming response.
///
/// Returned by [`Context::stream`]. Each [`emit`](StreamEmitter::emit) call
/// serializes its argument as JSON and writes one `data:` frame.
pub struct StreamEmitter {
    tx: mpsc::UnboundedSender<Bytes>,
}

impl StreamEmitter {
    /// Writes one `\ndata: <json>\n\n` frame. Returns `false` if the payload
    /// could not be serialized or the connection has closed.
    pub fn emit<T: Serialize>(&self, data: &T) -> bool {
        let Ok(json) = serde_json::to_string(data) else {
            return false;
        };
        self.tx.send(Bytes::from(format!("\ndata: {json}\n\n"))).is_ok()
    }

    /// Whether the underlying connection has closed.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// ── Response body ─────────────────────────────────────────────────────────────

/// The outgoing response body: either a full buffer or an SSE channel.
///
/// Dropping the body, whether on connection close or on normal completion,
/// runs the context's registered `onclose` hooks and, for streams, ends the
/// keep-alive tick by closing the channel.
pub struct ResponseBody {
    kind: BodyKind,
    hooks: Option<CloseHooks>,
}

enum BodyKind {
    Full(Full<Bytes>),
    Channel(mpsc::UnboundedReceiver<Bytes>),
}

impl ResponseBody {
    fn full(bytes: Bytes, hooks: &CloseHooks) -> Self {
        Self { kind: BodyKind::Full(Full::new(bytes)), hooks: Some(Arc::clone(hooks)) }
    }

    fn channel(rx: mpsc::UnboundedReceiver<Bytes>, hooks: &CloseHooks) -> Self {
        Self { kind: BodyKind::Channel(rx), hooks: Some(Arc::clone(hooks)) }
    }

    pub(crate) fn empty() -> Self {
        Self { kind: BodyKind::Full(Full::new(Bytes::new())), hooks: None }
    }

    fn disarm(&mut self) {
        self.hooks = None;
    }
}

impl Body for ResponseBody {
    type Data = Bytes;
    type Error = std::convert::Infallible;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, Self::Error>>> {
        match &mut self.get_mut().kind {
            BodyKind::Full(body) => Pin::new(body).poll_frame(cx),
            BodyKind::Channel(rx) => match rx.poll_recv(cx) {
                Poll::Ready(Some(bytes)) => Poll::Ready(Some(Ok(Frame::data(bytes)))),
                Poll::Ready(None) => Poll::Ready(None),
                Poll::Pending => Poll::Pending,
            },
        }
    }

    fn is_end_stream(&self) -> bool {
        match &self.kind {
            BodyKind::Full(body) => body.is_end_stream(),
            BodyKind::Channel(_) => false,
        }
    }

    fn size_hint(&self) -> SizeHint {
        match &self.kind {
            BodyKind::Full(body) => body.size_hint(),
            BodyKind::Channel(_) => SizeHint::default(),
        }
    }
}

impl Drop for ResponseBody {
    fn drop(&mut self) {
        if let Some(hooks) = self.hooks.take() {
            for hook in hooks.lock().unwrap().drain(..) {
                hook();
            }
        }
    }
}
