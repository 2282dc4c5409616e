//! Error types.
//!
//! Three distinct failure domains, three types:
//!
//! - [`Error`]: infrastructure failures such as binding a port or accepting
//!   a connection. The server surface returns these.
//! - [`DispatchError`]: anything that goes wrong inside one request's
//!   dispatch chain. Caught exactly once by the dispatcher and translated
//!   into an HTTP error response by
//!   [`Context::handle_error`](crate::Context::handle_error).
//! - [`ConfigError`]: configuration-load failures. Fatal at startup,
//!   surfaced to the caller of [`Settings::load`](crate::Settings::load).

use std::fmt;
use std::path::PathBuf;

// ── Infrastructure ────────────────────────────────────────────────────────────

/// The error type returned by the server's fallible operations.
///
/// Application-level failures never surface here; they are rendered as HTTP
/// responses. This type covers binding to a port and accepting connections.
#[derive(Debug)]
pub struct Error(std::io::Error);

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "io: {}", self.0)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self(e)
    }
}

// ── Dispatch ──────────────────────────────────────────────────────────────────

/// A failure inside one request's dispatch chain.
///
/// The kind is chosen at the throw site, never inferred at the catch site:
///
/// | Variant | Client sees |
/// |---|---|
/// | `BadInput` | `400` with the message |
/// | `Exposed` | the carried status and message |
/// | `Internal` | `500 Server Error`; detail is logged, never leaked |
#[derive(Debug)]
pub enum DispatchError {
    /// Invalid client input. The message is safe to echo back.
    BadInput(String),
    /// An error explicitly marked safe to reveal, with its own status code.
    Exposed { status: u16, message: String },
    /// Everything else: parser failures, I/O, handler bugs. Never revealed.
    Internal(Box<dyn std::error::Error + Send + Sync>),
}

impl DispatchError {
    /// Invalid client input. Renders as `400` with `message` as the body.
    pub fn bad_input(message: impl Into<String>) -> Self {
        Self::BadInput(message.into())
    }

    /// An error safe to reveal. Renders as `status` with `message` as the body.
    pub fn exposed(status: u16, message: impl Into<String>) -> Self {
        Self::Exposed { status, message: message.into() }
    }

    /// An internal failure. Renders as `500 Server Error`, detail only logged.
    pub fn internal(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Internal(source.into())
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadInput(message) => write!(f, "bad input: {message}"),
            Self::Exposed { status, message } => write!(f, "{status}: {message}"),
            Self::Internal(source) => write!(f, "internal: {source}"),
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Internal(source) => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DispatchError {
    fn from(e: std::io::Error) -> Self {
        Self::internal(e)
    }
}

impl From<serde_json::Error> for DispatchError {
    fn from(e: serde_json::Error) -> Self {
        Self::internal(e)
    }
}

impl From<hyper::Error> for DispatchError {
    fn from(e: hyper::Error) -> Self {
        Self::internal(e)
    }
}

// ── Configuration ─────────────────────────────────────────────────────────────

/// A configuration-load failure. All variants are fatal at load time.
#[derive(Debug)]
pub enum ConfigError {
    /// The configuration file does not have a `.json` extension.
    NotJson(PathBuf),
    /// The file could not be read.
    Io(std::io::Error),
    /// The file is not valid JSON.
    Parse(serde_json::Error),
    /// The required top-level `basejump` section is missing.
    Invalid(PathBuf),
    /// A configured plugin was not found in any search root.
    PluginNotFound(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotJson(path) => {
                write!(f, "configuration file must be JSON: {}", path.display())
            }
            Self::Io(e) => write!(f, "failed to read configuration: {e}"),
            Self::Parse(e) => write!(f, "configuration is not valid JSON: {e}"),
            Self::Invalid(path) => write!(
                f,
                "invalid configuration file (missing `basejump` section): {}",
                path.display()
            ),
            Self::PluginNotFound(name) => write!(f, "couldn't find plugin {name}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e)
    }
}
