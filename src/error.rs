//! Unified error type.

/// Boxed error a handler may fail with.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by tern's fallible operations.
///
/// Ordinary request-time failures (404, 500) are expressed as
/// [`Response`](crate::Response) values and never reach the transport.
/// What does surface here is either a programming error in the hosting
/// integration ([`Error::ResponseNotReady`]), a handler failure while the
/// app runs in debug mode, or a failure from a parsing accessor such as
/// [`Request::json`](crate::Request::json).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("no route registered for {method} {path}")]
    RouteNotFound { method: String, path: String },

    #[error("handler failed: {0}")]
    Handler(BoxError),

    #[error("handler panicked: {0}")]
    Panicked(String),

    #[error("response written before a sink was attached")]
    ResponseNotReady,

    #[error("invalid route template `{template}`: {source}")]
    InvalidTemplate {
        template: String,
        #[source]
        source: regex::Error,
    },

    #[error("path variable `{name}` = `{value}` is not a valid {kind}")]
    Conversion {
        name: String,
        value: String,
        kind: &'static str,
    },

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid request uri `{uri}`: {source}")]
    InvalidUri {
        uri: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid same-site policy `{0}`, expected None, Lax or Strict")]
    InvalidSameSite(String),
}
