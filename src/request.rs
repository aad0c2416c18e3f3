//! Incoming request type.

use std::borrow::Cow;
use std::collections::HashMap;
use std::io::Read;
use std::sync::{LazyLock, OnceLock};

use bytes::Bytes;
use http::header::{CONTENT_TYPE, COOKIE};
use http::{HeaderMap, HeaderName, HeaderValue};
use tracing::debug;
use url::Url;

use crate::cookie::parse_cookie_header;
use crate::environ::Environ;
use crate::error::Error;
use crate::query::QueryDict;
use crate::response::ContentType;

/// Header whose presence marks an AJAX request.
pub const AJAX_HEADER: &str = "x-requested-with";

/// Base used to resolve origin-form targets (`/path?query`) so the same URL
/// parser handles both forms. Its host never leaks into a [`Request`].
static RELATIVE_BASE: LazyLock<Url> =
    LazyLock::new(|| Url::parse("http://relative.invalid/").expect("base url is valid"));

/// Parts of a request target.
#[derive(Debug)]
struct UriParts {
    path: String,
    query: QueryDict,
    fragment: String,
    host: Option<String>,
    port: Option<u16>,
}

fn split_uri(raw: &str) -> Result<UriParts, Error> {
    let invalid = |source| Error::InvalidUri { uri: raw.to_owned(), source };
    let (url, absolute) = match Url::parse(raw) {
        Ok(url) => (url, true),
        Err(url::ParseError::RelativeUrlWithoutBase) => (RELATIVE_BASE.join(raw).map_err(invalid)?, false),
        Err(e) => return Err(invalid(e)),
    };

    Ok(UriParts {
        path: url.path().to_owned(),
        query: url.query().map(|q| QueryDict::parse(q.as_bytes(), true)).unwrap_or_default(),
        fragment: url.fragment().unwrap_or_default().to_owned(),
        host: if absolute { url.host_str().map(str::to_owned) } else { None },
        port: if absolute { url.port() } else { None },
    })
}

/// An incoming HTTP request.
///
/// Immutable after construction apart from [`Request::set_uri`]. The
/// `get_data` / `post_data` / `put_data` views parse once and are cached.
#[derive(Debug)]
pub struct Request {
    method: String,
    raw_uri: String,
    path: String,
    query: QueryDict,
    fragment: String,
    headers: HeaderMap,
    body: Bytes,
    cookies: HashMap<String, String>,
    scheme: String,
    host: String,
    port: u16,
    get: OnceLock<QueryDict>,
    post: OnceLock<QueryDict>,
    put: OnceLock<QueryDict>,
}

impl Request {
    /// Starts a request for `method` on `uri` (`/path?query#fragment` or an
    /// absolute URI).
    pub fn builder(method: &str, uri: impl Into<String>) -> RequestBuilder {
        RequestBuilder {
            method: method.to_ascii_uppercase(),
            uri: uri.into(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            scheme: "http".to_owned(),
            host: String::new(),
            port: 80,
        }
    }

    /// Builds a request from a transport environment.
    ///
    /// Reads exactly `CONTENT_LENGTH` bytes from the input stream when a
    /// positive length is declared and a stream is attached.
    pub fn from_environ(mut environ: Environ) -> Result<Self, Error> {
        let length = environ.content_length();
        let body = match environ.take_input() {
            Some(input) if length > 0 => {
                let mut buf = Vec::with_capacity(usize::try_from(length).unwrap_or(0).min(64 * 1024));
                input.take(length).read_to_end(&mut buf)?;
                Bytes::from(buf)
            }
            _ => Bytes::new(),
        };

        let mut builder = Request::builder(&environ.method(), environ.request_uri())
            .scheme(environ.scheme())
            .port(environ.server_port())
            .body(body);
        for (name, value) in environ.headers() {
            builder = builder.header(&name, value);
        }
        builder.build()
    }

    pub fn method(&self) -> &str { &self.method }

    /// The unparsed target this request was built from.
    pub fn raw_uri(&self) -> &str { &self.raw_uri }
    pub fn path(&self) -> &str { &self.path }
    pub fn query(&self) -> &QueryDict { &self.query }
    pub fn fragment(&self) -> &str { &self.fragment }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }
    pub fn scheme(&self) -> &str { &self.scheme }
    pub fn host(&self) -> &str { &self.host }
    pub fn port(&self) -> u16 { self.port }
    pub fn cookies(&self) -> &HashMap<String, String> { &self.cookies }

    /// Body as text, invalid UTF-8 replaced.
    pub fn body_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Case-insensitive header lookup. Values that are not visible ASCII
    /// read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Re-splits `uri` into path, query and fragment and drops the cached
    /// `get_data` view. Host and port are left alone.
    pub fn set_uri(&mut self, uri: impl Into<String>) -> Result<(), Error> {
        let raw_uri = uri.into();
        let parts = split_uri(&raw_uri)?;
        self.raw_uri = raw_uri;
        self.path = parts.path;
        self.query = parts.query;
        self.fragment = parts.fragment;
        self.get = OnceLock::new();
        Ok(())
    }

    /// The query string as a [`QueryDict`], parsed once.
    pub fn get_data(&self) -> &QueryDict {
        self.get.get_or_init(|| self.query.clone())
    }

    /// The body decoded as form data, parsed once. Blank values are dropped.
    pub fn post_data(&self) -> &QueryDict {
        self.post.get_or_init(|| QueryDict::parse(&self.body, false))
    }

    /// Same as [`Request::post_data`], cached separately.
    pub fn put_data(&self) -> &QueryDict {
        self.put.get_or_init(|| QueryDict::parse(&self.body, false))
    }

    /// `Content-Type`, defaulting to `text/html`.
    pub fn content_type(&self) -> &str {
        self.header(CONTENT_TYPE.as_str()).unwrap_or(ContentType::Html.as_str())
    }

    /// True when the AJAX indicator header is present, whatever its value.
    pub fn is_ajax(&self) -> bool {
        self.headers.contains_key(AJAX_HEADER)
    }

    pub fn is_secure(&self) -> bool {
        self.scheme == "https"
    }

    /// The body decoded as JSON when the content type is exactly
    /// `application/json`; an empty object otherwise.
    pub fn json(&self) -> Result<serde_json::Value, Error> {
        if self.content_type() != ContentType::Json.as_str() {
            return Ok(serde_json::Value::Object(serde_json::Map::new()));
        }
        Ok(serde_json::from_slice(&self.body)?)
    }
}

// ── RequestBuilder ────────────────────────────────────────────────────────────

/// Builder for [`Request`]. Obtain via [`Request::builder`].
///
/// Defaults: scheme `http`, empty host, port 80, no headers, empty body.
/// An explicit host and port in an absolute URI fill in an empty host and
/// override the port.
pub struct RequestBuilder {
    method: String,
    uri: String,
    headers: HeaderMap,
    body: Bytes,
    scheme: String,
    host: String,
    port: u16,
}

impl RequestBuilder {
    /// Appends a header. Names and values HTTP cannot carry are skipped.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            _ => debug!(name, "skipping header that is not valid HTTP"),
        }
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn build(self) -> Result<Request, Error> {
        let parts = split_uri(&self.uri)?;

        let mut host = self.host;
        if host.is_empty() {
            host = parts.host.unwrap_or_default();
        }
        let port = parts.port.unwrap_or(self.port);

        let cookies = self.headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(parse_cookie_header)
            .collect();

        Ok(Request {
            method: self.method,
            raw_uri: self.uri,
            path: parts.path,
            query: parts.query,
            fragment: parts.fragment,
            headers: self.headers,
            body: self.body,
            cookies,
            scheme: self.scheme,
            host,
            port,
            get: OnceLock::new(),
            post: OnceLock::new(),
            put: OnceLock::new(),
        })
    }
}
