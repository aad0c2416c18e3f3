//! Outgoing response type, the [`IntoResponse`] conversion trait, and the
//! [`StartResponse`] sink the hosting server supplies.

use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;
use http::StatusCode;

use crate::cookie::Cookie;
use crate::error::Error;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values.
pub enum ContentType {
    Css,          // text/css
    Form,         // application/x-www-form-urlencoded
    Html,         // text/html
    Javascript,   // application/javascript
    Json,         // application/json
    OctetStream,  // application/octet-stream
    Plain,        // text/plain
    Xml,          // application/xml
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Css         => "text/css",
            Self::Form        => "application/x-www-form-urlencoded",
            Self::Html        => "text/html",
            Self::Javascript  => "application/javascript",
            Self::Json        => "application/json",
            Self::OctetStream => "application/octet-stream",
            Self::Plain       => "text/plain",
            Self::Xml         => "application/xml",
        }
    }
}

// ── StartResponse ────────────────────────────────────────────────────────────

/// The transport callback that begins sending a response: it receives the
/// status line (`"200 OK"`) and the header list before body bytes follow.
///
/// Implemented for any `FnMut(&str, &[(String, String)])`.
pub trait StartResponse: Send {
    fn start_response(&mut self, status: &str, headers: &[(String, String)]);
}

impl<F> StartResponse for F
where
    F: FnMut(&str, &[(String, String)]) + Send,
{
    fn start_response(&mut self, status: &str, headers: &[(String, String)]) {
        self(status, headers)
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response.
///
/// # Shortcuts
///
/// ```rust
/// use tern::Response;
///
/// Response::html("<h1>Hello</h1>");
/// Response::text("hello");
/// Response::json(br#"{"id":1}"#.to_vec());
/// Response::redirect("/login/", false);
/// ```
///
/// # Builder (custom status or headers)
///
/// ```rust
/// use http::StatusCode;
/// use tern::{ContentType, Response};
///
/// Response::builder()
///     .status(StatusCode::CREATED)
///     .header("Location", "/users/42")
///     .json(br#"{"id":42}"#.to_vec());
///
/// Response::builder()
///     .status(418u16)
///     .bytes(ContentType::Xml, b"<teapot/>".to_vec());
/// ```
pub struct Response {
    body: Bytes,
    status: u16,
    headers: Vec<(String, String)>,
    content_type: String,
    cookies: BTreeMap<String, Cookie>,
    sink: Option<Box<dyn StartResponse>>,
}

impl Response {
    /// `200 OK`, `text/plain`.
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self::with_content_type(ContentType::Plain.as_str(), body.into())
    }

    /// `200 OK`, `text/plain`.
    pub fn text(body: impl Into<String>) -> Self {
        Self::with_content_type(ContentType::Plain.as_str(), Bytes::from(body.into()))
    }

    /// `200 OK`, `text/html`.
    pub fn html(body: impl Into<String>) -> Self {
        Self::with_content_type(ContentType::Html.as_str(), Bytes::from(body.into()))
    }

    /// `200 OK`, `application/json`. Pass bytes from your serialiser,
    /// e.g. `serde_json::to_vec(&value)?`.
    pub fn json(body: impl Into<Bytes>) -> Self {
        Self::with_content_type(ContentType::Json.as_str(), body.into())
    }

    /// Empty `text/plain` response with the given status.
    pub fn status(code: impl Into<u16>) -> Self {
        let mut resp = Self::new(Bytes::new());
        resp.status = code.into();
        resp
    }

    /// `302 Found`, or `301 Moved Permanently` when `permanent`, pointing at `url`.
    pub fn redirect(url: &str, permanent: bool) -> Self {
        let code = if permanent { StatusCode::MOVED_PERMANENTLY } else { StatusCode::FOUND };
        let mut resp = Self::status(code);
        resp.set_header("Location", url);
        resp
    }

    /// Builder for responses that need a custom status or extra headers.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { headers: Vec::new(), status: StatusCode::OK.as_u16() }
    }

    fn with_content_type(content_type: &str, body: Bytes) -> Self {
        let mut resp = Self {
            body,
            status: StatusCode::OK.as_u16(),
            headers: Vec::new(),
            content_type: String::new(),
            cookies: BTreeMap::new(),
            sink: None,
        };
        resp.set_header("Content-Type", content_type);
        resp
    }

    pub fn body(&self) -> &[u8] { &self.body }
    pub fn status_code(&self) -> u16 { self.status }
    pub fn content_type(&self) -> &str { &self.content_type }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Cookies set on this response, ordered by name.
    pub fn cookies(&self) -> impl Iterator<Item = &Cookie> {
        self.cookies.values()
    }

    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = body.into();
    }

    pub fn set_status(&mut self, code: impl Into<u16>) {
        self.status = code.into();
    }

    /// Sets `name`, replacing any header of the same name. Setting
    /// `Content-Type` also updates [`Response::content_type`].
    pub fn set_header(&mut self, name: &str, value: &str) {
        if name.eq_ignore_ascii_case("content-type") {
            self.content_type = value.to_owned();
        }
        match self.headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
            Some(slot) => slot.1 = value.to_owned(),
            None => self.headers.push((name.to_owned(), value.to_owned())),
        }
    }

    /// Adds `cookie`, replacing an earlier one with the same name.
    pub fn set_cookie(&mut self, cookie: Cookie) {
        self.cookies.insert(cookie.name().to_owned(), cookie);
    }

    /// Expires `name` on the client by setting it empty with `Max-Age=0`.
    pub fn delete_cookie(&mut self, name: &str, path: &str, domain: Option<&str>) {
        let mut cookie = Cookie::removal(name).path(path);
        if let Some(domain) = domain {
            cookie = cookie.domain(domain);
        }
        self.set_cookie(cookie);
    }

    /// Attaches the transport sink [`Response::write`] reports to.
    pub fn attach(&mut self, sink: impl StartResponse + 'static) {
        self.sink = Some(Box::new(sink));
    }

    /// `"404 Not Found"`. Unknown codes borrow the 500 reason phrase.
    pub fn status_line(&self) -> String {
        let reason = StatusCode::from_u16(self.status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .or(StatusCode::INTERNAL_SERVER_ERROR.canonical_reason())
            .unwrap_or_default();
        format!("{} {}", self.status, reason)
    }

    /// Every header line to emit: the headers in the order they were
    /// first set, then one `Set-Cookie` per cookie.
    pub fn header_lines(&self) -> Vec<(String, String)> {
        let mut lines = self.headers.clone();
        lines.extend(
            self.cookies.values().map(|c| ("Set-Cookie".to_owned(), c.to_string())),
        );
        lines
    }

    /// Hands the status line and headers to the attached sink and returns
    /// the body.
    ///
    /// Fails with [`Error::ResponseNotReady`] when no sink was attached.
    pub fn write(&mut self) -> Result<Bytes, Error> {
        let status = self.status_line();
        let headers = self.header_lines();
        let sink = self.sink.as_mut().ok_or(Error::ResponseNotReady)?;
        sink.start_response(&status, &headers);
        Ok(self.body.clone())
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("cookies", &self.cookies)
            .field("body", &self.body)
            .finish_non_exhaustive()
    }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`].
///
/// Obtain via [`Response::builder()`]. Defaults to `200 OK`. Terminated by a
/// typed body method.
pub struct ResponseBuilder {
    headers: Vec<(String, String)>,
    status: u16,
}

impl ResponseBuilder {
    /// Accepts an `http::StatusCode` or a bare `u16`.
    pub fn status(mut self, code: impl Into<u16>) -> Self {
        self.status = code.into();
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    pub fn html(self, body: impl Into<String>) -> Response {
        self.finish(ContentType::Html.as_str(), Bytes::from(body.into()))
    }

    pub fn text(self, body: impl Into<String>) -> Response {
        self.finish(ContentType::Plain.as_str(), Bytes::from(body.into()))
    }

    pub fn json(self, body: impl Into<Bytes>) -> Response {
        self.finish(ContentType::Json.as_str(), body.into())
    }

    pub fn bytes(self, content_type: ContentType, body: impl Into<Bytes>) -> Response {
        self.finish(content_type.as_str(), body.into())
    }

    /// Like [`ResponseBuilder::bytes`] for content types outside [`ContentType`].
    pub fn typed(self, content_type: &str, body: impl Into<Bytes>) -> Response {
        self.finish(content_type, body.into())
    }

    fn finish(self, content_type: &str, body: Bytes) -> Response {
        let mut resp = Response::with_content_type(content_type, body);
        resp.status = self.status;
        for (name, value) in &self.headers {
            resp.set_header(name, value);
        }
        resp
    }
}

// ── IntoResponse ──────────────────────────────────────────────────────────────

/// Conversion into a [`Response`].
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for String {
    fn into_response(self) -> Response { Response::text(self) }
}

/// Return a bare status from a handler: `return StatusCode::NO_CONTENT`.
impl IntoResponse for StatusCode {
    fn into_response(self) -> Response { Response::status(self) }
}
