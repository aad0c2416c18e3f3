//! The transport environment a hosting server hands to [`App`](crate::App).
//!
//! CGI-style: a flat string map plus an optional body stream. Header fields
//! travel as `HTTP_<NAME>` keys (`HTTP_X_REQUESTED_WITH`); the content type
//! and length travel unprefixed.

use std::collections::HashMap;
use std::fmt;
use std::io::Read;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

pub const REQUEST_METHOD: &str = "REQUEST_METHOD";
pub const SCRIPT_NAME: &str = "SCRIPT_NAME";
pub const PATH_INFO: &str = "PATH_INFO";
pub const QUERY_STRING: &str = "QUERY_STRING";
pub const CONTENT_TYPE: &str = "CONTENT_TYPE";
pub const CONTENT_LENGTH: &str = "CONTENT_LENGTH";
pub const SERVER_NAME: &str = "SERVER_NAME";
pub const SERVER_PORT: &str = "SERVER_PORT";
pub const SERVER_PROTOCOL: &str = "SERVER_PROTOCOL";
pub const REQUEST_SCHEME: &str = "REQUEST_SCHEME";
pub const HTTPS: &str = "HTTPS";
pub const HTTP_HOST: &str = "HTTP_HOST";

/// Prefix marking a header field.
pub const HEADER_PREFIX: &str = "HTTP_";

/// Unprefixed keys that are still headers.
pub const UNPREFIXED_HEADERS: [&str; 2] = [CONTENT_TYPE, CONTENT_LENGTH];

/// Bytes escaped when a path is put back into a URI. Mirrors what
/// browsers leave alone in a path: `/`, `;`, `=` and `,` stay literal.
const PATH: &AsciiSet = &CONTROLS
    .add(b' ').add(b'"').add(b'#').add(b'%').add(b'<').add(b'>')
    .add(b'?').add(b'`').add(b'{').add(b'}').add(b'[').add(b']')
    .add(b'\\').add(b'^').add(b'|');

/// Key/value request environment plus the body stream.
#[derive(Default)]
pub struct Environ {
    vars: HashMap<String, String>,
    input: Option<Box<dyn Read + Send>>,
}

impl Environ {
    pub fn new() -> Self { Self::default() }

    /// Sets `key`. Returns `self` so environments build up in one expression.
    pub fn var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Attaches the body stream.
    pub fn input(mut self, reader: impl Read + Send + 'static) -> Self {
        self.input = Some(Box::new(reader));
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub(crate) fn take_input(&mut self) -> Option<Box<dyn Read + Send>> {
        self.input.take()
    }

    /// `REQUEST_METHOD`, uppercased. Defaults to `GET`.
    pub fn method(&self) -> String {
        self.get(REQUEST_METHOD).unwrap_or("GET").to_ascii_uppercase()
    }

    /// `https` when `REQUEST_SCHEME` says so or `HTTPS` is on, else `http`.
    pub fn scheme(&self) -> &str {
        if let Some(scheme) = self.get(REQUEST_SCHEME) {
            return scheme;
        }
        match self.get(HTTPS) {
            Some(v) if matches!(v.to_ascii_lowercase().as_str(), "on" | "yes" | "1") => "https",
            _ => "http",
        }
    }

    pub fn server_port(&self) -> u16 {
        self.get(SERVER_PORT).and_then(|p| p.parse().ok()).unwrap_or(80)
    }

    /// Declared body length; absent, unparsable and negative values are zero.
    pub fn content_length(&self) -> u64 {
        self.get(CONTENT_LENGTH).and_then(|v| v.trim().parse().ok()).unwrap_or(0)
    }

    /// The full request URI rebuilt from the environment:
    /// `scheme://host[:port]/script/path?query`.
    ///
    /// A `HTTP_HOST` that is not a plain `host[:port]` is ignored in favour
    /// of `SERVER_NAME`, so the Host header can never move the path.
    ///
    /// The port is omitted when it is the scheme's default. The path is
    /// percent-encoded again, since `PATH_INFO` carries it decoded.
    pub fn request_uri(&self) -> String {
        let scheme = self.scheme();
        let mut uri = format!("{scheme}://");

        match self.get(HTTP_HOST).filter(|host| is_authority(host)) {
            Some(host) => uri.push_str(host),
            None => {
                let name = self.get(SERVER_NAME).unwrap_or("localhost");
                if name.contains(':') && !name.starts_with('[') {
                    // Bare IPv6 literal.
                    uri.push('[');
                    uri.push_str(name);
                    uri.push(']');
                } else {
                    uri.push_str(name);
                }
                let port = self.get(SERVER_PORT).unwrap_or("80");
                let default = if scheme == "https" { "443" } else { "80" };
                if port != default {
                    uri.push(':');
                    uri.push_str(port);
                }
            }
        }

        let script = self.get(SCRIPT_NAME).unwrap_or("");
        let path = self.get(PATH_INFO).unwrap_or("");
        let full = format!("{script}{path}");
        if full.is_empty() {
            uri.push('/');
        } else {
            uri.extend(utf8_percent_encode(&full, PATH));
        }

        if let Some(query) = self.get(QUERY_STRING).filter(|q| !q.is_empty()) {
            uri.push('?');
            uri.push_str(query);
        }
        uri
    }

    /// Header fields as `(lowercase-dashed-name, value)` pairs.
    pub fn headers(&self) -> impl Iterator<Item = (String, &str)> {
        self.iter().filter_map(|(key, value)| {
            let name = match key.strip_prefix(HEADER_PREFIX) {
                Some(rest) => rest,
                None if UNPREFIXED_HEADERS.contains(&key) => key,
                None => return None,
            };
            Some((name.replace('_', "-").to_ascii_lowercase(), value))
        })
    }
}

/// True for a `host[:port]` with nothing that would end the authority.
fn is_authority(host: &str) -> bool {
    !host.is_empty() && !host.contains(['/', '?', '#', '@', '\\'])
}

impl fmt::Debug for Environ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environ")
            .field("vars", &self.vars)
            .field("input", &self.input.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_uri_from_host_header() {
        let env = Environ::new()
            .var(HTTP_HOST, "example.com")
            .var(PATH_INFO, "/greet/Daniel L/")
            .var(QUERY_STRING, "a=1");
        assert_eq!(env.request_uri(), "http://example.com/greet/Daniel%20L/?a=1");
    }

    #[test]
    fn request_uri_from_server_name() {
        let env = Environ::new()
            .var(REQUEST_SCHEME, "https")
            .var(SERVER_NAME, "internal")
            .var(SERVER_PORT, "8443");
        assert_eq!(env.request_uri(), "https://internal:8443/");

        let default_port = Environ::new().var(SERVER_NAME, "internal").var(SERVER_PORT, "80");
        assert_eq!(default_port.request_uri(), "http://internal/");
    }

    #[test]
    fn ipv6_server_name_is_bracketed() {
        let env = Environ::new().var(SERVER_NAME, "::1").var(SERVER_PORT, "8000");
        assert_eq!(env.request_uri(), "http://[::1]:8000/");

        let bracketed = Environ::new().var(SERVER_NAME, "[::1]").var(SERVER_PORT, "80");
        assert_eq!(bracketed.request_uri(), "http://[::1]/");
    }

    #[test]
    fn host_that_is_not_an_authority_is_ignored() {
        for host in ["x/public/#", "x?y", "x#y", "user@x", "x\\y", ""] {
            let env = Environ::new()
                .var(HTTP_HOST, host)
                .var(SERVER_NAME, "internal")
                .var(PATH_INFO, "/admin/");
            assert_eq!(env.request_uri(), "http://internal/admin/", "{host}");
        }
        let env = Environ::new().var(HTTP_HOST, "example.com:8080").var(PATH_INFO, "/admin/");
        assert_eq!(env.request_uri(), "http://example.com:8080/admin/");
    }

    #[test]
    fn scheme_from_https_flag() {
        assert_eq!(Environ::new().var(HTTPS, "on").scheme(), "https");
        assert_eq!(Environ::new().var(HTTPS, "off").scheme(), "http");
        assert_eq!(Environ::new().scheme(), "http");
    }

    #[test]
    fn headers_are_normalised_and_filtered() {
        let env = Environ::new()
            .var("HTTP_X_REQUESTED_WITH", "XMLHttpRequest")
            .var(CONTENT_TYPE, "application/json")
            .var(SERVER_PROTOCOL, "HTTP/1.1");
        let mut headers: Vec<_> = env.headers().collect();
        headers.sort();
        assert_eq!(
            headers,
            [
                ("content-type".to_owned(), "application/json"),
                ("x-requested-with".to_owned(), "XMLHttpRequest"),
            ]
        );
    }

    #[test]
    fn content_length_defaults_to_zero() {
        assert_eq!(Environ::new().content_length(), 0);
        assert_eq!(Environ::new().var(CONTENT_LENGTH, "-3").content_length(), 0);
        assert_eq!(Environ::new().var(CONTENT_LENGTH, "18").content_length(), 18);
    }
}
