//! `Set-Cookie` directives and `Cookie` header parsing.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::error::Error;

/// The `SameSite` attribute. Only the three standard policies exist.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SameSite {
    None,
    Lax,
    Strict,
}

impl SameSite {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None   => "None",
            Self::Lax    => "Lax",
            Self::Strict => "Strict",
        }
    }
}

impl FromStr for SameSite {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none"   => Ok(Self::None),
            "lax"    => Ok(Self::Lax),
            "strict" => Ok(Self::Strict),
            _        => Err(Error::InvalidSameSite(s.to_owned())),
        }
    }
}

/// One outbound cookie directive.
///
/// ```rust
/// use tern::{Cookie, SameSite};
///
/// let c = Cookie::new("session", "abc123")
///     .max_age(3600)
///     .http_only(true)
///     .same_site(SameSite::Lax);
/// assert_eq!(c.to_string(), "session=abc123; HttpOnly; Max-Age=3600; Path=/; SameSite=Lax");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cookie {
    name: String,
    value: String,
    max_age: Option<i64>,
    expires: Option<String>,
    path: String,
    domain: Option<String>,
    secure: bool,
    http_only: bool,
    same_site: Option<SameSite>,
}

impl Cookie {
    /// A session cookie scoped to `Path=/`.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            max_age: None,
            expires: None,
            path: "/".to_owned(),
            domain: None,
            secure: false,
            http_only: false,
            same_site: None,
        }
    }

    /// An already-expired cookie: empty value, `Max-Age=0`.
    pub fn removal(name: impl Into<String>) -> Self {
        Self::new(name, "").max_age(0)
    }

    pub fn max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    /// Absolute expiry, rendered as an HTTP date.
    pub fn expires(mut self, at: DateTime<Utc>) -> Self {
        self.expires = Some(at.format("%a, %d %b %Y %H:%M:%S GMT").to_string());
        self
    }

    /// Absolute expiry given as preformatted text.
    pub fn expires_raw(mut self, at: impl Into<String>) -> Self {
        self.expires = Some(at.into());
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn secure(mut self, on: bool) -> Self {
        self.secure = on;
        self
    }

    pub fn http_only(mut self, on: bool) -> Self {
        self.http_only = on;
        self
    }

    pub fn same_site(mut self, policy: SameSite) -> Self {
        self.same_site = Some(policy);
        self
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn value(&self) -> &str { &self.value }
    pub fn get_max_age(&self) -> Option<i64> { self.max_age }
    pub fn get_path(&self) -> &str { &self.path }
    pub fn get_domain(&self) -> Option<&str> { self.domain.as_deref() }
}

/// The header value: `name=value` followed by attributes in alphabetical
/// attribute order (`Domain`, `expires`, `HttpOnly`, `Max-Age`, `Path`,
/// `SameSite`, `Secure`).
impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)?;
        if let Some(domain) = &self.domain {
            write!(f, "; Domain={domain}")?;
        }
        if let Some(expires) = &self.expires {
            write!(f, "; expires={expires}")?;
        }
        if self.http_only {
            f.write_str("; HttpOnly")?;
        }
        if let Some(max_age) = self.max_age {
            write!(f, "; Max-Age={max_age}")?;
        }
        if !self.path.is_empty() {
            write!(f, "; Path={}", self.path)?;
        }
        if let Some(policy) = self.same_site {
            write!(f, "; SameSite={}", policy.as_str())?;
        }
        if self.secure {
            f.write_str("; Secure")?;
        }
        Ok(())
    }
}

/// Parses a `Cookie` request header (`a=1; b="two"`).
///
/// Pairs without `=` are skipped; double-quoted values are unquoted.
pub fn parse_cookie_header(header: &str) -> HashMap<String, String> {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            Some((name.to_owned(), value.to_owned()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn defaults_to_root_path() {
        assert_eq!(Cookie::new("username", "daniel").to_string(), "username=daniel; Path=/");
    }

    #[test]
    fn renders_every_attribute() {
        let at = Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap();
        let c = Cookie::new("id", "42")
            .domain("example.com")
            .expires(at)
            .http_only(true)
            .max_age(60)
            .path("/app")
            .same_site(SameSite::Strict)
            .secure(true);
        assert_eq!(
            c.to_string(),
            "id=42; Domain=example.com; expires=Wed, 02 Jan 2030 03:04:05 GMT; HttpOnly; \
             Max-Age=60; Path=/app; SameSite=Strict; Secure"
        );
    }

    #[test]
    fn removal_expires_immediately() {
        assert_eq!(Cookie::removal("username").to_string(), "username=; Max-Age=0; Path=/");
    }

    #[test]
    fn same_site_only_accepts_standard_policies() {
        assert_eq!("lax".parse::<SameSite>().unwrap(), SameSite::Lax);
        assert_eq!("Strict".parse::<SameSite>().unwrap(), SameSite::Strict);
        assert!(matches!("sometimes".parse::<SameSite>(), Err(Error::InvalidSameSite(_))));
    }

    #[test]
    fn parses_cookie_header() {
        let jar = parse_cookie_header("session=abc123; moof=\"dogcow\"; junk; =x");
        assert_eq!(jar.len(), 2);
        assert_eq!(jar["session"], "abc123");
        assert_eq!(jar["moof"], "dogcow");
    }
}
