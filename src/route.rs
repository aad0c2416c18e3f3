//! A single method + path template + handler binding.

use std::collections::HashMap;
use std::fmt;

use http::Method;

use crate::error::Error;
use crate::handler::{self, BoxedHandler, HandlerOutput};
use crate::pattern::{PathPattern, VarType};
use crate::request::Request;

// ── Params ───────────────────────────────────────────────────────────────────

/// A converted path variable.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s)   => f.write_str(s),
            Self::Int(n)   => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
        }
    }
}

/// Path variables extracted for one request, keyed by placeholder name.
///
/// `<int:..>` captures arrive as [`Value::Int`], `<float:..>` as
/// [`Value::Float`], everything else as the captured [`Value::Str`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Params(HashMap<String, Value>);

impl Params {
    pub fn new() -> Self { Self::default() }

    pub fn get(&self, name: &str) -> Option<&Value> { self.0.get(name) }

    /// The variable as text. Only `Str` values answer; use [`Params::int`]
    /// or [`Params::float`] for numeric placeholders.
    pub fn str(&self, name: &str) -> Option<&str> {
        match self.0.get(name)? {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        match self.0.get(name)? {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn float(&self, name: &str) -> Option<f64> {
        match self.0.get(name)? {
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.0.insert(name.into(), value);
    }

    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

// ── Route ────────────────────────────────────────────────────────────────────

/// One registered route. Immutable once built.
pub struct Route {
    method: Method,
    pattern: PathPattern,
    pub(crate) handler: BoxedHandler,
}

impl Route {
    /// Compiles `template` and binds it to `handler`.
    pub fn new<F, R>(method: Method, template: &str, handler: F) -> Result<Self, Error>
    where
        F: Fn(&Request, &Params) -> R + Send + Sync + 'static,
        R: HandlerOutput,
    {
        Self::with_boxed(method, template, handler::boxed(handler))
    }

    pub(crate) fn with_boxed(method: Method, template: &str, handler: BoxedHandler) -> Result<Self, Error> {
        let pattern = PathPattern::compile(template)?;
        Ok(Self { method, pattern, handler })
    }

    pub fn method(&self) -> &Method { &self.method }

    /// The template as registered, placeholders included.
    pub fn template(&self) -> &str { self.pattern.template() }

    pub fn pattern(&self) -> &PathPattern { &self.pattern }

    /// True iff `method` equals this route's method exactly and `path`
    /// matches the whole compiled pattern.
    pub fn can_handle(&self, method: &str, path: &str) -> bool {
        self.method.as_str() == method && self.pattern.is_match(path)
    }

    /// Captured variables for `path`, converted per declared type.
    ///
    /// Returns an empty set when `path` does not match. A capture that fails
    /// numeric conversion is an error.
    pub fn extract_variables(&self, path: &str) -> Result<Params, Error> {
        let mut params = Params::new();
        let Some(captures) = self.pattern.captures(path) else {
            return Ok(params);
        };

        for (name, raw) in captures {
            let value = match self.pattern.var_type(name) {
                Some(VarType::Int) => Value::Int(raw.parse().map_err(|_| conversion(name, raw, "int"))?),
                Some(VarType::Float) => Value::Float(raw.parse().map_err(|_| conversion(name, raw, "float"))?),
                _ => Value::Str(raw.to_owned()),
            };
            params.insert(name, value);
        }
        Ok(params)
    }
}

fn conversion(name: &str, value: &str, kind: &'static str) -> Error {
    Error::Conversion { name: name.to_owned(), value: value.to_owned(), kind }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Route: {} for '{}'>", self.method, self.template())
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
