//! Path template compiler.
//!
//! A template is a literal path with typed placeholders of the form
//! `<type:name>`:
//!
//! ```text
//! /app/<uuid:app_id>/version/<int:major>/<any:rest>
//! ```
//!
//! Compilation replaces every placeholder with a named capture group chosen
//! by its type, escapes the literal text around it, and anchors the result at
//! both ends. A path matches only if the whole string matches.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::Error;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(?P<kind>\w+):(?P<name>\w+)>").expect("placeholder pattern is valid")
});

/// Declared type of a placeholder.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum VarType {
    Str,
    Int,
    Float,
    Uuid,
    Slug,
    Any,
    /// Unrecognised type tag. Matches like [`VarType::Str`] and is never
    /// converted.
    Other(String),
}

impl VarType {
    pub fn parse(tag: &str) -> Self {
        match tag {
            "str"   => Self::Str,
            "int"   => Self::Int,
            "float" => Self::Float,
            "uuid"  => Self::Uuid,
            "slug"  => Self::Slug,
            "any"   => Self::Any,
            other   => Self::Other(other.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Str      => "str",
            Self::Int      => "int",
            Self::Float    => "float",
            Self::Uuid     => "uuid",
            Self::Slug     => "slug",
            Self::Any      => "any",
            Self::Other(s) => s,
        }
    }

    /// Body of the capture group for this type.
    ///
    /// `Float` keeps the historical unescaped dot, so `1x5` matches the
    /// segment and only fails later, at conversion.
    fn fragment(&self) -> &'static str {
        match self {
            Self::Int   => "[0-9]+",
            Self::Float => "[0-9]+.[0-9]+",
            Self::Uuid  => "[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
            Self::Slug  => r"[\w.\-]+",
            Self::Any   => ".+",
            Self::Str | Self::Other(_) => "[^/]+",
        }
    }
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A compiled path template.
#[derive(Clone, Debug)]
pub struct PathPattern {
    template: String,
    regex: Regex,
    types: HashMap<String, VarType>,
}

impl PathPattern {
    /// Compiles `template`.
    ///
    /// Fails only when the generated expression is rejected, which in
    /// practice means two placeholders share a name.
    pub fn compile(template: &str) -> Result<Self, Error> {
        let mut raw = String::with_capacity(template.len() + 16);
        let mut types = HashMap::new();
        let mut last = 0;

        raw.push('^');
        for caps in PLACEHOLDER.captures_iter(template) {
            let Some(whole) = caps.get(0) else { continue };
            let kind = VarType::parse(&caps["kind"]);
            let name = &caps["name"];

            raw.push_str(&regex::escape(&template[last..whole.start()]));
            raw.push_str(&format!("(?P<{name}>{})", kind.fragment()));
            types.insert(name.to_owned(), kind);
            last = whole.end();
        }
        raw.push_str(&regex::escape(&template[last..]));
        raw.push('$');

        let regex = Regex::new(&raw).map_err(|source| Error::InvalidTemplate {
            template: template.to_owned(),
            source,
        })?;

        Ok(Self { template: template.to_owned(), regex, types })
    }

    pub fn template(&self) -> &str { &self.template }

    /// The generated, anchored expression.
    pub fn as_regex(&self) -> &Regex { &self.regex }

    pub fn types(&self) -> &HashMap<String, VarType> { &self.types }

    pub fn var_type(&self, name: &str) -> Option<&VarType> {
        self.types.get(name)
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Named captures for `path`, or `None` when it does not match.
    pub fn captures<'p>(&self, path: &'p str) -> Option<Vec<(&str, &'p str)>> {
        let caps = self.regex.captures(path)?;
        let found = self.regex
            .capture_names()
            .flatten()
            .filter_map(|name| caps.name(name).map(|m| (name, m.as_str())))
            .collect();
        Some(found)
    }
}
