//! Multi-valued parameter mapping for query strings and form bodies.

use std::ops::Index;

/// Ordered mapping from a parameter name to every value given for it.
///
/// Keys keep first-seen order; values keep the order they appeared in.
/// `?tag=a&tag=b` yields `get("tag") == Some("a")` and
/// `get_list("tag") == Some(["a", "b"])`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryDict {
    data: Vec<(String, Vec<String>)>,
}

impl QueryDict {
    pub fn new() -> Self { Self::default() }

    /// Parses `application/x-www-form-urlencoded` text.
    ///
    /// `keep_blank` decides whether `name=` pairs are kept with an empty
    /// value or dropped entirely.
    pub fn parse(input: &[u8], keep_blank: bool) -> Self {
        let mut dict = Self::new();
        for (name, value) in url::form_urlencoded::parse(input) {
            if value.is_empty() && !keep_blank {
                continue;
            }
            dict.append(name.into_owned(), value.into_owned());
        }
        dict
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.data.iter().position(|(k, _)| k == name)
    }

    /// Adds `value` after any existing values for `name`.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        match self.position(&name) {
            Some(i) => self.data[i].1.push(value.into()),
            None => self.data.push((name, vec![value.into()])),
        }
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_list(name)?.first().map(String::as_str)
    }

    pub fn get_list(&self, name: &str) -> Option<&[String]> {
        self.position(name).map(|i| self.data[i].1.as_slice())
    }

    /// Replaces the first value for `name`, keeping the rest.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        match self.position(&name) {
            Some(i) => match self.data[i].1.first_mut() {
                Some(first) => *first = value.into(),
                None => self.data[i].1.push(value.into()),
            },
            None => self.data.push((name, vec![value.into()])),
        }
    }

    pub fn set_list(&mut self, name: impl Into<String>, values: Vec<String>) {
        let name = name.into();
        match self.position(&name) {
            Some(i) => self.data[i].1 = values,
            None => self.data.push((name, values)),
        }
    }

    pub fn contains(&self, name: &str) -> bool { self.position(name).is_some() }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.iter().map(|(k, _)| k.as_str())
    }

    /// `(name, first value)` pairs; a name with no values pairs with `""`.
    pub fn items(&self) -> impl Iterator<Item = (&str, &str)> {
        self.data.iter().map(|(k, v)| (k.as_str(), v.first().map_or("", String::as_str)))
    }

    pub fn len(&self) -> usize { self.data.len() }
    pub fn is_empty(&self) -> bool { self.data.is_empty() }
}

/// `dict["name"]` is the first value.
///
/// # Panics
///
/// Panics when `name` is absent or has no values. Use [`QueryDict::get`] for
/// the fallible form.
impl Index<&str> for QueryDict {
    type Output = str;

    fn index(&self, name: &str) -> &str {
        match self.get(name) {
            Some(v) => v,
            None => panic!("`{name}` not found"),
        }
    }
}
