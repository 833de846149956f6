//! Query-string and form-body parsing.
//!
//! `application/x-www-form-urlencoded` bodies use the same grammar as the query
//! component of a URL, so both go through [`Query::parse`].

use std::borrow::Cow;
use std::string::FromUtf8Error;

use serde::ser::{Serialize, SerializeMap, Serializer};

/// An ordered `key → value` mapping decoded from `a=1&b=2`.
///
/// Keys keep the position of their first appearance; a repeated key
/// overwrites the earlier value.
///
/// # Examples
///
/// ```
/// use hasty::http::Query;
///
/// let q = Query::parse("q=rust+lang&page=2&flag&page=3");
/// assert_eq!(q.get("q"), Some("rust lang"));
/// assert_eq!(q.get("flag"), Some(""));
/// assert_eq!(q.get("page"), Some("3"));
/// assert_eq!(q.keys().collect::<Vec<_>>(), vec!["q", "page", "flag"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pairs: Vec<(String, String)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `key=value` pairs separated by `&`.
    ///
    /// Only the first `=` splits a pair; a key without `=` maps to `""`; pairs
    /// with an empty key are dropped. Both sides are percent-decoded with `+`
    /// read as a space.
    pub fn parse(raw: &str) -> Self {
        let mut query = Self::new();
        for pair in raw.split('&') {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            if key.is_empty() {
                continue;
            }
            query.insert(decode_component(key), decode_component(value));
        }
        query
    }

    /// Inserts or overwrites `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.pairs.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(k, _)| k.as_str())
    }

    /// Iterates `(key, value)` pairs in first-appearance order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Query {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut query = Self::new();
        for (k, v) in iter {
            query.insert(k, v);
        }
        query
    }
}

impl Serialize for Query {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.pairs.len()))?;
        for (k, v) in &self.pairs {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Strict percent-decoding (no `+` translation) for path text.
///
/// Malformed `%` escapes pass through untouched; only a decoded byte sequence
/// that is not UTF-8 is an error.
pub fn percent_decode(raw: &str) -> Result<Cow<'_, str>, FromUtf8Error> {
    urlencoding::decode(raw)
}

// Form-style decoding for query keys and values. Falls back to the raw text
// when the escapes do not decode to UTF-8.
fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input() {
        assert!(Query::parse("").is_empty());
        assert!(Query::parse("&&").is_empty());
    }

    #[test]
    fn key_without_equals_maps_to_empty() {
        let q = Query::parse("debug&verbose=");
        assert_eq!(q.get("debug"), Some(""));
        assert_eq!(q.get("verbose"), Some(""));
    }

    #[test]
    fn only_first_equals_splits() {
        let q = Query::parse("expr=a=b");
        assert_eq!(q.get("expr"), Some("a=b"));
    }

    #[test]
    fn empty_keys_are_dropped() {
        let q = Query::parse("=orphan&k=v");
        assert_eq!(q.len(), 1);
        assert_eq!(q.get("k"), Some("v"));
    }

    #[test]
    fn percent_and_plus_decoding() {
        let q = Query::parse("name=J%C3%BCrgen+M&city=New%20York&sum=1%2B1");
        assert_eq!(q.get("name"), Some("Jürgen M"));
        assert_eq!(q.get("city"), Some("New York"));
        assert_eq!(q.get("sum"), Some("1+1"));
    }

    #[test]
    fn invalid_utf8_escape_keeps_raw_text() {
        let q = Query::parse("bad=%FF");
        assert_eq!(q.get("bad"), Some("%FF"));
    }

    #[test]
    fn duplicate_key_overwrites_in_place() {
        let q = Query::parse("a=1&b=2&a=3");
        assert_eq!(q.iter().collect::<Vec<_>>(), vec![("a", "3"), ("b", "2")]);
    }

    #[test]
    fn serializes_as_json_object() {
        let q = Query::parse("x=1&y=two");
        assert_eq!(serde_json::to_string(&q).unwrap(), r#"{"x":"1","y":"two"}"#);
    }

    #[test]
    fn strict_path_decoding() {
        assert_eq!(percent_decode("/a%20b").unwrap(), "/a b");
        assert_eq!(percent_decode("/a+b").unwrap(), "/a+b");
        assert!(percent_decode("/%C3%28").is_err());
    }
}
