//! Header fields, in wire order.
//!
//! One type serves both directions. The decoder [`append`](Headers::append)s
//! every field line it reads, with names already lowercased, so repeated
//! fields survive and can be read back folded with
//! [`get_joined`](Headers::get_joined). The encoder stages fields with
//! [`set`](Headers::set): a later write under the same name replaces the
//! earlier value in place.
//!
//! Lookups ignore ASCII case; `set` does not, so `X-Mode` and `x-mode` are two
//! fields if a handler writes both.

use std::borrow::Cow;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Field {
    name: String,
    value: String,
}

impl Field {
    fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Ordered header fields.
///
/// # Examples
///
/// ```
/// use hasty::http::Headers;
///
/// let mut headers = Headers::new();
/// headers.append("accept", "text/html");
/// headers.append("accept", "application/json");
///
/// assert_eq!(headers.get("Accept"), Some("text/html"));
/// assert_eq!(
///     headers.get_joined("accept").as_deref(),
///     Some("text/html, application/json")
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<Field>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    /// Adds a field after the existing ones, keeping earlier fields of the
    /// same name.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push(Field {
            name: name.into(),
            value: value.into(),
        });
    }

    /// Stages `name: value`, replacing a field with exactly this name.
    ///
    /// The first such field keeps its position and takes the value; any
    /// further duplicates are dropped. Unknown names go to the end.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        let Some(first) = self.fields.iter().position(|f| f.name == name) else {
            self.fields.push(Field { name, value });
            return;
        };

        self.fields[first].value = value;
        let mut index = 0;
        self.fields.retain(|f| {
            let keep = index <= first || f.name != name;
            index += 1;
            keep
        });
    }

    /// The first value under `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.is(name))
            .map(|f| f.value.as_str())
    }

    /// Every value under `name` folded into one with `", "`.
    ///
    /// Borrows when the field occurs once.
    pub fn get_joined(&self, name: &str) -> Option<Cow<'_, str>> {
        let mut values = self
            .fields
            .iter()
            .filter(|f| f.is(name))
            .map(|f| f.value.as_str());
        let first = values.next()?;
        let Some(second) = values.next() else {
            return Some(Cow::Borrowed(first));
        };

        let mut folded = String::with_capacity(first.len() + second.len() + 2);
        folded.push_str(first);
        for value in std::iter::once(second).chain(values) {
            folded.push_str(", ");
            folded.push_str(value);
        }
        Some(Cow::Owned(folded))
    }

    /// Every value under `name`, in wire order. Borrows `self` only.
    pub fn get_all<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> + use<'a> {
        let name = name.to_owned();
        self.fields
            .iter()
            .filter(move |f| f.is(&name))
            .map(|f| f.value.as_str())
    }

    /// Drops every field under `name`; `false` if there was none.
    pub fn remove(&mut self, name: &str) -> bool {
        let count = self.fields.len();
        self.fields.retain(|f| !f.is(name));
        self.fields.len() != count
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.is(name))
    }

    /// Number of field lines, counting repeats.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|f| (f.name.as_str(), f.value.as_str()))
    }
}

/// Renders the fields as `Name: value\r\n` lines.
impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fields
            .iter()
            .try_for_each(|field| write!(f, "{}: {}\r\n", field.name, field.value))
    }
}
