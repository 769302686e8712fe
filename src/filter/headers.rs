//! Folded request header view handed to header filters.

use std::collections::HashMap;

/// Request headers keyed by name, each with its ordered list of values.
///
/// Repeated headers are concatenated and every raw value is split on `,`, so
/// `x-forwarded-for: a, b` followed by `x-forwarded-for: c` yields `["a", " b", "c"]`.
/// Pseudo-headers such as `:path` are stored like any other name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestHeaders {
    values: HashMap<String, Vec<String>>,
}

impl RequestHeaders {
    /// Fold raw `(name, value)` pairs in encounter order.
    pub fn from_pairs<I, N, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: AsRef<str>,
    {
        let mut values: HashMap<String, Vec<String>> = HashMap::new();
        for (name, raw) in pairs {
            values
                .entry(name.into())
                .or_default()
                .extend(raw.as_ref().split(',').map(str::to_string));
        }
        Self { values }
    }

    /// All values for a header, or `None` when the header is absent.
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.values.get(name).map(Vec::as_slice)
    }

    /// The first value of a header.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| v.first()).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
