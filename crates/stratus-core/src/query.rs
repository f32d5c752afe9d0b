//! Query-string helpers.
//!
//! [`QueryParams`] collects optional filter values into URL pairs, and
//! [`replace_query_param`] rewrites a single parameter in place, which is how offset-style
//! pagination advances between requests.

use std::fmt::Display;
use url::Url;

/// Builder for assembling query parameter pairs.
#[derive(Debug, Default, Clone)]
pub struct QueryParams {
    pairs: Vec<(&'static str, String)>,
}

impl QueryParams {
    /// Create a new, empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Append a key/value pair when the value is present.
    pub fn push_opt<T>(&mut self, key: &'static str, value: Option<T>)
    where
        T: ToString,
    {
        if let Some(value) = value {
            self.pairs.push((key, value.to_string()));
        }
    }

    /// Append a required key/value pair.
    pub fn push<T>(&mut self, key: &'static str, value: T)
    where
        T: Display,
    {
        self.pairs.push((key, value.to_string()));
    }

    /// Append one pair per value (e.g. repeated `tag_key` filters).
    pub fn push_all<I, T>(&mut self, key: &'static str, values: I)
    where
        I: IntoIterator<Item = T>,
        T: Display,
    {
        for value in values {
            self.pairs.push((key, value.to_string()));
        }
    }

    /// Return the collected key/value pairs.
    #[must_use]
    pub fn into_pairs(self) -> Vec<(&'static str, String)> {
        self.pairs
    }

    /// Returns true if no parameters have been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Append the collected pairs to `url`'s query string.
    pub fn apply_to(&self, url: &mut Url) {
        if self.pairs.is_empty() {
            return;
        }
        let mut query = url.query_pairs_mut();
        for (key, value) in &self.pairs {
            query.append_pair(key, value);
        }
    }
}

/// Return a copy of `url` with every `key` parameter replaced by a single `key=value`.
///
/// Other parameters keep their relative order.
#[must_use]
pub fn replace_query_param(url: &Url, key: &str, value: &str) -> Url {
    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != key)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut updated = url.clone();
    updated.set_query(None);
    {
        let mut query = updated.query_pairs_mut();
        for (k, v) in &retained {
            query.append_pair(k, v);
        }
        query.append_pair(key, value);
    }
    updated
}

/// Read a numeric query parameter, if present and well-formed.
#[must_use]
pub fn numeric_query_param(url: &Url, key: &str) -> Option<u64> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .and_then(|(_, v)| v.parse().ok())
}
