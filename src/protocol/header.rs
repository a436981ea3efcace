//! Message headers.
//!
//! A [`HeaderMap`] maps exact, case-sensitive names to an ordered list of
//! values. `insert` replaces, `append` accumulates.
//!
//! # Example
//!
//! ```
//! use subject_mux::protocol::{HeaderMap, STATUS};
//!
//! let mut headers = HeaderMap::new();
//! headers.insert(STATUS, "200");
//! headers.append("Trace", "a");
//! headers.append("Trace", "b");
//!
//! assert_eq!(headers.get(STATUS), Some("200"));
//! assert_eq!(headers.get_all("Trace"), ["a", "b"]);
//! ```

use std::collections::HashMap;

/// Reply header carrying the decimal status code.
pub const STATUS: &str = "Status";

/// Reply header carrying the human readable status description.
pub const DESCRIPTION: &str = "Description";

/// Header name → ordered values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    inner: HashMap<String, Vec<String>>,
}

impl HeaderMap {
    /// Create an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name` to a single value, replacing any previous values.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.insert(name.into(), vec![value.into()]);
    }

    /// Add a value to `name`, keeping existing values.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner
            .entry(name.into())
            .or_default()
            .push(value.into());
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// All values for `name`, in insertion order.
    pub fn get_all(&self, name: &str) -> &[String] {
        self.inner.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Remove `name`, returning its values.
    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        self.inner.remove(name)
    }

    #[inline]
    pub fn contains_key(&self, name: &str) -> bool {
        self.inner.contains_key(name)
    }

    /// Number of distinct header names.
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Iterate over `(name, values)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.inner
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }
}

impl<K, V> FromIterator<(K, V)> for HeaderMap
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = HeaderMap::new();
        for (name, value) in iter {
            headers.append(name, value);
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_replaces() {
        let mut headers = HeaderMap::new();
        headers.append("X-Key", "one");
        headers.append("X-Key", "two");
        headers.insert("X-Key", "three");

        assert_eq!(headers.get_all("X-Key"), ["three"]);
    }

    #[test]
    fn test_append_keeps_order() {
        let mut headers = HeaderMap::new();
        headers.append("Via", "a");
        headers.append("Via", "b");
        headers.append("Via", "c");

        assert_eq!(headers.get("Via"), Some("a"));
        assert_eq!(headers.get_all("Via"), ["a", "b", "c"]);
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let mut headers = HeaderMap::new();
        headers.insert(STATUS, "200");

        assert!(headers.contains_key("Status"));
        assert!(!headers.contains_key("status"));
        assert_eq!(headers.get("STATUS"), None);
    }

    #[test]
    fn test_missing_key() {
        let headers = HeaderMap::new();

        assert!(headers.is_empty());
        assert_eq!(headers.get("nope"), None);
        assert!(headers.get_all("nope").is_empty());
    }

    #[test]
    fn test_remove() {
        let mut headers = HeaderMap::new();
        headers.insert(DESCRIPTION, "gone");

        assert_eq!(headers.remove(DESCRIPTION), Some(vec!["gone".to_string()]));
        assert!(!headers.contains_key(DESCRIPTION));
    }

    #[test]
    fn test_from_iter() {
        let headers: HeaderMap = [("A", "1"), ("B", "2"), ("A", "3")].into_iter().collect();

        assert_eq!(headers.get_all("A"), ["1", "3"]);
        assert_eq!(headers.get("B"), Some("2"));
    }
}
