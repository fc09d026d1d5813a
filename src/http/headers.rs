//! HTTP header map with case-insensitive name lookup.
//!
//! HTTP headers are order-preserving and case-insensitive per [RFC 9110 §5].

use std::fmt;

/// A case-insensitive, multi-value HTTP header map.
///
/// Preserves insertion order and allows repeated names, matching the
/// semantics of HTTP/1.1 header fields.
///
/// # Examples
///
/// ```
/// use chat_relay::http::Headers;
///
/// let mut headers = Headers::new();
/// headers.insert("Content-Type", "application/json");
///
/// assert_eq!(headers.get("content-type"), Some("application/json"));
/// assert!(headers.contains("CONTENT-TYPE"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Headers {
    inner: Vec<(String, String)>,
}

impl Headers {
    /// Creates an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a header map with pre-allocated capacity for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Vec::with_capacity(capacity),
        }
    }

    /// Appends a header entry. Multiple values for the same name are preserved.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.push((name.into(), value.into()));
    }

    /// Returns the first value for the given header name (case-insensitive), or `None`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns `true` if the map contains at least one entry with the given name.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    /// Returns the total number of header entries (not unique names).
    pub(crate) fn len(&self) -> usize {
        self.inner.len()
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.inner {
            write!(f, "{name}: {value}\r\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_insensitive_get() {
        let mut h = Headers::new();
        h.insert("Content-Type", "application/json");
        assert_eq!(h.get("content-type"), Some("application/json"));
        assert_eq!(h.get("CONTENT-TYPE"), Some("application/json"));
    }

    #[test]
    fn first_value_wins() {
        let mut h = Headers::new();
        h.insert("Allow", "POST");
        h.insert("Allow", "GET");
        assert_eq!(h.get("allow"), Some("POST"));
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn display_is_wire_format() {
        let mut h = Headers::new();
        h.insert("Allow", "POST");
        assert_eq!(h.to_string(), "Allow: POST\r\n");
        assert!(!h.contains("x-missing"));
    }
}
