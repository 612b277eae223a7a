//! Byte accounting for HTTP-style requests.
//!
//! A request occupies the sum of its method token, its absolute URL, every
//! header rendered as `name: value\r\n`, and its serialized JSON body. The
//! model is deliberately independent of any HTTP client so that sizes can be
//! computed before a request ever leaves the process.

use std::fmt;

use serde_json::{Map, Value};

use crate::error::Result;

/// Declared body parameters of a request, as a JSON object.
///
/// Backed by `serde_json::Map`, whose key order is stable for a given input,
/// so repeated serializations of the same parameters have the same length.
pub type Parameters = Map<String, Value>;

/// Request method token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    /// The uppercase token as sent on the wire.
    pub const fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single header line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Length of `name: value\r\n` in bytes.
    pub fn wire_len(&self) -> usize {
        self.name.len() + 2 + self.value.len() + 2
    }
}

/// Method, absolute URL and headers of a request: everything except the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFrame {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<Header>,
}

impl RequestFrame {
    /// Create a frame for `path` under `base_url`, with no headers.
    pub fn new(method: HttpMethod, base_url: &str, path: &str) -> Self {
        Self {
            method,
            url: join_url(base_url, path),
            headers: Vec::new(),
        }
    }

    /// Append a header.
    pub fn with_header(mut self, header: Header) -> Self {
        self.headers.push(header);
        self
    }

    /// Append several headers, preserving their order.
    pub fn with_headers(mut self, headers: impl IntoIterator<Item = Header>) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Look up the first header with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// Bytes taken by the method, URL and headers.
    pub fn framing_size(&self) -> usize {
        self.method.as_str().len()
            + self.url.len()
            + self.headers.iter().map(Header::wire_len).sum::<usize>()
    }
}

/// Join a base URL and a path with exactly one `/` between them.
pub fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Serialize parameters to their JSON body bytes.
pub fn json_bytes(parameters: &Parameters) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(parameters)?)
}

/// Size in bytes of `frame` carrying `parameters` as its body, without padding.
pub fn compute_base_size(frame: &RequestFrame, parameters: &Parameters) -> Result<usize> {
    Ok(frame.framing_size() + json_bytes(parameters)?.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame() -> RequestFrame {
        RequestFrame::new(HttpMethod::Post, "https://example.org/", "/v1/check")
            .with_header(Header::new("A", "b"))
    }

    #[test]
    fn test_join_url_single_separator() {
        assert_eq!(join_url("https://x.org/", "/p"), "https://x.org/p");
        assert_eq!(join_url("https://x.org", "p"), "https://x.org/p");
    }

    #[test]
    fn test_header_wire_len() {
        // "A: b\r\n"
        assert_eq!(Header::new("A", "b").wire_len(), 6);
    }

    #[test]
    fn test_framing_size() {
        // POST + https://example.org/v1/check + "A: b\r\n"
        assert_eq!(frame().framing_size(), 4 + 28 + 6);
    }

    #[test]
    fn test_base_size_counts_empty_object() {
        let params = Parameters::new();
        assert_eq!(compute_base_size(&frame(), &params).unwrap(), 38 + 2);
    }

    #[test]
    fn test_base_size_counts_utf8_bytes() {
        let mut params = Parameters::new();
        params.insert("p".into(), json!("è"));
        // {"p":"è"} is 10 bytes: è is two bytes in UTF-8
        assert_eq!(compute_base_size(&frame(), &params).unwrap(), 38 + 10);
    }

    #[test]
    fn test_base_size_is_stable() {
        let mut params = Parameters::new();
        params.insert("zeta".into(), json!([1, 2, 3]));
        params.insert("alpha".into(), json!({"nested": true}));
        let a = compute_base_size(&frame(), &params).unwrap();
        let b = compute_base_size(&frame(), &params.clone()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        assert_eq!(frame().header("a"), Some("b"));
        assert_eq!(frame().header("missing"), None);
    }
}
