//! HTTP/1.1 response builder.
//!
//! Provides a fluent builder API for constructing HTTP responses and
//! serializing them to a byte buffer for transmission over TCP.

use bytes::{BufMut, BytesMut};
use serde::Serialize;
use tracing::error;

use super::{Headers, StatusCode};

/// An HTTP/1.1 response, ready to be serialized and sent.
///
/// # Examples
///
/// ```
/// use chat_relay::http::{Response, StatusCode};
///
/// let response = Response::new(StatusCode::OK).json(&serde_json::json!({ "result": "hi" }));
///
/// let bytes = response.into_bytes();
/// let text = std::str::from_utf8(&bytes).unwrap();
/// assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
/// assert!(text.contains("Content-Type: application/json\r\n"));
/// assert!(text.ends_with(r#"{"result":"hi"}"#));
/// ```
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Vec<u8>,
    keep_alive: bool,
}

impl Response {
    /// Creates a new response with the given status and an empty body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Vec::new(),
            keep_alive: true,
        }
    }

    /// Appends a response header. Multiple calls with the same name are additive.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the response body from a string.
    ///
    /// The `Content-Length` header is written automatically by [`into_bytes`](Self::into_bytes).
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into().into_bytes();
        self
    }

    /// Sets the response body from raw bytes.
    #[must_use]
    pub fn body_bytes(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Serializes `value` as the JSON body and sets `Content-Type: application/json`.
    ///
    /// A value that fails to serialize turns the response into a bodiless
    /// `500 Internal Server Error`.
    #[must_use]
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => {
                self.body = body;
                self.headers.insert("Content-Type", "application/json");
            }
            Err(e) => {
                error!(error = %e, "failed to serialize JSON response body");
                self.status = StatusCode::INTERNAL_SERVER_ERROR;
                self.body.clear();
            }
        }
        self
    }

    /// Controls whether the `Connection: keep-alive` or `Connection: close` header is written.
    #[must_use]
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Returns the status code of this response.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the headers set so far.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the body bytes.
    pub fn body_slice(&self) -> &[u8] {
        &self.body
    }

    /// Serializes the response into a `BytesMut` buffer using HTTP/1.1 wire format.
    ///
    /// Automatically adds:
    /// - `Content-Type: text/plain; charset=utf-8` if the body is non-empty and no
    ///   `Content-Type` header was set.
    /// - `Content-Length: <n>` (always written).
    /// - `Connection: keep-alive` or `Connection: close`.
    pub fn into_bytes(mut self) -> BytesMut {
        let content_length = self.body.len();

        if !self.body.is_empty() && !self.headers.contains("content-type") {
            self.headers
                .insert("Content-Type", "text/plain; charset=utf-8");
        }

        let connection = if self.keep_alive {
            "keep-alive"
        } else {
            "close"
        };
        self.headers.insert("Connection", connection);

        let estimated_size = 128 + self.headers.len() * 64 + content_length;
        let mut buf = BytesMut::with_capacity(estimated_size);

        // The reason phrase may be empty for codes we have no name for.
        buf.put(
            format!(
                "HTTP/1.1 {} {}\r\n",
                self.status.as_u16(),
                self.status.canonical_reason().unwrap_or("")
            )
            .as_bytes(),
        );

        buf.put(self.headers.to_string().as_bytes());
        buf.put(format!("Content-Length: {content_length}\r\n").as_bytes());
        buf.put(&b"\r\n"[..]);

        if !self.body.is_empty() {
            buf.put(self.body.as_slice());
        }

        buf
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(StatusCode::OK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_string(bytes: BytesMut) -> String {
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn simple_ok_response() {
        let r = Response::new(StatusCode::OK).body("Hello");
        let s = to_string(r.into_bytes());
        assert!(s.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(s.contains("Content-Type: text/plain; charset=utf-8\r\n"));
        assert!(s.contains("Content-Length: 5\r\n"));
        assert!(s.ends_with("\r\n\r\nHello"));
    }

    #[test]
    fn json_body_sets_content_type() {
        let r = Response::new(StatusCode::BAD_REQUEST)
            .json(&serde_json::json!({ "error": { "message": "nope" } }));
        assert_eq!(r.headers().get("content-type"), Some("application/json"));
        assert_eq!(r.body_slice(), br#"{"error":{"message":"nope"}}"#);
    }

    #[test]
    fn explicit_content_type_is_kept() {
        let r = Response::new(StatusCode::OK)
            .header("Content-Type", "text/html; charset=utf-8")
            .body("<p>hi</p>");
        let s = to_string(r.into_bytes());
        assert!(s.contains("Content-Type: text/html; charset=utf-8\r\n"));
        assert!(!s.contains("text/plain"));
    }

    #[test]
    fn no_body_no_content_type() {
        let r = Response::new(StatusCode::NO_CONTENT);
        let s = to_string(r.into_bytes());
        assert!(!s.contains("Content-Type"));
        assert!(s.contains("Content-Length: 0\r\n"));
    }

    #[test]
    fn unnamed_status_has_empty_reason() {
        let r = Response::new(StatusCode::from_u16(418).unwrap()).keep_alive(false);
        let s = to_string(r.into_bytes());
        assert!(s.starts_with("HTTP/1.1 418 \r\n"));
        assert!(s.contains("Connection: close\r\n"));
    }
}
