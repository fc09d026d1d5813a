//! HTTP/1.1 request parsing using the [`httparse`] crate.

use bytes::Bytes;
use thiserror::Error;

use super::{Headers, Method};

/// Errors that can occur while parsing an HTTP/1.1 request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request is incomplete: more data needed")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid Content-Length header: {value:?}")]
    InvalidContentLength { value: String },
}

/// A parsed HTTP/1.1 request.
///
/// [`Request::parse`] reads the request line and headers; the server attaches
/// the body with [`Request::set_body`] once `Content-Length` bytes have arrived.
///
/// # Examples
///
/// ```
/// use chat_relay::http::request::Request;
///
/// let raw = b"POST /api/generate HTTP/1.1\r\nHost: localhost\r\nContent-Length: 2\r\n\r\n{}";
/// let (request, offset) = Request::parse(raw).unwrap();
///
/// assert_eq!(request.method().as_str(), "POST");
/// assert_eq!(request.path(), "/api/generate");
/// assert_eq!(request.content_length().unwrap(), Some(2));
/// assert_eq!(&raw[offset..], b"{}");
/// ```
#[derive(Debug)]
pub struct Request {
    method: Method,
    path: String,
    /// HTTP minor version: 0 for HTTP/1.0, 1 for HTTP/1.1.
    version: u8,
    headers: Headers,
    body: Bytes,
}

impl Request {
    /// Maximum number of headers we support per request.
    const MAX_HEADERS: usize = 64;

    /// Parse the request line and headers from a byte slice.
    ///
    /// Returns the `Request` (with an empty body) and the byte offset at which
    /// the body begins in `buf`. Any query string is dropped from the path.
    ///
    /// # Errors
    ///
    /// - [`RequestError::Incomplete`]: the header block has not fully arrived.
    /// - [`RequestError::Parse`]: the data is malformed and cannot be parsed.
    /// - [`RequestError::MissingField`]: method, path, or version is absent.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), RequestError> {
        let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw_req = httparse::Request::new(&mut headers);

        let body_offset = match raw_req.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(RequestError::Incomplete),
        };

        let method: Method = match raw_req.method {
            Some(m) => match m.parse() {
                Ok(method) => method,
                Err(never) => match never {},
            },
            None => return Err(RequestError::MissingField { field: "method" }),
        };

        let raw_path = raw_req
            .path
            .ok_or(RequestError::MissingField { field: "path" })?;
        let path = match raw_path.split_once('?') {
            Some((path, _query)) => path.to_owned(),
            None => raw_path.to_owned(),
        };

        let version = raw_req
            .version
            .ok_or(RequestError::MissingField { field: "version" })?;

        let mut header_map = Headers::with_capacity(raw_req.headers.len());
        for header in raw_req.headers.iter() {
            if let Ok(value) = std::str::from_utf8(header.value) {
                header_map.insert(header.name, value);
            }
        }

        Ok((
            Self {
                method,
                path,
                version,
                headers: header_map,
                body: Bytes::new(),
            },
            body_offset,
        ))
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request path (without the query string).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the HTTP minor version number (0 = HTTP/1.0, 1 = HTTP/1.1).
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Returns the request headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the request body bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Attaches the body once it has been fully read off the wire.
    pub fn set_body(&mut self, body: Bytes) {
        self.body = body;
    }

    /// Returns `true` if the connection should be kept alive after this request.
    ///
    /// HTTP/1.1 defaults to keep-alive. HTTP/1.0 defaults to close unless
    /// `Connection: keep-alive` is explicitly set.
    pub fn is_keep_alive(&self) -> bool {
        match self.headers.get("connection") {
            Some(conn) => conn.eq_ignore_ascii_case("keep-alive"),
            None => self.version == 1,
        }
    }

    /// Returns the parsed `Content-Length`, or `None` when the header is absent.
    ///
    /// # Errors
    ///
    /// [`RequestError::InvalidContentLength`] if the header is not a decimal integer.
    pub fn content_length(&self) -> Result<Option<usize>, RequestError> {
        match self.headers.get("content-length") {
            None => Ok(None),
            Some(value) => value.trim().parse().map(Some).map_err(|_| {
                RequestError::InvalidContentLength {
                    value: value.to_owned(),
                }
            }),
        }
    }
}

/// Parses a complete raw request, body included. Test helper.
#[cfg(test)]
pub(crate) fn parse_complete(raw: &[u8]) -> Request {
    let (mut req, offset) = Request::parse(raw).unwrap();
    req.set_body(Bytes::copy_from_slice(&raw[offset..]));
    req
}
