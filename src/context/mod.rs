//! Per-request context handed to middleware and route handlers.

use crate::Request;

/// Per-request context wrapping the parsed [`Request`].
///
/// Middleware receives the context first and passes it down the chain; the
/// route handler at the end decodes the body with [`Context::json`].
pub struct Context {
    request: Request,
}

impl Context {
    /// Create a new context from a request
    pub fn new(request: Request) -> Self {
        Self { request }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Decodes the request body as JSON.
    pub fn json<T>(&self) -> Result<T, serde_json::Error>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_json::from_slice(self.request.body())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::parse_complete;

    #[derive(serde::Deserialize)]
    struct Body {
        prompt: String,
    }

    #[test]
    fn json_decodes_body() {
        let raw = b"POST /api/generate HTTP/1.1\r\nContent-Length: 15\r\n\r\n{\"prompt\":\"hi\"}";
        let ctx = Context::new(parse_complete(raw));
        let body: Body = ctx.json().unwrap();
        assert_eq!(body.prompt, "hi");
    }

    #[test]
    fn json_rejects_empty_body() {
        let ctx = Context::new(parse_complete(b"POST / HTTP/1.1\r\n\r\n"));
        assert!(ctx.json::<Body>().is_err());
    }
}
