//! The browser chat page served at `GET /`.
//!
//! A single self-contained HTML document; the transcript lives in page memory
//! and is gone on reload.

use crate::context::Context;
use crate::http::{Response, StatusCode};

pub const INDEX_HTML: &str = include_str!("index.html");

pub async fn index(_ctx: Context) -> Response {
    Response::new(StatusCode::OK)
        .header("Content-Type", "text/html; charset=utf-8")
        .header("Cache-Control", "no-store")
        .body(INDEX_HTML)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_posts_to_generate_endpoint() {
        assert!(INDEX_HTML.contains(r#"fetch("/api/generate""#));
        assert!(INDEX_HTML.contains("user-message"));
        assert!(INDEX_HTML.contains("assistant-message"));
    }

    #[test]
    fn hidden_page_only_drops_stale_replies() {
        // pagehide bumps the session; a page restored from bfcache keeps accepting input.
        assert!(INDEX_HTML.contains("state.session += 1"));
        assert!(INDEX_HTML.contains("if (session === state.session)"));
        assert!(!INDEX_HTML.contains("state.active"));

        let append = INDEX_HTML
            .split("function append(message) {")
            .nth(1)
            .and_then(|rest| rest.split('}').next())
            .unwrap();
        assert!(!append.contains("session"));
    }
}
