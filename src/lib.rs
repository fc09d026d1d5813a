//! # chat-relay
//!
//! A thin relay between a chat UI and an OpenAI-compatible chat-completion
//! API, served by a small async HTTP/1.1 server.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use chat_relay::llm::{ApiKey, OpenAiClient, DEFAULT_API_BASE};
//! use chat_relay::relay::{Relay, RelayConfig};
//! use chat_relay::server::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RelayConfig {
//!         api_key: std::env::var("OPENAI_API_KEY").ok().and_then(ApiKey::new),
//!         ..RelayConfig::default()
//!     };
//!     let relay = Relay::new(config, Arc::new(OpenAiClient::new(DEFAULT_API_BASE)?));
//!     let router = Arc::new(chat_relay::app::router(Arc::new(relay)));
//!
//!     let server = Server::bind("127.0.0.1:3000").await?;
//!     server.run(move |req| {
//!         let router = Arc::clone(&router);
//!         async move { router.route(req).await }
//!     }).await?;
//!     Ok(())
//! }
//! ```

// ── HTTP hosting ──────────────────────────────────────────────────────────────
pub mod context;
pub mod http;
pub mod middleware;
pub mod router;
pub mod server;

// ── Relay and its provider ────────────────────────────────────────────────────
pub mod app;
pub mod llm;
pub mod relay;

// ── Chat clients ──────────────────────────────────────────────────────────────
pub mod conversation;
pub mod ui;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use relay::{Relay, RelayConfig, RelayError};
pub use router::Router;
pub use server::{Server, ServerError};
