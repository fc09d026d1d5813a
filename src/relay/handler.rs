//! `POST /api/generate`: the HTTP face of [`Relay::generate`].

use std::sync::Arc;

use tracing::debug;

use super::{GenerateRequest, GenerateResponse, Relay};
use crate::context::Context;
use crate::http::{Response, StatusCode};

/// Decodes `{ "prompt": ... }`, relays it, and renders the outcome.
///
/// A body that is not JSON, or whose `prompt` is missing or not a string, is
/// relayed as an empty prompt; the relay then reports the credential or
/// validation failure in its usual order.
pub async fn generate(relay: Arc<Relay>, ctx: Context) -> Response {
    let prompt = match ctx.json::<GenerateRequest>() {
        Ok(body) => body.prompt.unwrap_or_default(),
        Err(e) => {
            debug!(error = %e, "undecodable generate body, treating prompt as empty");
            String::new()
        }
    };

    match relay.generate(&prompt).await {
        Ok(result) => Response::new(StatusCode::OK).json(&GenerateResponse { result }),
        Err(e) => e.into_response(),
    }
}
