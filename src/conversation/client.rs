//! Talking to a running relay over HTTP.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::app::GENERATE_PATH;
use crate::relay::{ErrorMessage, GenerateRequest};

/// Why one exchange with the relay produced no reply.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("relay request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("relay answered {status}: {message}")]
    Status { status: u16, message: String },

    #[error("relay reply carried no result")]
    MissingResult,

    #[error("malformed relay reply: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Sends one prompt to the relay and waits for its answer.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ClientError>;
}

/// [`RelayTransport`] over HTTP to `<base>/api/generate`.
#[derive(Debug, Clone)]
pub struct RelayClient {
    client: reqwest::Client,
    url: String,
}

#[derive(Deserialize)]
struct Reply {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<ErrorMessage>,
}

impl RelayClient {
    /// `base_url` is the relay root, e.g. `http://127.0.0.1:3000`.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().build()?;
        let url = format!("{}{GENERATE_PATH}", base_url.as_ref().trim_end_matches('/'));
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RelayTransport for RelayClient {
    async fn generate(&self, prompt: &str) -> Result<String, ClientError> {
        let response = self
            .client
            .post(&self.url)
            .json(&GenerateRequest {
                prompt: Some(prompt.to_owned()),
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<Reply>(&body)
                .ok()
                .and_then(|reply| reply.error)
                .map(|error| error.message)
                .unwrap_or_else(|| String::from_utf8_lossy(&body).into_owned());
            return Err(ClientError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let reply: Reply = serde_json::from_slice(&body)?;
        reply.result.ok_or(ClientError::MissingResult)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_targets_generate_endpoint() {
        let client = RelayClient::new("http://127.0.0.1:3000/").unwrap();
        assert_eq!(client.url(), "http://127.0.0.1:3000/api/generate");
    }
}
