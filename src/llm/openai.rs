use std::time::Duration;

use async_trait::async_trait;
use reqwest::header;
use tracing::debug;

use super::{ApiKey, ChatCompletion, ChatCompletionProvider, ChatRequest, ProviderError};

/// Public OpenAI endpoint; any OpenAI-compatible server can be substituted.
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const COMPLETIONS_PATH: &str = "/chat/completions";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for the OpenAI chat-completions API.
///
/// Only a connect timeout is set; a slow completion is waited on for as long
/// as the provider keeps the connection open.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    /// Full endpoint URL (base + COMPLETIONS_PATH).
    url: String,
}

impl OpenAiClient {
    /// Build a client targeting `api_base` (e.g. `https://api.openai.com/v1`).
    pub fn new(api_base: impl AsRef<str>) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Transport(Box::new(e)))?;
        let url = format!(
            "{}{COMPLETIONS_PATH}",
            api_base.as_ref().trim_end_matches('/')
        );
        Ok(Self { client, url })
    }

    /// The endpoint requests are posted to.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ChatCompletionProvider for OpenAiClient {
    async fn create_chat_completion(
        &self,
        api_key: &ApiKey,
        request: &ChatRequest,
    ) -> Result<ChatCompletion, ProviderError> {
        debug!(url = %self.url, model = %request.model, "calling chat completion API");

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(api_key.expose())
            .json(request)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(Box::new(e)))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response
            .bytes()
            .await
            .map_err(|e| ProviderError::Transport(Box::new(e)))?;

        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                content_type,
                body,
            });
        }

        Ok(serde_json::from_slice(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_base_and_path() {
        let client = OpenAiClient::new("https://api.openai.com/v1/").unwrap();
        assert_eq!(client.url(), "https://api.openai.com/v1/chat/completions");

        let local = OpenAiClient::new("http://localhost:1234/v1").unwrap();
        assert_eq!(local.url(), "http://localhost:1234/v1/chat/completions");
    }
}
