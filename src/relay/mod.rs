//! The relay: validates a prompt, asks the completion provider once, and
//! normalizes the outcome into a result or a typed [`RelayError`].
//!
//! | Outcome                         | Status        | Body sent to the client            |
//! |---------------------------------|---------------|------------------------------------|
//! | first candidate's text          | `200`         | `{"result": <text>}`               |
//! | no credential configured        | `500`         | [`CONFIGURATION_MESSAGE`]          |
//! | empty / whitespace-only prompt  | `400`         | [`VALIDATION_MESSAGE`]             |
//! | provider non-success answer     | provider's    | provider's body, unchanged         |
//! | no candidates / transport fault | `500`         | [`GENERIC_FAILURE_MESSAGE`]        |

use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

use crate::http::{Response, StatusCode};
use crate::llm::{ApiKey, ChatCompletionProvider, ChatMessage, ChatRequest, ProviderError};

pub mod handler;

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

pub const CONFIGURATION_MESSAGE: &str =
    "OpenAI API key not configured, please follow instructions in README.md";
pub const VALIDATION_MESSAGE: &str = "Please enter a valid prompt";
pub const GENERIC_FAILURE_MESSAGE: &str = "An error occurred during your request.";

/// Settings injected into the relay at construction.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// `None` leaves the relay running but answering every request with a
    /// configuration error.
    pub api_key: Option<ApiKey>,
    pub model: String,
    pub system_prompt: String,
    /// `0.0` asks the provider for deterministic sampling.
    pub temperature: f32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_owned(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_owned(),
            temperature: 0.0,
        }
    }
}

/// Body of `POST /api/generate`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

/// Success body of `POST /api/generate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub result: String,
}

/// Error body produced by the relay itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorMessage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub message: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: ErrorMessage {
                message: message.into(),
            },
        }
    }
}

/// Why a single `generate` call failed. Every variant is terminal for that call.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("OpenAI API key not configured, please follow instructions in README.md")]
    Configuration,

    #[error("Please enter a valid prompt")]
    Validation,

    /// The provider answered with an error; forwarded to the client verbatim.
    #[error("provider rejected the request with status {status}")]
    UpstreamStructured {
        status: u16,
        content_type: Option<String>,
        body: Bytes,
    },

    #[error("provider returned no completion candidates")]
    UpstreamEmptyResponse,

    #[error("provider unavailable: {0}")]
    UpstreamUnavailable(#[source] ProviderError),
}

impl RelayError {
    /// HTTP status this failure maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation => StatusCode::BAD_REQUEST,
            Self::UpstreamStructured { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Self::Configuration | Self::UpstreamEmptyResponse | Self::UpstreamUnavailable(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// The only text about this failure allowed to reach the client.
    pub fn client_message(&self) -> &'static str {
        match self {
            Self::Configuration => CONFIGURATION_MESSAGE,
            Self::Validation => VALIDATION_MESSAGE,
            Self::UpstreamStructured { .. }
            | Self::UpstreamEmptyResponse
            | Self::UpstreamUnavailable(_) => GENERIC_FAILURE_MESSAGE,
        }
    }

    pub fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Self::UpstreamStructured {
                content_type, body, ..
            } => Response::new(status)
                .header(
                    "Content-Type",
                    content_type.unwrap_or_else(|| "application/json".to_owned()),
                )
                .body_bytes(body.to_vec()),
            other => Response::new(status).json(&ErrorBody::new(other.client_message())),
        }
    }
}

/// Stateless prompt relay. Cheap to share behind an [`Arc`].
pub struct Relay {
    config: RelayConfig,
    provider: Arc<dyn ChatCompletionProvider>,
}

impl Relay {
    pub fn new(config: RelayConfig, provider: Arc<dyn ChatCompletionProvider>) -> Self {
        Self { config, provider }
    }

    /// Relays `prompt` to the provider and returns the first candidate's text unchanged.
    ///
    /// The credential is checked before the prompt, and neither failure
    /// reaches the provider. Otherwise exactly one provider call is made.
    pub async fn generate(&self, prompt: &str) -> Result<String, RelayError> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or(RelayError::Configuration)?;

        if prompt.trim().is_empty() {
            return Err(RelayError::Validation);
        }

        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage::system(self.config.system_prompt.as_str()),
                ChatMessage::user(prompt),
            ],
            temperature: self.config.temperature,
        };

        match self.provider.create_chat_completion(api_key, &request).await {
            Ok(completion) => {
                let text = completion.into_first_text().ok_or_else(|| {
                    error!(model = %request.model, "provider returned no completion candidates");
                    RelayError::UpstreamEmptyResponse
                })?;
                debug!(chars = text.len(), "completion relayed");
                Ok(text)
            }
            Err(ProviderError::Status {
                status,
                content_type,
                body,
            }) => {
                error!(
                    status,
                    body = %String::from_utf8_lossy(&body),
                    "provider rejected completion request"
                );
                Err(RelayError::UpstreamStructured {
                    status,
                    content_type,
                    body,
                })
            }
            Err(e) => {
                error!(error = %e, "error with provider request");
                Err(RelayError::UpstreamUnavailable(e))
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::llm::{ApiKey, ChatCompletion, ChatCompletionProvider, ChatRequest, ProviderError};

    type Script = Box<dyn Fn() -> Result<ChatCompletion, ProviderError> + Send + Sync>;

    /// Provider fake that records every call and answers from a script.
    pub(crate) struct ScriptedProvider {
        calls: AtomicUsize,
        requests: Mutex<Vec<ChatRequest>>,
        script: Script,
    }

    impl ScriptedProvider {
        pub(crate) fn new(
            script: impl Fn() -> Result<ChatCompletion, ProviderError> + Send + Sync + 'static,
        ) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
                script: Box::new(script),
            }
        }

        pub(crate) fn replying(text: &'static str) -> Self {
            Self::new(move || Ok(completion(&[text])))
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub(crate) fn last_request(&self) -> Option<ChatRequest> {
            self.requests.lock().unwrap().last().cloned()
        }
    }

    pub(crate) fn completion(texts: &[&str]) -> ChatCompletion {
        let choices: Vec<serde_json::Value> = texts
            .iter()
            .map(|t| serde_json::json!({ "message": { "role": "assistant", "content": t } }))
            .collect();
        serde_json::from_value(serde_json::json!({ "choices": choices })).unwrap()
    }

    #[async_trait]
    impl ChatCompletionProvider for ScriptedProvider {
        async fn create_chat_completion(
            &self,
            _api_key: &ApiKey,
            request: &ChatRequest,
        ) -> Result<ChatCompletion, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            (self.script)()
        }
    }
}
