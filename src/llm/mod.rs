//! LLM integration: the outbound chat-completion capability.
//!
//! The relay only ever talks to a provider through [`ChatCompletionProvider`].
//! [`OpenAiClient`] implements it against the OpenAI
//! `POST /chat/completions` wire format; tests substitute in-memory fakes.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod openai;

pub use openai::{DEFAULT_API_BASE, OpenAiClient};

/// A provider credential.
///
/// `Debug` is redacted so the key never lands in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wraps a credential, treating an empty or whitespace-only value as absent.
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            None
        } else {
            Some(Self(key))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// Author of a chat message on the provider wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One message in a chat-completion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Body of an outbound chat-completion call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
}

/// A provider's answer. Fields the relay does not read are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatCompletion {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChoiceMessage {
    /// Absent or `null` when the model produced no text (e.g. a tool call).
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletion {
    /// Text of the first candidate, if there is one and it carries content.
    pub fn first_text(&self) -> Option<&str> {
        self.choices.first()?.message.content.as_deref()
    }

    /// Consuming variant of [`first_text`](Self::first_text).
    pub fn into_first_text(self) -> Option<String> {
        self.choices.into_iter().next()?.message.content
    }
}

/// Failure of a provider call.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider answered, but with a non-success status.
    #[error("provider responded with status {status}")]
    Status {
        status: u16,
        content_type: Option<String>,
        body: Bytes,
    },

    /// The request never produced a response (DNS, connect, TLS, timeout, ...).
    #[error("provider request failed: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A success response whose body is not a chat completion.
    #[error("malformed provider response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// The chat-completion capability consumed by the relay.
#[async_trait]
pub trait ChatCompletionProvider: Send + Sync {
    /// Issue exactly one completion call authenticated with `api_key`.
    async fn create_chat_completion(
        &self,
        api_key: &ApiKey,
        request: &ChatRequest,
    ) -> Result<ChatCompletion, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_treats_blank_as_absent() {
        assert!(ApiKey::new("").is_none());
        assert!(ApiKey::new("   ").is_none());
        assert_eq!(ApiKey::new("sk-test").unwrap().expose(), "sk-test");
    }

    #[test]
    fn api_key_debug_is_redacted() {
        let key = ApiKey::new("sk-secret").unwrap();
        assert!(!format!("{key:?}").contains("sk-secret"));
    }

    #[test]
    fn request_serializes_to_openai_shape() {
        let request = ChatRequest {
            model: "gpt-3.5-turbo".to_owned(),
            messages: vec![
                ChatMessage::system("You are a helpful assistant."),
                ChatMessage::user("hello"),
            ],
            temperature: 0.0,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "model": "gpt-3.5-turbo",
                "messages": [
                    { "role": "system", "content": "You are a helpful assistant." },
                    { "role": "user", "content": "hello" }
                ],
                "temperature": 0.0
            })
        );
    }

    #[test]
    fn completion_first_text() {
        let completion: ChatCompletion = serde_json::from_str(
            r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"hi"}},
                {"index":1,"message":{"role":"assistant","content":"second"}}]}"#,
        )
        .unwrap();
        assert_eq!(completion.first_text(), Some("hi"));
        assert_eq!(completion.into_first_text().as_deref(), Some("hi"));
    }

    #[test]
    fn completion_without_choices() {
        let empty: ChatCompletion = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert_eq!(empty.first_text(), None);

        let missing: ChatCompletion = serde_json::from_str(r#"{"object":"chat.completion"}"#).unwrap();
        assert!(missing.choices.is_empty());

        let null_content: ChatCompletion =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert_eq!(null_content.first_text(), None);
    }
}
