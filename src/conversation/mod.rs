//! Conversation state holder for chat clients.
//!
//! A [`Conversation`] owns the [`Transcript`] of one session. Submitting a
//! message appends it immediately and starts an exchange with the relay on its
//! own task; the outcome comes back over a channel and is applied by
//! [`Conversation::next_reply`]. Replies are appended in the order they
//! resolve, which can differ from the order prompts were sent.
//!
//! ```text
//! Idle ──submit──▶ AwaitingReply ──reply ok──▶ Idle (+ assistant message)
//!                                └─reply err─▶ Idle (nothing appended, logged)
//! ```

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

mod client;
mod terminal;

pub use client::{ClientError, RelayClient, RelayTransport};
pub use terminal::run_terminal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Self::User => "you",
            Self::Assistant => "assistant",
        }
    }
}

/// One transcript entry. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    role: Role,
    text: String,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Renders one message as a terminal block: a role label, then the text.
pub fn render_block(message: &Message) -> String {
    format!("{}> {}", message.role.label(), message.text)
}

/// Append-only, ordered list of messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Every block in order, one per line. Depends on nothing but the messages.
    pub fn render(&self) -> String {
        self.messages
            .iter()
            .map(render_block)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Identifies one submitted prompt within a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExchangeId(u64);

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Outcome of one exchange, delivered back to the conversation.
#[derive(Debug)]
pub struct Reply {
    pub id: ExchangeId,
    pub outcome: Result<String, ClientError>,
}

/// What applying a [`Reply`] did to the conversation.
#[derive(Debug)]
pub enum Update {
    /// The assistant message now at the end of the transcript.
    Appended(Message),
    /// The exchange failed; the transcript is unchanged.
    Failed { id: ExchangeId, error: ClientError },
    /// The session was closed before the reply arrived.
    Discarded(ExchangeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    AwaitingReply { pending: usize },
}

/// A single chat session against a relay.
pub struct Conversation {
    transcript: Transcript,
    transport: Arc<dyn RelayTransport>,
    replies_tx: mpsc::UnboundedSender<Reply>,
    replies_rx: mpsc::UnboundedReceiver<Reply>,
    next_id: u64,
    pending: usize,
    active: bool,
}

impl Conversation {
    pub fn new(transport: Arc<dyn RelayTransport>) -> Self {
        let (replies_tx, replies_rx) = mpsc::unbounded_channel();
        Self {
            transcript: Transcript::new(),
            transport,
            replies_tx,
            replies_rx,
            next_id: 0,
            pending: 0,
            active: true,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn phase(&self) -> Phase {
        match self.pending {
            0 => Phase::Idle,
            pending => Phase::AwaitingReply { pending },
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Appends `text` as a user message and starts relaying it.
    ///
    /// Empty text is appended and sent like any other; the relay decides
    /// whether it is a valid prompt. Must be called within a Tokio runtime.
    pub fn submit(&mut self, text: impl Into<String>) -> ExchangeId {
        let text = text.into();
        let id = ExchangeId(self.next_id);
        self.next_id += 1;
        self.pending += 1;
        self.transcript.push(Message::user(text.as_str()));

        let transport = Arc::clone(&self.transport);
        let replies = self.replies_tx.clone();
        tokio::spawn(async move {
            let outcome = transport.generate(&text).await;
            // The conversation may already be gone; nobody is left to tell.
            let _ = replies.send(Reply { id, outcome });
        });

        debug!(exchange = %id, "prompt submitted");
        id
    }

    /// Waits for the next outstanding exchange and applies it.
    ///
    /// Returns `None` immediately when nothing is outstanding.
    pub async fn next_reply(&mut self) -> Option<Update> {
        if self.pending == 0 {
            return None;
        }
        let reply = self.replies_rx.recv().await?;
        Some(self.apply(reply))
    }

    /// Applies one exchange outcome to the session.
    pub fn apply(&mut self, reply: Reply) -> Update {
        self.pending = self.pending.saturating_sub(1);

        if !self.active {
            debug!(exchange = %reply.id, "discarding reply for closed session");
            return Update::Discarded(reply.id);
        }

        match reply.outcome {
            Ok(text) => {
                let message = Message::assistant(text);
                self.transcript.push(message.clone());
                Update::Appended(message)
            }
            Err(error) => {
                warn!(exchange = %reply.id, error = %error, "relay exchange failed");
                Update::Failed {
                    id: reply.id,
                    error,
                }
            }
        }
    }

    /// Ends the session. Replies still in flight will be discarded.
    pub fn close(&mut self) {
        self.active = false;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;

    /// Answers like a keyed relay: echoes prompts, rejects blank ones.
    /// A prompt starting with `slow` takes longer than the others.
    struct EchoRelay;

    #[async_trait]
    impl RelayTransport for EchoRelay {
        async fn generate(&self, prompt: &str) -> Result<String, ClientError> {
            let delay = if prompt.starts_with("slow") { 200 } else { 10 };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            if prompt.trim().is_empty() {
                return Err(ClientError::Status {
                    status: 400,
                    message: "Please enter a valid prompt".to_owned(),
                });
            }
            Ok(format!("echo: {prompt}"))
        }
    }

    fn conversation() -> Conversation {
        Conversation::new(Arc::new(EchoRelay))
    }

    #[tokio::test(start_paused = true)]
    async fn user_message_is_appended_before_reply() {
        let mut conv = conversation();
        assert_eq!(conv.phase(), Phase::Idle);

        conv.submit("hello");
        assert_eq!(conv.transcript().messages(), &[Message::user("hello")]);
        assert_eq!(conv.phase(), Phase::AwaitingReply { pending: 1 });

        let update = conv.next_reply().await.unwrap();
        assert!(matches!(update, Update::Appended(ref m) if m.text() == "echo: hello"));
        assert_eq!(
            conv.transcript().messages(),
            &[Message::user("hello"), Message::assistant("echo: hello")]
        );
        assert_eq!(conv.phase(), Phase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_input_keeps_lone_user_entry() {
        let mut conv = conversation();
        conv.submit("");

        let update = conv.next_reply().await.unwrap();
        assert!(matches!(
            update,
            Update::Failed {
                error: ClientError::Status { status: 400, .. },
                ..
            }
        ));
        assert_eq!(conv.transcript().messages(), &[Message::user("")]);
        assert_eq!(conv.phase(), Phase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn replies_land_in_resolution_order() {
        let mut conv = conversation();
        let slow = conv.submit("slow question");
        let fast = conv.submit("quick one");
        assert!(slow < fast);

        conv.next_reply().await.unwrap();
        conv.next_reply().await.unwrap();

        let texts: Vec<&str> = conv.transcript().messages().iter().map(Message::text).collect();
        assert_eq!(
            texts,
            ["slow question", "quick one", "echo: quick one", "echo: slow question"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn replies_after_close_are_discarded() {
        let mut conv = conversation();
        let id = conv.submit("hello");
        conv.close();

        let update = conv.next_reply().await.unwrap();
        assert!(matches!(update, Update::Discarded(d) if d == id));
        assert_eq!(conv.transcript().len(), 1);
        assert!(!conv.is_active());
    }

    #[tokio::test]
    async fn next_reply_without_outstanding_exchange() {
        let mut conv = conversation();
        assert!(conv.next_reply().await.is_none());
    }

    #[test]
    fn render_is_a_pure_function_of_the_transcript() {
        let mut transcript = Transcript::new();
        transcript.push(Message::user("hi"));
        transcript.push(Message::assistant("hello!"));

        let first = transcript.render();
        assert_eq!(first, transcript.render());
        assert_eq!(first, "you> hi\nassistant> hello!");
        assert_eq!(transcript.clone().render(), first);
    }

    #[test]
    fn message_serializes_with_type_tag() {
        let json = serde_json::to_value(Message::assistant("ok")).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "assistant", "text": "ok" }));
        assert_eq!(Role::User.label(), "you");
    }
}
