use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub(crate) u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Author {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feedback {
    Positive,
    Negative,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    /// Stands in for a reply the backend could not produce.
    Error { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub author: Author,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub feedback: Option<Feedback>,
    pub sources: Vec<String>,
    pub kind: MessageKind,
}

impl Message {
    pub fn is_error(&self) -> bool {
        matches!(self.kind, MessageKind::Error { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    Sent,
    AwaitingReply,
    Replied,
    Errored,
}

impl TurnState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnState::Replied | TurnState::Errored)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub user_message: MessageId,
    pub state: TurnState,
}

/// How a single `post_user_message` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Replied(MessageId),
    Errored(MessageId),
    /// The reply task was dropped before it committed, e.g. at runtime shutdown.
    Discarded,
}

/// Point-in-time copy of the conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TranscriptSnapshot {
    pub messages: Vec<Message>,
    pub turns: Vec<Turn>,
    /// True while at least one reply is outstanding.
    pub typing: bool,
}

impl TranscriptSnapshot {
    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn turn_state(&self, user_message: MessageId) -> Option<TurnState> {
        self.turns
            .iter()
            .find(|t| t.user_message == user_message)
            .map(|t| t.state)
    }
}
