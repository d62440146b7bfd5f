mod controller;
mod reorder;
mod types;

pub use controller::{ChatOptions, ConversationController, TurnHandle, GREETING};
pub use types::{
    Author, Feedback, Message, MessageId, MessageKind, TranscriptSnapshot, Turn, TurnOutcome,
    TurnState,
};
