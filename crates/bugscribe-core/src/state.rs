//! UI-agnostic conversation state
//!
//! The presentation layer only ever reads this state. All mutation goes through
//! the [`Coordinator`](crate::Coordinator), which keeps ids monotonic and the
//! message list append-only.

use serde::{Deserialize, Serialize};

/// A single entry in the conversation. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: u64,
    pub text: String,
    pub sender: Sender,
}

/// Who produced a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

/// What the conversation is currently doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Ready for the next submission
    #[default]
    Idle,
    /// Waiting on the chat service
    AwaitingResponse,
    /// Response received, being disclosed character by character
    Revealing,
}

#[derive(Debug, Default)]
pub struct ConversationState {
    messages: Vec<ConversationMessage>,
    mode: Mode,
    reveal_buffer: String,
    last_id: u64,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// True for the whole span from submission to error or reveal completion
    pub fn awaiting_response(&self) -> bool {
        self.mode != Mode::Idle
    }

    /// Partial assistant text that has not been committed yet
    pub fn reveal_buffer(&self) -> &str {
        &self.reveal_buffer
    }

    pub(crate) fn push(&mut self, sender: Sender, text: impl Into<String>) -> &ConversationMessage {
        self.last_id += 1;
        self.messages.push(ConversationMessage {
            id: self.last_id,
            text: text.into(),
            sender,
        });
        &self.messages[self.messages.len() - 1]
    }

    pub(crate) fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    pub(crate) fn set_reveal_buffer(&mut self, partial: String) {
        self.reveal_buffer = partial;
    }

    pub(crate) fn clear_reveal_buffer(&mut self) {
        self.reveal_buffer.clear();
    }
}
