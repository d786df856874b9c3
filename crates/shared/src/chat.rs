//! Session and transcript types shared across the app.
//!
//! The transcript is append-only for the lifetime of a window: messages are
//! immutable once appended, and the only bulk operation is a wholesale clear.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Author {
    User,
    Assistant,
}

/// One exchanged message. Immutable once appended to a transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub author: Author,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            author: Author::User,
            text: text.into(),
            created_at: Utc::now(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            author: Author::Assistant,
            text: text.into(),
            created_at: Utc::now(),
        }
    }

    /// Timestamp formatted for chat bubbles.
    pub fn time_label(&self) -> String {
        self.created_at.format("%H:%M").to_string()
    }
}

/// Append-only message sequence for one window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// The single mutation path besides `clear`.
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Wholesale clear, used by the "clear conversation" action.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Per-window state: who is logged in, the resolved API key, and the
/// conversation so far. Owned exclusively by one open window and destroyed
/// with it.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub user: String,
    api_key: Option<String>,
    transcript: Transcript,
}

impl Session {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            api_key: None,
            transcript: Transcript::new(),
        }
    }

    pub fn append(&mut self, message: Message) {
        self.transcript.append(message);
    }

    /// Replaces the resolved key. Persistence is a separate, explicit call
    /// through the document store; this only updates in-memory state.
    pub fn set_api_key(&mut self, key: impl Into<String>) {
        self.api_key = Some(key.into());
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Empties the transcript without touching identity or credentials.
    pub fn clear_transcript(&mut self) {
        self.transcript.clear();
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }
}
