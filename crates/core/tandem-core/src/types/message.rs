//! Messages and the append-only conversation context

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Message author role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Caller / end user
    User,
    /// Produced by an agent
    Assistant,
    /// Out-of-band instructions
    System,
}

impl Role {
    /// Wire value
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One conversational message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role
    pub role: Role,

    /// Producing agent, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// Text content (may be empty)
    pub text: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Create a message
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            author: None,
            text: text.into(),
            created_at: Utc::now(),
        }
    }

    /// User message
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    /// System message
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text)
    }

    /// Assistant message authored by an agent
    pub fn assistant(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text).with_author(author)
    }

    /// Tag with an author
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Author or role, for display
    pub fn label(&self) -> &str {
        self.author.as_deref().unwrap_or_else(|| self.role.as_str())
    }
}

/// Ordered, append-only sequence of messages threaded between stages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context {
    messages: Vec<Message>,
}

impl Context {
    /// Empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Context seeded with the initial task
    pub fn from_task(task: impl Into<String>) -> Self {
        let mut context = Self::new();
        context.append(Message::user(task));
        context
    }

    /// Append a message; appended messages are never removed or changed
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// All messages in order
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Iterate in order
    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    /// Most recent message
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Total characters over all message texts
    pub fn char_len(&self) -> usize {
        self.messages.iter().map(|m| m.text.chars().count()).sum()
    }

    /// Human-readable transcript, one block per message
    pub fn transcript(&self) -> String {
        self.messages
            .iter()
            .map(|m| format!("{}:\n{}\n", m.label(), m.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl<'a> IntoIterator for &'a Context {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}
