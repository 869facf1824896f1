//! The transcript owned by a conversation manager.
//!
//! A session holds the ordered message history together with its usage
//! counters, so the two can never drift apart.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use yinyang_core::{Message, Role, UsageCounters};

/// Message history plus the counters derived from it.
#[derive(Debug, Clone)]
pub struct ConversationSession {
    /// Session identifier, used to correlate log lines
    pub id: Uuid,
    /// Message history, oldest first
    pub messages: Vec<Message>,
    /// Counters over `messages`
    pub usage: UsageCounters,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl ConversationSession {
    /// Create a new empty conversation session.
    #[must_use]
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            messages: Vec::new(),
            usage: UsageCounters::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a message and account for it.
    pub fn push(&mut self, message: Message) {
        self.usage.record(&message);
        self.messages.push(message);
        self.updated_at = Utc::now();
    }

    /// Replace the whole history, recomputing the counters.
    pub fn replace(&mut self, messages: Vec<Message>) {
        self.usage = UsageCounters::from_history(&messages);
        self.messages = messages;
        self.updated_at = Utc::now();
    }

    /// Get the last N messages from history.
    #[must_use]
    pub fn last_n_messages(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    /// Number of user turns so far.
    #[must_use]
    pub fn user_turns(&self) -> usize {
        self.messages.iter().filter(|m| m.role == Role::User).count()
    }

    #[must_use]
    pub const fn message_count(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Clear all messages and counters.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.usage.clear();
        self.updated_at = Utc::now();
    }
}

impl Default for ConversationSession {
    fn default() -> Self {
        Self::new()
    }
}
