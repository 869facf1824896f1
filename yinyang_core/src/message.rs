//! Conversation entries and usage accounting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ChatMessage, Role, util::estimate_tokens};

/// One entry of the conversation history.
///
/// Messages are immutable once appended; the history is only ever appended
/// to or replaced as a whole.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(alias = "timestamp", default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// Set on synthesized failure notices. Never sent to the model.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub diagnostic: bool,
}

impl Message {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now(),
            diagnostic: false,
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// An assistant-role notice describing a failed exchange.
    #[must_use]
    pub fn diagnostic(content: impl Into<String>) -> Self {
        Self {
            diagnostic: true,
            ..Self::new(Role::Assistant, content)
        }
    }

    /// Strip timestamps and metadata for transmission.
    #[must_use]
    pub fn to_chat_message(&self) -> ChatMessage {
        ChatMessage::new(self.role, self.content.clone())
    }

    #[must_use]
    pub fn estimated_tokens(&self) -> usize {
        estimate_tokens(&self.content)
    }
}

/// Running message and token counters shown next to the transcript.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UsageCounters {
    pub message_count: usize,
    pub approximate_tokens: usize,
}

impl UsageCounters {
    /// Recompute counters from scratch over a whole history.
    #[must_use]
    pub fn from_history(history: &[Message]) -> Self {
        history.iter().fold(Self::default(), |mut acc, msg| {
            acc.record(msg);
            acc
        })
    }

    pub fn record(&mut self, message: &Message) {
        self.message_count += 1;
        self.approximate_tokens += message.estimated_tokens();
    }

    pub const fn clear(&mut self) {
        self.message_count = 0;
        self.approximate_tokens = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_per_append() {
        let mut usage = UsageCounters::default();
        usage.record(&Message::user("hello"));
        usage.record(&Message::assistant("hi"));

        assert_eq!(usage.message_count, 2);
        assert_eq!(usage.approximate_tokens, 2 + 1);
    }

    #[test]
    fn recompute_matches_incremental() {
        let history = vec![
            Message::user("abcdefgh"),
            Message::diagnostic("network down"),
            Message::user("a"),
        ];
        let mut incremental = UsageCounters::default();
        for msg in &history {
            incremental.record(msg);
        }

        assert_eq!(UsageCounters::from_history(&history), incremental);
        assert_eq!(incremental.approximate_tokens, 2 + 3 + 1);
    }

    #[test]
    #[expect(clippy::expect_used, reason = "Test failure should panic with context")]
    fn wire_form_drops_metadata() {
        let msg = Message::diagnostic("oops");
        let wire = serde_json::to_value(msg.to_chat_message()).expect("serialize wire message");

        assert_eq!(wire, serde_json::json!({"role": "assistant", "content": "oops"}));
    }

    #[test]
    #[expect(clippy::expect_used, reason = "Test failure should panic with context")]
    fn legacy_timestamp_field_is_accepted() {
        let raw = r#"{"role":"user","content":"halo","timestamp":"2024-05-01T10:00:00Z"}"#;
        let msg: Message = serde_json::from_str(raw).expect("parse legacy message");

        assert_eq!(msg.content, "halo");
        assert_eq!(msg.created_at.to_rfc3339(), "2024-05-01T10:00:00+00:00");
        assert!(!msg.diagnostic);
    }
}
