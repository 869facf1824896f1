//! Selection of the history that is sent with each request.

use yinyang_core::{ChatMessage, Message, Role};

/// A sliding window over conversation history.
///
/// This decides which stored messages go out with the next request.
/// Diagnostics are never sent; the window keeps order, oldest first, so the
/// newest message is always last.
#[derive(Debug, Clone, Copy, Default)]
pub struct HistoryWindow {
    limit: Option<usize>,
}

impl HistoryWindow {
    /// Send the full history.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self { limit: None }
    }

    /// Send at most the `limit` most recent messages (at least one).
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit.max(1)),
        }
    }

    #[must_use]
    pub const fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Select messages to include in the request.
    #[must_use]
    pub fn select<'a>(&self, history: &'a [Message]) -> Vec<&'a Message> {
        let eligible: Vec<&Message> = history.iter().filter(|m| !m.diagnostic).collect();
        let start = self
            .limit
            .map_or(0, |limit| eligible.len().saturating_sub(limit));
        eligible[start..].to_vec()
    }

    /// Build the wire payload: optional system preamble, then the window.
    #[must_use]
    pub fn build_payload(&self, preamble: Option<&str>, history: &[Message]) -> Vec<ChatMessage> {
        let mut payload = Vec::new();

        if let Some(preamble) = preamble {
            payload.push(ChatMessage::new(Role::System, preamble));
        }
        payload.extend(self.select(history).into_iter().map(Message::to_chat_message));

        payload
    }
}

/// Statistics about conversation history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryStats {
    pub total_messages: usize,
    pub user_messages: usize,
    pub assistant_messages: usize,
    pub diagnostic_messages: usize,
    pub total_characters: usize,
    pub estimated_tokens: usize,
}

impl HistoryStats {
    #[must_use]
    pub fn of(history: &[Message]) -> Self {
        history.iter().fold(Self::default(), |mut stats, msg| {
            stats.total_messages += 1;
            stats.total_characters += msg.content.chars().count();
            stats.estimated_tokens += msg.estimated_tokens();
            match (msg.role, msg.diagnostic) {
                (_, true) => stats.diagnostic_messages += 1,
                (Role::User, false) => stats.user_messages += 1,
                (Role::Assistant, false) => stats.assistant_messages += 1,
                (Role::System, false) => {}
            }
            stats
        })
    }
}
