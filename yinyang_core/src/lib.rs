#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

use serde::{Deserialize, Serialize};

pub mod credential;
pub mod failure;
pub mod gateway;
pub mod message;
pub mod persistence;
pub mod settings;
pub mod util;

pub use credential::{Credential, CredentialError, CredentialPolicy, CredentialStore};
pub use failure::{Failure, FailureKind};
pub use gateway::{Completion, CompletionGateway, GatewayOutcome};
pub use message::{Message, UsageCounters};
pub use persistence::{KeyValueStore, MemoryStore, Persistence, StorageKeys};
pub use settings::{SessionSettings, SettingsPatch};
pub use util::estimate_tokens;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

/// Wire form of a message: only role and content ever leave the process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}
