//! Failure taxonomy shared by the gateway and the conversation manager.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    MissingCredential,
    InvalidCredential,
    QuotaExhausted,
    RateLimited,
    NetworkError,
    Timeout,
    BadRequest,
    ServerError,
    InvalidConfig,
}

impl FailureKind {
    /// Map a non-success HTTP status onto the taxonomy.
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            401 => Self::InvalidCredential,
            402 => Self::QuotaExhausted,
            429 => Self::RateLimited,
            500..=599 => Self::ServerError,
            _ => Self::BadRequest,
        }
    }

    /// Whether the user has to re-enter a credential or take billing action.
    #[must_use]
    pub const fn needs_credential_attention(self) -> bool {
        matches!(
            self,
            Self::MissingCredential | Self::InvalidCredential | Self::QuotaExhausted
        )
    }

    /// Whether resubmitting the same exchange later may succeed.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::NetworkError | Self::Timeout | Self::ServerError | Self::RateLimited
        )
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_credential",
            Self::InvalidCredential => "invalid_credential",
            Self::QuotaExhausted => "quota_exhausted",
            Self::RateLimited => "rate_limited",
            Self::NetworkError => "network_error",
            Self::Timeout => "timeout",
            Self::BadRequest => "bad_request",
            Self::ServerError => "server_error",
            Self::InvalidConfig => "invalid_config",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure. Carries the HTTP status when one was received.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {detail}")]
pub struct Failure {
    pub kind: FailureKind,
    pub http_status: Option<u16>,
    pub detail: String,
}

impl Failure {
    #[must_use]
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            http_status: None,
            detail: detail.into(),
        }
    }

    #[must_use]
    pub fn http(status: u16, detail: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::from_status(status),
            http_status: Some(status),
            detail: detail.into(),
        }
    }

    #[must_use]
    pub fn missing_credential() -> Self {
        Self::new(FailureKind::MissingCredential, "no valid credential is set")
    }

    #[must_use]
    pub fn invalid_config(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::InvalidConfig, detail)
    }
}
