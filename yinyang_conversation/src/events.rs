//! Notifications published to the rendering side.

use std::fmt;
use yinyang_core::{FailureKind, Message, SessionSettings, UsageCounters};

/// Where a single exchange stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    Idle,
    AwaitingReply,
    /// Last exchange failed; behaves like `Idle` for new submissions.
    Failed(FailureKind),
}

impl ExchangeState {
    #[must_use]
    pub const fn accepts_submission(self) -> bool {
        !matches!(self, Self::AwaitingReply)
    }
}

/// Reachability of the completion endpoint as last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Unknown,
    CredentialRequired,
    Connected,
    Offline,
    Error(FailureKind),
}

impl ConnectionStatus {
    #[must_use]
    pub const fn from_failure(kind: FailureKind) -> Self {
        match kind {
            FailureKind::MissingCredential => Self::CredentialRequired,
            FailureKind::NetworkError | FailureKind::Timeout => Self::Offline,
            other => Self::Error(other),
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => f.write_str("API: unknown"),
            Self::CredentialRequired => f.write_str("API: key required"),
            Self::Connected => f.write_str("API: connected"),
            Self::Offline => f.write_str("API: offline"),
            Self::Error(kind) => write!(f, "API: error ({kind})"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    MessageAppended(Message),
    StateChanged(ExchangeState),
    UsageUpdated(UsageCounters),
    HistoryCleared,
    HistoryLoaded(usize),
    SettingsChanged(SessionSettings),
    ConnectionChanged(ConnectionStatus),
    /// The credential needs re-entry or billing action.
    CredentialAttention(FailureKind),
}
