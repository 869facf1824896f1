#![warn(
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

//! Multi-turn chat sessions against a completion endpoint.
//!
//! The manager keeps the ordered message history and its usage counters,
//! admits one exchange at a time and turns every gateway failure into a
//! diagnostic message the user can act on.
//!
//! # Key Features
//! - Single exchange in flight, later submissions are rejected
//! - Optional coding preamble, never stored in history
//! - Automatic persistence of history and settings
//! - Event stream for rendering state changes

mod diagnostics;
mod events;
mod history;
mod manager;
mod session;

pub use diagnostics::DiagnosticMessages;
pub use events::{ConnectionStatus, ExchangeState, SessionEvent};
pub use history::{HistoryStats, HistoryWindow};
pub use manager::{
    ConversationConfig, ConversationManager, DEFAULT_EXCHANGE_TIMEOUT, ExchangeReply, ProbeError,
    SubmitError,
};
pub use session::ConversationSession;
