//! Conversation manager: the single-exchange state machine.
//!
//! The `ConversationManager` owns the history and its counters, mediates
//! every call to the completion gateway and decides how each failure kind is
//! surfaced. It never retries on its own.

use std::sync::Arc;
use std::time::Duration;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard, broadcast};
use tracing::{debug, info, warn};
use uuid::Uuid;

use yinyang_core::{
    CompletionGateway, Credential, CredentialError, CredentialStore, Failure, FailureKind,
    Message, Persistence, SessionSettings, SettingsPatch, StorageKeys, UsageCounters,
    util::DEFAULT_CODING_PREAMBLE,
};

use crate::diagnostics::DiagnosticMessages;
use crate::events::{ConnectionStatus, ExchangeState, SessionEvent};
use crate::history::{HistoryStats, HistoryWindow};
use crate::session::ConversationSession;

const DEFAULT_EVENT_CAPACITY: usize = 64;
/// Upper bound on one exchange, on top of the gateway's own request timeout.
pub const DEFAULT_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(90);

/// Configuration for conversation management.
#[derive(Debug, Clone)]
pub struct ConversationConfig {
    /// Session identifier, for log correlation
    pub session_id: Uuid,
    /// Settings used until persisted ones are loaded
    pub defaults: SessionSettings,
    /// Accepted model identifiers; empty accepts any
    pub models: Vec<String>,
    /// Most recent messages sent per request; `None` sends everything
    pub history_limit: Option<usize>,
    /// System preamble injected in coding mode
    pub coding_preamble: String,
    pub keys: StorageKeys,
    pub diagnostics: DiagnosticMessages,
    pub event_capacity: usize,
    /// Longest wait for a reply before the exchange fails with `Timeout`
    pub exchange_timeout: Duration,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            session_id: Uuid::now_v7(),
            defaults: SessionSettings::default(),
            models: Vec::new(),
            history_limit: None,
            coding_preamble: DEFAULT_CODING_PREAMBLE.to_string(),
            keys: StorageKeys::default(),
            diagnostics: DiagnosticMessages::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            exchange_timeout: DEFAULT_EXCHANGE_TIMEOUT,
        }
    }
}

impl ConversationConfig {
    /// Set the default settings.
    #[must_use]
    pub fn with_defaults(mut self, defaults: SessionSettings) -> Self {
        self.defaults = defaults;
        self
    }

    /// Restrict the accepted models.
    #[must_use]
    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.models = models;
        self
    }

    /// Set the history limit.
    #[must_use]
    pub const fn with_history_limit(mut self, limit: Option<usize>) -> Self {
        self.history_limit = limit;
        self
    }

    #[must_use]
    pub fn with_keys(mut self, keys: StorageKeys) -> Self {
        self.keys = keys;
        self
    }

    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: DiagnosticMessages) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    #[must_use]
    pub fn with_coding_preamble(mut self, preamble: String) -> Self {
        self.coding_preamble = preamble;
        self
    }

    #[must_use]
    pub const fn with_exchange_timeout(mut self, timeout: Duration) -> Self {
        self.exchange_timeout = timeout;
        self
    }
}

/// Errors returned by [`ConversationManager::submit`].
#[derive(Debug, Clone, Error)]
pub enum SubmitError {
    #[error("nothing to send")]
    EmptyUtterance,

    #[error("an exchange is already awaiting a reply")]
    ExchangeInFlight,

    #[error("the conversation was replaced while awaiting a reply")]
    Superseded,

    /// The exchange failed. `diagnostic` is the notice appended to the
    /// history, absent when the failure happened before anything was sent.
    #[error("{failure}")]
    Failed {
        failure: Failure,
        diagnostic: Option<Message>,
        credential_attention: bool,
    },
}

impl SubmitError {
    #[must_use]
    pub const fn kind(&self) -> Option<FailureKind> {
        match self {
            Self::Failed { failure, .. } => Some(failure.kind),
            _ => None,
        }
    }

    #[must_use]
    pub const fn needs_credential(&self) -> bool {
        matches!(
            self,
            Self::Failed {
                credential_attention: true,
                ..
            }
        )
    }
}

/// Errors from probing a credential candidate during setup.
#[derive(Debug, Clone, Error)]
pub enum ProbeError {
    #[error(transparent)]
    Format(#[from] CredentialError),

    #[error(transparent)]
    Failed(#[from] Failure),
}

/// Result of a successful exchange.
#[derive(Debug, Clone)]
pub struct ExchangeReply {
    /// The appended assistant message
    pub reply: Message,
    /// Counters after the exchange
    pub usage: UsageCounters,
    /// 1-based turn number
    pub turn_number: usize,
}

struct SessionState {
    session: ConversationSession,
    settings: SessionSettings,
    exchange: ExchangeState,
    /// Bumped whenever the history is replaced wholesale.
    generation: u64,
    connection: ConnectionStatus,
    connection_ticket: u64,
}

/// Single-user conversation manager.
///
/// All methods take `&self`; the manager can be shared behind an `Arc`.
/// Internal state sits behind an async mutex that is never held while
/// waiting on the gateway.
pub struct ConversationManager<G = Arc<dyn CompletionGateway>>
where
    G: Send + Sync,
{
    gateway: G,
    credentials: Arc<CredentialStore>,
    persistence: Persistence,
    config: ConversationConfig,
    window: HistoryWindow,
    state: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,
    tickets: AtomicU64,
    /// Generation + 1 of an exchange whose `submit` future was dropped, 0 if none.
    abandoned: AtomicU64,
}

/// Marks the exchange as abandoned if `submit` is dropped while awaiting the reply.
struct InFlightGuard<'a> {
    abandoned: &'a AtomicU64,
    generation: u64,
    armed: bool,
}

impl InFlightGuard<'_> {
    const fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.abandoned.store(self.generation + 1, Ordering::SeqCst);
        }
    }
}

impl<G> ConversationManager<G>
where
    G: CompletionGateway + Send + Sync,
{
    /// Create a manager with empty history and default settings.
    ///
    /// Call [`ConversationManager::load`] to restore persisted state.
    pub fn new(
        gateway: G,
        credentials: Arc<CredentialStore>,
        persistence: Persistence,
        config: ConversationConfig,
    ) -> Self {
        info!(
            "Creating conversation manager for session: {}",
            config.session_id
        );

        let window = config
            .history_limit
            .map_or_else(HistoryWindow::unbounded, HistoryWindow::with_limit);
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let state = SessionState {
            session: ConversationSession::new(),
            settings: config.defaults.clone(),
            exchange: ExchangeState::Idle,
            generation: 0,
            connection: ConnectionStatus::Unknown,
            connection_ticket: 0,
        };

        Self {
            gateway,
            credentials,
            persistence,
            config,
            window,
            state: Mutex::new(state),
            events,
            tickets: AtomicU64::new(0),
            abandoned: AtomicU64::new(0),
        }
    }

    /// Subscribe to state-change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    #[must_use]
    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    #[must_use]
    pub const fn config(&self) -> &ConversationConfig {
        &self.config
    }

    /// Restore credential, settings and history from persistence.
    ///
    /// Missing or malformed records fall back to defaults and empty history.
    pub async fn load(&self) -> UsageCounters {
        let credential = self.credentials.load().await;

        let settings = match self
            .persistence
            .load_optional::<SessionSettings>(&self.config.keys.settings)
            .await
        {
            Some(stored) => match stored.validate(&self.config.models) {
                Ok(()) => stored,
                Err(e) => {
                    warn!("Ignoring stored settings: {e}");
                    self.config.defaults.clone()
                }
            },
            None => self.config.defaults.clone(),
        };

        let history: Vec<Message> = if settings.auto_persist {
            self.persistence
                .load(&self.config.keys.history, Vec::new())
                .await
        } else {
            Vec::new()
        };

        let ticket = self.next_ticket();
        let mut state = self.lock_state().await;
        state.session.replace(history);
        state.settings = settings;
        state.generation += 1;
        let usage = state.session.usage;

        info!(
            "Session {} loaded: {} messages, ~{} tokens",
            self.config.session_id, usage.message_count, usage.approximate_tokens
        );

        self.emit(SessionEvent::HistoryLoaded(usage.message_count));
        self.emit(SessionEvent::UsageUpdated(usage));
        self.emit(SessionEvent::SettingsChanged(state.settings.clone()));
        let status = if credential.is_some() {
            ConnectionStatus::Unknown
        } else {
            ConnectionStatus::CredentialRequired
        };
        self.apply_connection(&mut state, ticket, status);

        usage
    }

    /// Send one user utterance and wait for the reply.
    ///
    /// Every call that reaches the gateway appends exactly one user message
    /// and exactly one assistant-role message: the reply, or a diagnostic
    /// describing the failure.
    pub async fn submit(&self, utterance: &str) -> Result<ExchangeReply, SubmitError> {
        let text = utterance.trim();
        if text.is_empty() {
            return Err(SubmitError::EmptyUtterance);
        }

        let ticket = self.next_ticket();
        let (credential, payload, settings, generation, turn_number) = {
            let mut state = self.lock_state().await;
            if !state.exchange.accepts_submission() {
                debug!("Rejecting submission: exchange in flight");
                return Err(SubmitError::ExchangeInFlight);
            }

            let Some(credential) = self.credentials.current() else {
                info!("Rejecting submission: no valid credential");
                self.apply_connection(&mut state, ticket, ConnectionStatus::CredentialRequired);
                self.emit(SessionEvent::CredentialAttention(
                    FailureKind::MissingCredential,
                ));
                return Err(SubmitError::Failed {
                    failure: Failure::missing_credential(),
                    diagnostic: None,
                    credential_attention: true,
                });
            };

            self.append(&mut state, Message::user(text));
            self.transition(&mut state, ExchangeState::AwaitingReply);

            let preamble = state
                .settings
                .coding_mode
                .then_some(self.config.coding_preamble.as_str());
            let payload = self
                .window
                .build_payload(preamble, &state.session.messages);

            (
                credential,
                payload,
                state.settings.clone(),
                state.generation,
                state.session.user_turns(),
            )
        };

        info!(
            "Processing turn {turn_number} for session: {}",
            self.config.session_id
        );

        let mut guard = InFlightGuard {
            abandoned: &self.abandoned,
            generation,
            armed: true,
        };
        let budget = self.config.exchange_timeout;
        let outcome = tokio::time::timeout(
            budget,
            self.gateway
                .complete(&credential, &payload, &settings.model, settings.max_tokens),
        )
        .await
        .unwrap_or_else(|_| {
            Err(Failure::new(
                FailureKind::Timeout,
                format!("no reply within {budget:?}"),
            ))
        });

        let mut state = self.state.lock().await;
        guard.disarm();
        if state.generation != generation {
            warn!("Discarding reply: conversation was replaced while awaiting it");
            self.transition(&mut state, ExchangeState::Idle);
            return Err(SubmitError::Superseded);
        }

        match outcome {
            Ok(completion) => {
                let reply = Message::assistant(completion.reply_text);
                self.append(&mut state, reply.clone());
                self.transition(&mut state, ExchangeState::Idle);
                self.apply_connection(&mut state, ticket, ConnectionStatus::Connected);
                self.persist_history(&state).await;

                debug!("Turn {turn_number} completed successfully");
                Ok(ExchangeReply {
                    reply,
                    usage: state.session.usage,
                    turn_number,
                })
            }
            Err(failure) => {
                warn!("Turn {turn_number} failed: {failure}");
                let diagnostic = Message::diagnostic(self.config.diagnostics.render(&failure));
                self.append(&mut state, diagnostic.clone());
                self.transition(&mut state, ExchangeState::Failed(failure.kind));
                self.apply_connection(
                    &mut state,
                    ticket,
                    ConnectionStatus::from_failure(failure.kind),
                );
                self.persist_history(&state).await;
                drop(state);

                let credential_attention = self.handle_credential_failure(&credential, &failure).await;
                Err(SubmitError::Failed {
                    failure,
                    diagnostic: Some(diagnostic),
                    credential_attention,
                })
            }
        }
    }

    /// Clear history and counters, in memory and in storage.
    ///
    /// Credential and settings are untouched. Calling it repeatedly is the
    /// same as calling it once.
    pub async fn reset(&self) {
        let mut state = self.lock_state().await;
        state.session.clear();
        state.generation += 1;
        self.persistence.clear(&self.config.keys.history).await;

        info!("Session {} reset", self.config.session_id);
        self.emit(SessionEvent::HistoryCleared);
        self.emit(SessionEvent::UsageUpdated(state.session.usage));
    }

    /// Merge `patch` into the settings, persist and return the result.
    ///
    /// An invalid patch fails with `InvalidConfig` and changes nothing.
    pub async fn configure(&self, patch: SettingsPatch) -> Result<SessionSettings, Failure> {
        let mut state = self.lock_state().await;
        let next = state
            .settings
            .merged(&patch, &self.config.models)
            .inspect_err(|e| warn!("Rejected settings change: {e}"))?;

        let enabling_persist = next.auto_persist && !state.settings.auto_persist;
        state.settings = next.clone();
        self.persistence
            .save(&self.config.keys.settings, &next)
            .await;
        if enabling_persist {
            self.persist_history(&state).await;
        }

        info!(
            "Settings updated: model={}, max_tokens={}, coding_mode={}",
            next.model, next.max_tokens, next.coding_mode
        );
        self.emit(SessionEvent::SettingsChanged(next.clone()));
        Ok(next)
    }

    /// Validate and store a new credential.
    pub async fn set_credential(&self, candidate: &str) -> Result<Credential, CredentialError> {
        let credential = self.credentials.set(candidate).await?;
        let ticket = self.next_ticket();
        let mut state = self.lock_state().await;
        self.apply_connection(&mut state, ticket, ConnectionStatus::Unknown);
        Ok(credential)
    }

    /// Probe the endpoint with the stored credential.
    ///
    /// Independent of any exchange in flight. When several probes overlap,
    /// the status reflects the one issued last.
    pub async fn test_connection(&self) -> Result<(), Failure> {
        let ticket = self.next_ticket();

        let Some(credential) = self.credentials.current() else {
            let mut state = self.lock_state().await;
            self.apply_connection(&mut state, ticket, ConnectionStatus::CredentialRequired);
            self.emit(SessionEvent::CredentialAttention(
                FailureKind::MissingCredential,
            ));
            return Err(Failure::missing_credential());
        };

        let model = self.lock_state().await.settings.model.clone();
        let outcome = self.gateway.test_connection(&credential, &model).await;

        let status = match &outcome {
            Ok(_) => ConnectionStatus::Connected,
            Err(failure) => ConnectionStatus::from_failure(failure.kind),
        };
        {
            let mut state = self.lock_state().await;
            self.apply_connection(&mut state, ticket, status);
        }

        match outcome {
            Ok(_) => Ok(()),
            Err(failure) => {
                self.handle_credential_failure(&credential, &failure).await;
                Err(failure)
            }
        }
    }

    /// Probe with a candidate credential without storing it.
    pub async fn test_candidate(&self, candidate: &str) -> Result<(), ProbeError> {
        let credential = self.credentials.validate(candidate)?;
        let model = self.lock_state().await.settings.model.clone();

        self.gateway
            .test_connection(&credential, &model)
            .await
            .map(|_| ())
            .map_err(ProbeError::from)
    }

    pub async fn history(&self) -> Vec<Message> {
        self.lock_state().await.session.messages.clone()
    }

    pub async fn session(&self) -> ConversationSession {
        self.lock_state().await.session.clone()
    }

    pub async fn usage(&self) -> UsageCounters {
        self.lock_state().await.session.usage
    }

    pub async fn stats(&self) -> HistoryStats {
        HistoryStats::of(&self.lock_state().await.session.messages)
    }

    pub async fn settings(&self) -> SessionSettings {
        self.lock_state().await.settings.clone()
    }

    pub async fn state(&self) -> ExchangeState {
        self.lock_state().await.exchange
    }

    pub async fn connection_status(&self) -> ConnectionStatus {
        self.lock_state().await.connection
    }

    /// Apply the credential policy for a failed call.
    ///
    /// A 401 clears the stored credential, but only if it is still the one
    /// the call was made with. Quota exhaustion keeps it.
    async fn handle_credential_failure(&self, used: &Credential, failure: &Failure) -> bool {
        if failure.kind == FailureKind::InvalidCredential
            && self.credentials.current().as_ref() == Some(used)
        {
            self.credentials.invalidate().await;
        }

        let attention = failure.kind.needs_credential_attention();
        if attention {
            self.emit(SessionEvent::CredentialAttention(failure.kind));
        }
        attention
    }

    /// Lock the state, first settling an exchange whose caller went away.
    ///
    /// The abandoned exchange gets its diagnostic and leaves `AwaitingReply`,
    /// so later submissions are accepted.
    async fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        let mut state = self.state.lock().await;
        let abandoned = self.abandoned.swap(0, Ordering::SeqCst);
        if abandoned != 0 && state.exchange == ExchangeState::AwaitingReply {
            let failure = Failure::new(
                FailureKind::Timeout,
                "the exchange was abandoned before a reply arrived",
            );
            warn!("Settling abandoned exchange: {failure}");
            if abandoned - 1 == state.generation {
                let diagnostic = Message::diagnostic(self.config.diagnostics.render(&failure));
                self.append(&mut state, diagnostic);
                self.transition(&mut state, ExchangeState::Failed(failure.kind));
                self.persist_history(&state).await;
            } else {
                self.transition(&mut state, ExchangeState::Idle);
            }
        }
        state
    }

    fn append(&self, state: &mut SessionState, message: Message) {
        state.session.push(message.clone());
        self.emit(SessionEvent::MessageAppended(message));
        self.emit(SessionEvent::UsageUpdated(state.session.usage));
    }

    fn transition(&self, state: &mut SessionState, next: ExchangeState) {
        if state.exchange != next {
            debug!("Exchange state: {:?} -> {:?}", state.exchange, next);
            state.exchange = next;
            self.emit(SessionEvent::StateChanged(next));
        }
    }

    fn apply_connection(&self, state: &mut SessionState, ticket: u64, status: ConnectionStatus) {
        if ticket < state.connection_ticket {
            debug!("Dropping stale connection status {status} (ticket {ticket})");
            return;
        }
        state.connection_ticket = ticket;
        if state.connection != status {
            state.connection = status;
            self.emit(SessionEvent::ConnectionChanged(status));
        }
    }

    async fn persist_history(&self, state: &SessionState) {
        if state.settings.auto_persist {
            self.persistence
                .save(&self.config.keys.history, &state.session.messages)
                .await;
        }
    }

    fn next_ticket(&self) -> u64 {
        self.tickets.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = ConversationConfig::default();
        assert!(config.history_limit.is_none());
        assert!(!config.defaults.model.is_empty());
        assert!(config.event_capacity > 0);
    }

    #[test]
    fn test_submit_error_helpers() {
        let err = SubmitError::Failed {
            failure: Failure::http(402, "Insufficient Balance"),
            diagnostic: None,
            credential_attention: true,
        };
        assert_eq!(err.kind(), Some(FailureKind::QuotaExhausted));
        assert!(err.needs_credential());
        assert_eq!(SubmitError::ExchangeInFlight.kind(), None);
        assert!(!SubmitError::EmptyUtterance.needs_credential());
    }
}
