//! Contract for the remote completion endpoint.

use async_trait::async_trait;
use std::sync::Arc;

use crate::{ChatMessage, credential::Credential, failure::Failure};

/// A successful completion: the reply text plus the raw response body.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub reply_text: String,
    pub raw: serde_json::Value,
}

pub type GatewayOutcome = Result<Completion, Failure>;

/// Sends requests to the completion endpoint and classifies the outcome.
///
/// Implementations never retry: every failure is handed back with its kind
/// intact so the caller owns the recovery policy.
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    /// Minimal-cost request used only to classify reachability, auth and quota.
    async fn test_connection(&self, credential: &Credential, model: &str) -> GatewayOutcome;

    /// Full non-streaming completion over `messages`, oldest first.
    async fn complete(
        &self,
        credential: &Credential,
        messages: &[ChatMessage],
        model: &str,
        max_tokens: u32,
    ) -> GatewayOutcome;
}

#[async_trait]
impl<T> CompletionGateway for Arc<T>
where
    T: CompletionGateway + ?Sized,
{
    async fn test_connection(&self, credential: &Credential, model: &str) -> GatewayOutcome {
        (**self).test_connection(credential, model).await
    }

    async fn complete(
        &self,
        credential: &Credential,
        messages: &[ChatMessage],
        model: &str,
        max_tokens: u32,
    ) -> GatewayOutcome {
        (**self)
            .complete(credential, messages, model, max_tokens)
            .await
    }
}
