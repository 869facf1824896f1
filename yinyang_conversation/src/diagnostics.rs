//! Human-readable notices for failed exchanges.

use serde::{Deserialize, Serialize};
use yinyang_core::{Failure, FailureKind};

/// Copy text for the diagnostic appended after a failed exchange.
///
/// Every field can be overridden from the config file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DiagnosticMessages {
    pub prefix: String,
    pub missing_credential: String,
    pub invalid_credential: String,
    pub quota_exhausted: String,
    pub rate_limited: String,
    pub network_error: String,
    pub timeout: String,
    pub bad_request: String,
    pub server_error: String,
    pub invalid_config: String,
}

impl Default for DiagnosticMessages {
    fn default() -> Self {
        Self {
            prefix: "⚠️ Error:".to_string(),
            missing_credential: "No API key is set. Add an API key before sending messages."
                .to_string(),
            invalid_credential:
                "The API key is invalid or has expired. Create a new API key and set it again."
                    .to_string(),
            quota_exhausted:
                "The API key has run out of quota. Top up the balance or set a new API key."
                    .to_string(),
            rate_limited: "Too many requests. Wait a moment before sending again.".to_string(),
            network_error:
                "Could not reach the server. Check your internet connection or try again later."
                    .to_string(),
            timeout: "The server took too long to answer. Try again in a moment.".to_string(),
            bad_request: "The request was rejected by the server.".to_string(),
            server_error: "The server ran into a problem. Try again later.".to_string(),
            invalid_config: "The session settings are invalid.".to_string(),
        }
    }
}

impl DiagnosticMessages {
    #[must_use]
    pub fn hint(&self, kind: FailureKind) -> &str {
        match kind {
            FailureKind::MissingCredential => &self.missing_credential,
            FailureKind::InvalidCredential => &self.invalid_credential,
            FailureKind::QuotaExhausted => &self.quota_exhausted,
            FailureKind::RateLimited => &self.rate_limited,
            FailureKind::NetworkError => &self.network_error,
            FailureKind::Timeout => &self.timeout,
            FailureKind::BadRequest => &self.bad_request,
            FailureKind::ServerError => &self.server_error,
            FailureKind::InvalidConfig => &self.invalid_config,
        }
    }

    /// Render the full notice for `failure`.
    #[must_use]
    pub fn render(&self, failure: &Failure) -> String {
        let headline = match failure.http_status {
            Some(status) => format!("{} API error {status}: {}", self.prefix, failure.detail),
            None => format!("{} {}", self.prefix, failure.detail),
        };
        format!("{headline}\n\n{}", self.hint(failure.kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_status_detail_and_hint() {
        let text = DiagnosticMessages::default().render(&Failure::http(402, "Insufficient Balance"));

        assert!(text.starts_with("⚠️ Error: API error 402: Insufficient Balance"));
        assert!(text.ends_with("Top up the balance or set a new API key."));
    }

    #[test]
    fn every_kind_has_distinct_copy() {
        let messages = DiagnosticMessages::default();
        let kinds = [
            FailureKind::MissingCredential,
            FailureKind::InvalidCredential,
            FailureKind::QuotaExhausted,
            FailureKind::RateLimited,
            FailureKind::NetworkError,
            FailureKind::Timeout,
            FailureKind::BadRequest,
            FailureKind::ServerError,
            FailureKind::InvalidConfig,
        ];
        let mut hints: Vec<&str> = kinds.iter().map(|k| messages.hint(*k)).collect();
        hints.sort_unstable();
        hints.dedup();

        assert_eq!(hints.len(), kinds.len());
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let custom: DiagnosticMessages =
            serde_json::from_str(r#"{"rate_limited": "Pelan-pelan."}"#).unwrap_or_default();

        assert_eq!(custom.rate_limited, "Pelan-pelan.");
        assert_eq!(custom.timeout, DiagnosticMessages::default().timeout);
    }
}
