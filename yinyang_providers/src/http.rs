use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use yinyang_core::{
    ChatMessage, Completion, CompletionGateway, Credential, GatewayOutcome, Role,
};

use crate::classify::{classify_status, classify_transport, extract_reply};

pub const DEFAULT_ENDPOINT: &str = "https://api.deepseek.com/chat/completions";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const PROBE_PROMPT: &str = "test";

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Full URL of the `chat/completions` endpoint.
    pub endpoint: String,
    pub temperature: f32,
    pub probe_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

pub struct HttpGateway {
    client: Client,
    config: GatewayConfig,
}

impl HttpGateway {
    #[must_use]
    pub fn new(config: GatewayConfig) -> Self {
        info!("Creating HttpGateway for {}", config.endpoint);
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    #[must_use]
    pub const fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Send one request and classify whatever comes back.
    async fn try_send(
        &self,
        credential: &Credential,
        request: &CompletionRequest<'_>,
        budget: Duration,
    ) -> GatewayOutcome {
        let started = Instant::now();

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(credential.expose())
            .json(request)
            .timeout(budget)
            .send()
            .await
            .map_err(|e| classify_transport(&e, budget))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| classify_transport(&e, budget))?;

        debug!(
            "Endpoint answered {status} in {}ms ({} bytes)",
            started.elapsed().as_millis(),
            body.len()
        );

        if !(200..300).contains(&status) {
            let failure = classify_status(status, &body);
            warn!("Completion request failed: {failure}");
            return Err(failure);
        }

        let (reply_text, raw) = extract_reply(status, &body).inspect_err(|f| {
            warn!("Completion request returned an unusable body: {f}");
        })?;
        Ok(Completion { reply_text, raw })
    }
}

#[async_trait]
impl CompletionGateway for HttpGateway {
    async fn test_connection(&self, credential: &Credential, model: &str) -> GatewayOutcome {
        let messages = [ChatMessage::new(Role::User, PROBE_PROMPT)];
        let request = CompletionRequest {
            model,
            messages: &messages,
            max_tokens: 1,
            temperature: self.config.temperature,
            stream: false,
        };

        info!("Probing completion endpoint: model={model}");
        let outcome = self
            .try_send(credential, &request, self.config.probe_timeout)
            .await;
        match &outcome {
            Ok(_) => info!("Probe succeeded"),
            Err(f) => info!("Probe failed: {}", f.kind),
        }
        outcome
    }

    async fn complete(
        &self,
        credential: &Credential,
        messages: &[ChatMessage],
        model: &str,
        max_tokens: u32,
    ) -> GatewayOutcome {
        let request = CompletionRequest {
            model,
            messages,
            max_tokens,
            temperature: self.config.temperature,
            stream: false,
        };

        info!(
            "Sending completion request: model={model}, messages={}",
            messages.len()
        );
        let outcome = self
            .try_send(credential, &request, self.config.request_timeout)
            .await;
        if outcome.is_ok() {
            info!("Received completion");
        }
        outcome
    }
}
