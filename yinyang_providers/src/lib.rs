//! HTTP implementation of the completion gateway.
//!
//! [`HttpGateway`] talks to any OpenAI-compatible `chat/completions`
//! endpoint and classifies every outcome into the shared failure taxonomy.

mod classify;
mod http;

pub use classify::{classify_status, classify_transport, extract_reply};
pub use http::{
    DEFAULT_ENDPOINT, DEFAULT_PROBE_TIMEOUT, DEFAULT_REQUEST_TIMEOUT, DEFAULT_TEMPERATURE,
    GatewayConfig, HttpGateway,
};
