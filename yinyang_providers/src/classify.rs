use std::time::Duration;

use yinyang_core::{Failure, FailureKind};

const MAX_DETAIL_CHARS: usize = 300;

/// Classify a transport-level error. Timeouts get their own kind.
#[must_use]
pub fn classify_transport(err: &reqwest::Error, budget: Duration) -> Failure {
    if err.is_timeout() {
        Failure::new(
            FailureKind::Timeout,
            format!("no response within {budget:?}"),
        )
    } else {
        Failure::new(FailureKind::NetworkError, err.to_string())
    }
}

/// Classify a non-success HTTP response.
///
/// The detail is the API's `error.message` when present, else the body text,
/// else the canonical reason phrase.
#[must_use]
pub fn classify_status(status: u16, body: &[u8]) -> Failure {
    let from_json = serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string));

    let detail = from_json
        .or_else(|| {
            let text = String::from_utf8_lossy(body);
            let text = text.trim();
            (!text.is_empty()).then(|| text.chars().take(MAX_DETAIL_CHARS).collect())
        })
        .or_else(|| {
            reqwest::StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .map(str::to_string)
        })
        .unwrap_or_else(|| format!("HTTP {status}"));

    Failure::http(status, detail)
}

/// Pull `choices[0].message.content` out of a 2xx body.
pub fn extract_reply(status: u16, body: &[u8]) -> Result<(String, serde_json::Value), Failure> {
    let malformed = || Failure {
        kind: FailureKind::BadRequest,
        http_status: Some(status),
        detail: "malformed response".to_string(),
    };

    let raw: serde_json::Value = serde_json::from_slice(body).map_err(|_| malformed())?;
    let reply = raw["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(malformed)?
        .to_string();

    Ok((reply, raw))
}
