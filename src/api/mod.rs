use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use std::time::Duration;

use crate::error::{StudioError, snippet};

pub mod gemini;
pub mod veo;

const API_KEY_HEADER: &str = "x-goog-api-key";
const ERROR_BODY_CHARS: usize = 800;

pub(crate) fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(30))
        .build()
        .context("Failed to build HTTP client")
}

/// Turns a non-success response into a `Remote` error carrying the message
/// the API returned, plus the raw body so status markers stay visible.
pub(crate) fn http_failure(status: StatusCode, raw: &str) -> StudioError {
    let message = serde_json::from_str::<serde_json::Value>(raw)
        .ok()
        .and_then(|root| {
            root.get("error")
                .and_then(|err| err.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        });

    let body = snippet(raw, ERROR_BODY_CHARS);
    match message {
        Some(message) => StudioError::Remote(format!(
            "HTTP {}: {} {}",
            status.as_u16(),
            message,
            body
        )),
        None if body.is_empty() => StudioError::Remote(format!("HTTP {}", status)),
        None => StudioError::Remote(format!("HTTP {}: {}", status.as_u16(), body)),
    }
}

pub(crate) fn transport_failure(err: reqwest::Error) -> StudioError {
    StudioError::Remote(format!("request failed: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_failure_keeps_message_and_status_marker() {
        let raw = r#"{"error":{"code":404,"message":"models/veo-x is not found","status":"NOT_FOUND"}}"#;
        let err = http_failure(StatusCode::NOT_FOUND, raw);
        let text = err.to_string();
        assert!(text.starts_with("HTTP 404: models/veo-x is not found"));
        assert!(crate::error::is_not_found(&text));
    }

    #[test]
    fn http_failure_with_empty_body_names_status() {
        let err = http_failure(StatusCode::BAD_GATEWAY, "");
        assert_eq!(err.to_string(), "HTTP 502 Bad Gateway");
    }
}
