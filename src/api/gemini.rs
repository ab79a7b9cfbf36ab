use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;

use super::{API_KEY_HEADER, build_client, http_failure, transport_failure};
use crate::error::StudioError;
use crate::generator::SceneBackend;
use crate::scene::{response_schema, system_instruction};

/// `generateContent` client that asks for one scene as structured JSON.
pub struct GeminiClient {
    client: Client,
    api_base: String,
    system_instruction: String,
    schema: Value,
}

impl GeminiClient {
    pub fn new(api_base: &str, dialogue_language: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            api_base: api_base.trim_end_matches('/').to_string(),
            system_instruction: system_instruction(dialogue_language),
            schema: response_schema(),
        })
    }

    fn request_body(&self, prompt: &str) -> Value {
        json!({
            "systemInstruction": { "parts": [{ "text": self.system_instruction }] },
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": self.schema,
            },
        })
    }
}

#[async_trait]
impl SceneBackend for GeminiClient {
    async fn generate_scene(
        &self,
        model: &str,
        prompt: &str,
        api_key: &str,
    ) -> Result<String, StudioError> {
        let url = format!("{}/models/{}:generateContent", self.api_base, model);
        let resp = self
            .client
            .post(url)
            .header(API_KEY_HEADER, api_key)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(transport_failure)?;

        let status = resp.status();
        let raw = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(http_failure(status, &raw));
        }

        extract_candidate_text(&raw)
    }
}

/// Joins the text parts of the first candidate.
pub(crate) fn extract_candidate_text(raw: &str) -> Result<String, StudioError> {
    let root: Value = serde_json::from_str(raw)
        .map_err(|e| StudioError::Remote(format!("unreadable generateContent response: {e}")))?;

    if let Some(reason) = root
        .get("promptFeedback")
        .and_then(|f| f.get("blockReason"))
        .and_then(|r| r.as_str())
    {
        return Err(StudioError::Remote(format!("prompt blocked: {reason}")));
    }

    let parts = root
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .ok_or_else(|| StudioError::Remote("response contained no candidates".into()))?;

    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
        .collect();

    if text.trim().is_empty() {
        return Err(StudioError::Remote("response contained no text".into()));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_and_joins_text_parts() {
        let raw = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"{\"scene\":"},{"text":"{}}"}]}}]}"#;
        assert_eq!(extract_candidate_text(raw).unwrap(), r#"{"scene":{}}"#);
    }

    #[test]
    fn blocked_prompt_is_a_remote_error() {
        let raw = r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#;
        let err = extract_candidate_text(raw).unwrap_err();
        assert_eq!(err.to_string(), "prompt blocked: SAFETY");
    }

    #[test]
    fn missing_candidates_is_a_remote_error() {
        assert!(matches!(
            extract_candidate_text(r#"{"candidates":[]}"#),
            Err(StudioError::Remote(_))
        ));
    }

    #[test]
    fn request_body_carries_schema_and_instruction() {
        let client =
            GeminiClient::new("http://localhost/v1beta/", "English", Duration::from_secs(5)).unwrap();
        assert_eq!(client.api_base, "http://localhost/v1beta");

        let body = client.request_body("Scene Number: 1 of 1");
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["responseSchema"]["type"], "OBJECT");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Scene Number: 1 of 1");
        assert!(
            body["systemInstruction"]["parts"][0]["text"]
                .as_str()
                .unwrap()
                .contains("in English.")
        );
    }
}
