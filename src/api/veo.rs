use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;

use super::{API_KEY_HEADER, build_client, http_failure, transport_failure};
use crate::error::StudioError;
use crate::render::{RenderBackend, RenderOperation, RenderSettings};

/// `predictLongRunning` client for the video model.
pub struct VeoClient {
    client: Client,
    api_base: String,
    model: String,
}

impl VeoClient {
    pub fn new(api_base: &str, model: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            api_base: api_base.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    async fn read_operation(&self, resp: reqwest::Response) -> Result<RenderOperation, StudioError> {
        let status = resp.status();
        let raw = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(http_failure(status, &raw));
        }
        parse_operation(&raw)
    }
}

#[async_trait]
impl RenderBackend for VeoClient {
    async fn submit(
        &self,
        prompt: &str,
        settings: &RenderSettings,
        api_key: &str,
    ) -> Result<RenderOperation, StudioError> {
        let url = format!("{}/models/{}:predictLongRunning", self.api_base, self.model);
        let body = json!({
            "instances": [{ "prompt": prompt }],
            "parameters": {
                "sampleCount": settings.count,
                "aspectRatio": settings.aspect_ratio,
            },
        });

        let resp = self
            .client
            .post(url)
            .header(API_KEY_HEADER, api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_failure)?;
        self.read_operation(resp).await
    }

    async fn poll(
        &self,
        operation: &RenderOperation,
        api_key: &str,
    ) -> Result<RenderOperation, StudioError> {
        let url = format!("{}/{}", self.api_base, operation.name);
        let resp = self
            .client
            .get(url)
            .header(API_KEY_HEADER, api_key)
            .send()
            .await
            .map_err(transport_failure)?;
        self.read_operation(resp).await
    }

    async fn download(&self, uri: &str, api_key: &str) -> Result<Vec<u8>, StudioError> {
        let resp = self
            .client
            .get(uri)
            .query(&[("key", api_key)])
            .send()
            .await
            .map_err(transport_failure)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(StudioError::Remote(format!(
                "Failed to download video file. Status: {}",
                status.canonical_reason().unwrap_or(status.as_str())
            )));
        }
        let bytes = resp.bytes().await.map_err(transport_failure)?;
        Ok(bytes.to_vec())
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Reads an operation resource. Both the REST shape
/// (`generateVideoResponse.generatedSamples`) and the SDK shape
/// (`generatedVideos`) are accepted for the video URI.
pub(crate) fn parse_operation(raw: &str) -> Result<RenderOperation, StudioError> {
    let root: Value = serde_json::from_str(raw)
        .map_err(|e| StudioError::Remote(format!("unreadable operation response: {e}")))?;

    let name = root
        .get("name")
        .and_then(|n| n.as_str())
        .ok_or_else(|| StudioError::Remote("operation response has no name".into()))?
        .to_string();
    let done = root.get("done").and_then(|d| d.as_bool()).unwrap_or(false);

    let error = root.get("error").map(|err| {
        err.get("message")
            .and_then(|m| m.as_str())
            .unwrap_or_default()
            .to_string()
    });

    let response = root.get("response");
    let samples = response
        .and_then(|r| r.get("generateVideoResponse"))
        .and_then(|r| r.get("generatedSamples"))
        .or_else(|| response.and_then(|r| r.get("generatedVideos")));
    let video_uri = samples
        .and_then(|s| s.as_array())
        .and_then(|s| s.first())
        .and_then(|s| s.get("video"))
        .and_then(|v| v.get("uri"))
        .and_then(|u| u.as_str())
        .map(str::to_string);

    Ok(RenderOperation {
        name,
        done,
        error,
        video_uri,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_operation_has_no_result() {
        let op = parse_operation(r#"{"name":"models/veo/operations/abc"}"#).unwrap();
        assert_eq!(op.name, "models/veo/operations/abc");
        assert!(!op.done);
        assert!(op.error.is_none());
        assert!(op.video_uri.is_none());
    }

    #[test]
    fn finished_operation_exposes_sample_uri() {
        let raw = r#"{
            "name": "models/veo/operations/abc",
            "done": true,
            "response": {
                "generateVideoResponse": {
                    "generatedSamples": [{ "video": { "uri": "https://files.example/v1:download?alt=media" } }]
                }
            }
        }"#;
        let op = parse_operation(raw).unwrap();
        assert!(op.done);
        assert_eq!(
            op.video_uri.as_deref(),
            Some("https://files.example/v1:download?alt=media")
        );
    }

    #[test]
    fn sdk_shaped_result_is_accepted() {
        let raw = r#"{"name":"op","done":true,"response":{"generatedVideos":[{"video":{"uri":"https://x/y?alt=media"}}]}}"#;
        assert_eq!(
            parse_operation(raw).unwrap().video_uri.as_deref(),
            Some("https://x/y?alt=media")
        );
    }

    #[test]
    fn failed_operation_keeps_message_even_when_empty() {
        let op = parse_operation(r#"{"name":"op","done":true,"error":{"code":3,"message":"unsafe prompt"}}"#)
            .unwrap();
        assert_eq!(op.error.as_deref(), Some("unsafe prompt"));

        let op = parse_operation(r#"{"name":"op","done":true,"error":{"code":13}}"#).unwrap();
        assert_eq!(op.error.as_deref(), Some(""));
    }
}
