use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{StudioError, is_invalid_key, is_not_found};
use crate::media::{MediaStore, VideoHandle};
use crate::scene::validate_prompt;
use crate::{logi, logok, logw};

const VEO_KEY_INVALID: &str = "The provided VEO API Key is not valid. Please check it in the Setup tab.";
const OPERATION_FAILED: &str =
    "The video generation operation failed without a specific error message.";
const NO_DOWNLOAD_LINK: &str =
    "Video generation completed, but no download link was provided by the API.";

/// Fixed request configuration sent with every render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSettings {
    pub count: u32,
    pub aspect_ratio: String,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            count: 1,
            aspect_ratio: "9:16".to_string(),
        }
    }
}

/// Snapshot of a long-running render operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderOperation {
    pub name: String,
    pub done: bool,
    pub error: Option<String>,
    pub video_uri: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// Status queries allowed before giving up; `None` waits forever.
    pub max_polls: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            max_polls: None,
        }
    }
}

/// A video model reachable through submit / poll / download.
#[async_trait]
pub trait RenderBackend: Send + Sync {
    async fn submit(
        &self,
        prompt: &str,
        settings: &RenderSettings,
        api_key: &str,
    ) -> Result<RenderOperation, StudioError>;

    async fn poll(
        &self,
        operation: &RenderOperation,
        api_key: &str,
    ) -> Result<RenderOperation, StudioError>;

    /// Fetches the finished clip. Non-success responses are errors.
    async fn download(&self, uri: &str, api_key: &str) -> Result<Vec<u8>, StudioError>;

    fn model(&self) -> &str;
}

pub struct VideoRenderer<B> {
    backend: B,
    settings: RenderSettings,
    policy: PollPolicy,
    media: MediaStore,
}

impl<B: RenderBackend> VideoRenderer<B> {
    pub fn new(backend: B, settings: RenderSettings, policy: PollPolicy, media: MediaStore) -> Self {
        Self {
            backend,
            settings,
            policy,
            media,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn media(&self) -> &MediaStore {
        &self.media
    }

    /// Renders one scene prompt to a local clip.
    pub async fn render(&self, prompt: &str, api_key: &str) -> Result<VideoHandle, StudioError> {
        if api_key.trim().is_empty() {
            return Err(StudioError::Validation(
                "VEO API Key is not configured in the Setup tab.".into(),
            ));
        }
        validate_prompt(prompt)?;

        self.render_inner(prompt, api_key)
            .await
            .map_err(|err| classify_failure(self.backend.model(), err))
    }

    async fn render_inner(&self, prompt: &str, api_key: &str) -> Result<VideoHandle, StudioError> {
        let mut operation = self.backend.submit(prompt, &self.settings, api_key).await?;
        logi(format!("Render submitted: {}", operation.name));
        if self.policy.max_polls.is_none() && !operation.done {
            logi("Polling without an attempt limit until the backend finishes.");
        }

        let mut polls: u32 = 0;
        while !operation.done {
            if let Some(max) = self.policy.max_polls {
                if polls >= max {
                    return Err(StudioError::Remote(format!(
                        "Video generation did not finish after {} status checks.",
                        polls
                    )));
                }
            }
            sleep(self.policy.interval).await;
            operation = self.backend.poll(&operation, api_key).await?;
            polls += 1;
        }
        logi(format!("Render finished after {} status checks", polls));

        if let Some(message) = operation.error {
            let message = if message.trim().is_empty() {
                OPERATION_FAILED.to_string()
            } else {
                message
            };
            return Err(StudioError::Remote(message));
        }

        let uri = operation
            .video_uri
            .filter(|uri| !uri.is_empty())
            .ok_or_else(|| StudioError::Remote(NO_DOWNLOAD_LINK.into()))?;

        let bytes = self.backend.download(&uri, api_key).await?;
        let handle = self.media.materialize(&bytes)?;
        logok(format!(
            "Video stored: {} ({} bytes)",
            handle.path().display(),
            handle.size()
        ));
        Ok(handle)
    }
}

/// Maps raw backend failures onto the user-facing taxonomy.
fn classify_failure(model: &str, err: StudioError) -> StudioError {
    let classified = match err {
        StudioError::Auth(_) => StudioError::Auth(VEO_KEY_INVALID.into()),
        StudioError::Remote(message) if is_invalid_key(&message) => {
            StudioError::Auth(VEO_KEY_INVALID.into())
        }
        StudioError::Remote(message) if is_not_found(&message) => StudioError::NotFound(format!(
            "The video model '{model}' was not found. It may be incorrect or unavailable in your region."
        )),
        StudioError::Remote(message) => StudioError::Remote(format!("Gemini API Error: {message}")),
        other => other,
    };
    logw(format!("Error generating video: {}", classified));
    classified
}
