use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::logi;
use crate::render::PollPolicy;

pub const DEFAULT_CONFIG_PATH: &str = "studio.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Candidate text models, tried in order for every scene.
    #[serde(default = "default_text_models")]
    pub text_models: Vec<String>,
    #[serde(default = "default_video_model")]
    pub video_model: String,
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// `None` polls until the backend reports completion.
    #[serde(default)]
    pub max_polls: Option<u32>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_dialogue_language")]
    pub dialogue_language: String,
    #[serde(default = "default_media_dir")]
    pub media_dir: PathBuf,
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,
}

fn default_api_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_text_models() -> Vec<String> {
    vec!["gemini-2.5-flash".to_string()]
}

fn default_video_model() -> String {
    "veo-3.0-fast-generate-001".to_string()
}

fn default_aspect_ratio() -> String {
    "9:16".to_string()
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    300
}

fn default_dialogue_language() -> String {
    "Bahasa Indonesia".to_string()
}

fn default_media_dir() -> PathBuf {
    PathBuf::from(".pinn/media")
}

fn default_export_dir() -> PathBuf {
    PathBuf::from("exports")
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from(".pinn/credentials.json")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            text_models: default_text_models(),
            video_model: default_video_model(),
            aspect_ratio: default_aspect_ratio(),
            poll_interval_secs: default_poll_interval_secs(),
            max_polls: None,
            request_timeout_secs: default_request_timeout_secs(),
            dialogue_language: default_dialogue_language(),
            media_dir: default_media_dir(),
            export_dir: default_export_dir(),
            credentials_path: default_credentials_path(),
        }
    }
}

impl Config {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.as_ref().display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` when it exists, otherwise falls back to defaults.
    pub async fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if fs::metadata(&path).await.is_ok() {
            return Self::load(path).await;
        }
        logi(format!(
            "No config at {}; using defaults.",
            path.as_ref().display()
        ));
        Ok(Self::default())
    }

    fn validate(&self) -> Result<()> {
        if self.text_models.is_empty() {
            anyhow::bail!("studio.json: text_models must list at least one model");
        }
        if self.video_model.trim().is_empty() {
            anyhow::bail!("studio.json: video_model missing");
        }
        if self.poll_interval_secs == 0 {
            anyhow::bail!("studio.json: poll_interval_secs must be positive");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("studio.json: request_timeout_secs must be positive");
        }
        Ok(())
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(self.poll_interval_secs),
            max_polls: self.max_polls,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
