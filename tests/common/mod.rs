#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use pinn_studio::StudioError;
use pinn_studio::generator::SceneBackend;
use pinn_studio::media::MediaStore;
use pinn_studio::queue::GeneratingSignal;
use pinn_studio::render::{PollPolicy, RenderBackend, RenderOperation, RenderSettings, VideoRenderer};

pub const SCENE_JSON: &str = r#"{"scene":{"id":1,"setting":"studio"}}"#;

/// Text backend that answers every prompt with a numbered scene and keeps
/// the prompts it received.
#[derive(Default)]
pub struct EchoSceneBackend {
    pub prompts: Mutex<Vec<String>>,
    /// Scene number (1-based call count) that fails with an invalid key.
    pub reject_key_at: Option<usize>,
}

impl EchoSceneBackend {
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl SceneBackend for EchoSceneBackend {
    async fn generate_scene(
        &self,
        _model: &str,
        prompt: &str,
        _api_key: &str,
    ) -> Result<String, StudioError> {
        let mut prompts = self.prompts.lock().unwrap();
        prompts.push(prompt.to_string());
        let call = prompts.len();
        if self.reject_key_at == Some(call) {
            return Err(StudioError::Remote(
                "HTTP 400: API key not valid. Please pass a valid API key.".into(),
            ));
        }
        Ok(format!(
            r#"{{"scene":{{"id":{call},"character":{{"name":"Pip","consistent_features":["green scarf"]}}}}}}"#
        ))
    }
}

#[derive(Debug, Clone)]
pub enum DownloadBehavior {
    Bytes(Vec<u8>),
    Fail(String),
}

/// Video backend with scripted completion and call counters.
pub struct MockRenderBackend {
    /// Poll count at which the operation reports `done`; `None` never does.
    pub done_after_polls: Option<usize>,
    pub operation_error: Option<String>,
    pub submit_error: Option<String>,
    pub download: DownloadBehavior,
    pub submits: AtomicUsize,
    pub polls: AtomicUsize,
    pub downloads: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
    /// While set, operations never report `done`.
    pub held: AtomicBool,
    /// Flag sampled on every poll once installed.
    pub watch: OnceLock<GeneratingSignal>,
    pub flags_seen: Mutex<Vec<bool>>,
}

impl MockRenderBackend {
    pub fn held() -> Self {
        Self {
            held: AtomicBool::new(true),
            ..Self::succeeding()
        }
    }

    pub fn succeeding() -> Self {
        Self {
            done_after_polls: Some(2),
            operation_error: None,
            submit_error: None,
            download: DownloadBehavior::Bytes(b"mp4-bytes".to_vec()),
            submits: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
            downloads: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            held: AtomicBool::new(false),
            watch: OnceLock::new(),
            flags_seen: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
            + self.polls.load(Ordering::SeqCst)
            + self.downloads.load(Ordering::SeqCst)
    }

    pub fn submits(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn release(&self) {
        self.held.store(false, Ordering::SeqCst);
    }

    pub fn flags_seen(&self) -> Vec<bool> {
        self.flags_seen.lock().unwrap().clone()
    }

    fn operation(&self, polls: usize) -> RenderOperation {
        let done = !self.held.load(Ordering::SeqCst)
            && self.done_after_polls.is_some_and(|n| polls >= n);
        RenderOperation {
            name: "models/veo/operations/test".into(),
            done,
            error: if done { self.operation_error.clone() } else { None },
            video_uri: if done && self.operation_error.is_none() {
                Some("https://files.test/clip:download?alt=media".into())
            } else {
                None
            },
        }
    }
}

#[async_trait]
impl RenderBackend for MockRenderBackend {
    async fn submit(
        &self,
        prompt: &str,
        settings: &RenderSettings,
        _api_key: &str,
    ) -> Result<RenderOperation, StudioError> {
        assert_eq!(settings.count, 1);
        assert_eq!(settings.aspect_ratio, "9:16");
        self.submits.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(message) = &self.submit_error {
            return Err(StudioError::Remote(message.clone()));
        }
        Ok(self.operation(0))
    }

    async fn poll(
        &self,
        _operation: &RenderOperation,
        _api_key: &str,
    ) -> Result<RenderOperation, StudioError> {
        if let Some(signal) = self.watch.get() {
            self.flags_seen.lock().unwrap().push(signal.get());
        }
        let polls = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(self.operation(polls))
    }

    async fn download(&self, _uri: &str, _api_key: &str) -> Result<Vec<u8>, StudioError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        match &self.download {
            DownloadBehavior::Bytes(bytes) => Ok(bytes.clone()),
            DownloadBehavior::Fail(status) => Err(StudioError::Remote(format!(
                "Failed to download video file. Status: {status}"
            ))),
        }
    }

    fn model(&self) -> &str {
        "veo-test"
    }
}

pub fn fast_policy(max_polls: Option<u32>) -> PollPolicy {
    PollPolicy {
        interval: Duration::from_millis(1),
        max_polls,
    }
}

pub fn renderer(
    backend: MockRenderBackend,
    media: &std::path::Path,
    max_polls: Option<u32>,
) -> VideoRenderer<MockRenderBackend> {
    VideoRenderer::new(
        backend,
        RenderSettings::default(),
        fast_policy(max_polls),
        MediaStore::new(media),
    )
}
