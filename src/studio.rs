use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::{Arc, MutexGuard};
use tokio::task::JoinHandle;

use crate::api::gemini::GeminiClient;
use crate::api::veo::VeoClient;
use crate::config::Config;
use crate::credentials::{CredentialStore, Credentials, FileCredentialStore};
use crate::error::StudioError;
use crate::generator::{GenerationRequest, SceneBackend, ScriptGenerator};
use crate::jobs::{JobId, JobRegistry};
use crate::media::{MediaStore, export_file_name};
use crate::queue::{BatchReport, GeneratingSignal, JobOutcome, RenderQueue};
use crate::render::{RenderBackend, RenderSettings, VideoRenderer};
use crate::{logi, logok};

/// One working session: keys, scene generator and render queue.
pub struct Studio<S, R> {
    config: Config,
    store: Box<dyn CredentialStore>,
    credentials: Credentials,
    generator: Arc<ScriptGenerator<S>>,
    queue: RenderQueue<R>,
}

impl Studio<GeminiClient, VeoClient> {
    /// Wires the HTTP backends from `config` and reads the saved keys.
    pub fn open(config: Config) -> Result<Self> {
        let timeout = config.request_timeout();
        let gemini = GeminiClient::new(&config.api_base, &config.dialogue_language, timeout)?;
        let veo = VeoClient::new(&config.api_base, &config.video_model, timeout)?;
        let store = Box::new(FileCredentialStore::new(&config.credentials_path));
        Self::with_backends(config, store, gemini, veo)
    }
}

impl<S: SceneBackend, R: RenderBackend> Studio<S, R> {
    pub fn with_backends(
        config: Config,
        store: Box<dyn CredentialStore>,
        scene_backend: S,
        render_backend: R,
    ) -> Result<Self> {
        let credentials = store
            .load_credentials()
            .context("Failed to load saved API keys")?;

        let generator = Arc::new(ScriptGenerator::new(
            scene_backend,
            config.text_models.clone(),
            config.dialogue_language.clone(),
        ));
        let settings = RenderSettings {
            count: 1,
            aspect_ratio: config.aspect_ratio.clone(),
        };
        let renderer = VideoRenderer::new(
            render_backend,
            settings,
            config.poll_policy(),
            MediaStore::new(&config.media_dir),
        );

        Ok(Self {
            config,
            store,
            credentials,
            generator,
            queue: RenderQueue::new(renderer),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn save_credentials(&mut self, credentials: Credentials) -> Result<()> {
        self.store.save_credentials(&credentials)?;
        self.credentials = credentials;
        logok("API keys saved.");
        Ok(())
    }

    /// Locks the job list. Drop the guard before awaiting anything.
    pub fn registry(&self) -> MutexGuard<'_, JobRegistry> {
        self.queue.registry()
    }

    /// A handle on the same jobs, for running renders off the caller's task.
    pub fn queue(&self) -> RenderQueue<R> {
        self.queue.clone()
    }

    pub fn generating_signal(&self) -> GeneratingSignal {
        self.queue.generating_signal()
    }

    pub async fn generate_scenes(
        &self,
        request: &GenerationRequest,
    ) -> Result<Vec<String>, StudioError> {
        self.generator
            .generate(request, &self.credentials.gemini_api_key)
            .await
    }

    /// Writes scenes on a tokio task with the Gemini key saved right now.
    pub fn spawn_generate_scenes(
        &self,
        request: GenerationRequest,
    ) -> JoinHandle<Result<Vec<String>, StudioError>>
    where
        S: 'static,
    {
        let generator = Arc::clone(&self.generator);
        let key = self.credentials.gemini_api_key.clone();
        tokio::spawn(async move { generator.generate(&request, &key).await })
    }

    /// Replaces the job list with one idle job per generated scene.
    pub fn use_scenes(&self, scenes: Vec<String>) -> Vec<JobId> {
        let ids = self.queue.registry().replace_all(scenes);
        logi(format!("Loaded {} scenes into the dashboard", ids.len()));
        ids
    }

    pub async fn generate_all(&self) -> Result<BatchReport, StudioError> {
        self.queue.generate_all(&self.credentials.veo_api_key).await
    }

    pub async fn regenerate(&self, id: JobId) -> Result<Option<JobOutcome>, StudioError> {
        self.queue.regenerate(id, &self.credentials.veo_api_key).await
    }

    /// Starts a batch render on a tokio task. The generating flag is set
    /// before this returns, so a second call is rejected immediately.
    pub fn spawn_generate_all(
        &self,
    ) -> Result<JoinHandle<Result<BatchReport, StudioError>>, StudioError>
    where
        R: 'static,
    {
        self.queue.spawn_generate_all(&self.credentials.veo_api_key)
    }

    pub fn spawn_regenerate(
        &self,
        id: JobId,
    ) -> Result<JoinHandle<Result<Option<JobOutcome>, StudioError>>, StudioError>
    where
        R: 'static,
    {
        self.queue.spawn_regenerate(id, &self.credentials.veo_api_key)
    }

    /// Copies a rendered job to `<export_dir>/scene_<n>.mp4`.
    pub fn export(&self, id: JobId) -> Result<PathBuf> {
        let (video, scene) = {
            let registry = self.queue.registry();
            let job = registry
                .get(id)
                .with_context(|| format!("Unknown job {}", id))?;
            let video = job
                .video()
                .cloned()
                .with_context(|| format!("Job {} has no rendered video", id))?;
            (video, registry.scene_number(id).unwrap_or(1))
        };
        let dest = self.config.export_dir.join(export_file_name(scene));
        let written = video.export(&dest)?;
        logok(format!("Exported scene {} -> {}", scene, written.display()));
        Ok(written)
    }

    /// Exports every rendered job, returning the written paths.
    pub fn export_all(&self) -> Result<Vec<PathBuf>> {
        let ids: Vec<JobId> = self
            .queue
            .registry()
            .jobs()
            .iter()
            .filter(|job| job.video().is_some())
            .map(|job| job.id)
            .collect();
        ids.into_iter().map(|id| self.export(id)).collect()
    }
}
