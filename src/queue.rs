use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;

use crate::error::StudioError;
use crate::jobs::{JobId, JobPatch, JobRegistry, JobState, JobStatus};
use crate::render::{RenderBackend, VideoRenderer};
use crate::scene::validate_prompt;
use crate::{logi, logok, logw};

const VEO_KEY_MISSING: &str = "VEO API Key is not configured in the Setup tab.";

/// Read-only view of the queue's "is generating" flag.
#[derive(Debug, Clone, Default)]
pub struct GeneratingSignal(Arc<AtomicBool>);

impl GeneratingSignal {
    pub fn get(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Clears the flag when a run ends, however it ends.
struct GeneratingGuard(Arc<AtomicBool>);

impl Drop for GeneratingGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub rendered: usize,
    pub failed: usize,
    /// Jobs already in `success`, or with an empty prompt.
    pub skipped: usize,
}

/// What happened to a single job in the render workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Rendered,
    Failed,
    Skipped,
}

/// Shared handle on the job registry and its renderer. Clones point at the
/// same jobs, so prompts can be edited while a run is in flight. The
/// registry lock is never held across an await.
pub struct RenderQueue<B> {
    registry: Arc<Mutex<JobRegistry>>,
    renderer: Arc<VideoRenderer<B>>,
    generating: Arc<AtomicBool>,
}

impl<B> Clone for RenderQueue<B> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            renderer: Arc::clone(&self.renderer),
            generating: Arc::clone(&self.generating),
        }
    }
}

impl<B: RenderBackend> RenderQueue<B> {
    pub fn new(renderer: VideoRenderer<B>) -> Self {
        Self {
            registry: Arc::new(Mutex::new(JobRegistry::new())),
            renderer: Arc::new(renderer),
            generating: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Locks the registry. Keep the guard out of any `.await`.
    pub fn registry(&self) -> MutexGuard<'_, JobRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn renderer(&self) -> &VideoRenderer<B> {
        &self.renderer
    }

    pub fn is_generating(&self) -> bool {
        self.generating.load(Ordering::SeqCst)
    }

    pub fn generating_signal(&self) -> GeneratingSignal {
        GeneratingSignal(Arc::clone(&self.generating))
    }

    /// Renders every job not already in `success`, in registry order.
    /// An invalid key aborts the rest of the batch.
    pub async fn generate_all(&self, api_key: &str) -> Result<BatchReport, StudioError> {
        let guard = self.begin()?;
        self.run_all(api_key, guard).await
    }

    /// Re-renders one job whatever its current status. Returns `None` when
    /// the id is unknown.
    pub async fn regenerate(
        &self,
        id: JobId,
        api_key: &str,
    ) -> Result<Option<JobOutcome>, StudioError> {
        if self.registry().get(id).is_none() {
            return Ok(None);
        }
        let _guard = self.begin()?;
        self.process_job(id, api_key).await.map(Some)
    }

    /// Claims the generating flag now and renders the batch on a tokio
    /// task. Fails at once when another run holds the flag.
    pub fn spawn_generate_all(
        &self,
        api_key: &str,
    ) -> Result<JoinHandle<Result<BatchReport, StudioError>>, StudioError>
    where
        B: 'static,
    {
        let guard = self.begin()?;
        let queue = self.clone();
        let key = api_key.to_string();
        Ok(tokio::spawn(async move { queue.run_all(&key, guard).await }))
    }

    /// Task form of [`RenderQueue::regenerate`], with the flag claimed up front.
    pub fn spawn_regenerate(
        &self,
        id: JobId,
        api_key: &str,
    ) -> Result<JoinHandle<Result<Option<JobOutcome>, StudioError>>, StudioError>
    where
        B: 'static,
    {
        if self.registry().get(id).is_none() {
            return Ok(tokio::spawn(async { Ok(None) }));
        }
        let guard = self.begin()?;
        let queue = self.clone();
        let key = api_key.to_string();
        Ok(tokio::spawn(async move {
            let _guard = guard;
            queue.process_job(id, &key).await.map(Some)
        }))
    }

    fn begin(&self) -> Result<GeneratingGuard, StudioError> {
        if self.generating.swap(true, Ordering::SeqCst) {
            return Err(StudioError::Validation(
                "A render run is already in progress.".into(),
            ));
        }
        Ok(GeneratingGuard(Arc::clone(&self.generating)))
    }

    async fn run_all(
        &self,
        api_key: &str,
        _guard: GeneratingGuard,
    ) -> Result<BatchReport, StudioError> {
        let ids: Vec<JobId> = self.registry().jobs().iter().map(|job| job.id).collect();
        logi(format!("Rendering batch of {} jobs", ids.len()));

        let mut report = BatchReport::default();
        for id in ids {
            let status = self.registry().get(id).map(|job| job.status());
            match status {
                None => continue,
                Some(JobStatus::Success) => {
                    report.skipped += 1;
                    continue;
                }
                Some(_) => {}
            }
            match self.process_job(id, api_key).await? {
                JobOutcome::Rendered => report.rendered += 1,
                JobOutcome::Failed => report.failed += 1,
                JobOutcome::Skipped => report.skipped += 1,
            }
        }

        logok(format!(
            "Batch done: {} rendered, {} failed, {} skipped",
            report.rendered, report.failed, report.skipped
        ));
        Ok(report)
    }

    /// Runs the render workflow for one job. Only an auth failure is
    /// returned as `Err`; every other failure lands on the job itself.
    async fn process_job(&self, id: JobId, api_key: &str) -> Result<JobOutcome, StudioError> {
        let prompt = match self.registry().get(id) {
            Some(job) => job.prompt.clone(),
            None => return Ok(JobOutcome::Skipped),
        };

        if api_key.trim().is_empty() {
            self.set_state(id, JobState::Error(VEO_KEY_MISSING.into()));
            return Ok(JobOutcome::Failed);
        }
        if prompt.trim().is_empty() {
            logi(format!("Job {} has no prompt; skipping", id));
            return Ok(JobOutcome::Skipped);
        }
        if let Err(err) = validate_prompt(&prompt) {
            self.set_state(id, JobState::Error(err.to_string()));
            return Ok(JobOutcome::Failed);
        }

        self.set_state(id, JobState::Generating);
        match self.renderer.render(&prompt, api_key).await {
            Ok(video) => {
                self.set_state(id, JobState::Success(Arc::new(video)));
                Ok(JobOutcome::Rendered)
            }
            Err(err) => {
                logw(format!("Generation failed for job {}: {}", id, err));
                self.set_state(id, JobState::Error(err.to_string()));
                if err.is_auth() {
                    return Err(err);
                }
                Ok(JobOutcome::Failed)
            }
        }
    }

    fn set_state(&self, id: JobId, state: JobState) {
        self.registry().update(id, JobPatch::state(state));
    }
}
