use chrono::{DateTime, Utc};
use crossbeam::channel::{self, Receiver, Sender};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::media::VideoHandle;

pub const MAX_JOBS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Idle,
    Generating,
    Success,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Idle => "idle",
            JobStatus::Generating => "generating",
            JobStatus::Success => "success",
            JobStatus::Error => "error",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a job. The video exists only in `Success` and the message
/// only in `Error`.
#[derive(Debug, Clone, Default)]
pub enum JobState {
    #[default]
    Idle,
    Generating,
    Success(Arc<VideoHandle>),
    Error(String),
}

#[derive(Debug, Clone)]
pub struct VideoJob {
    pub id: JobId,
    pub prompt: String,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
}

impl VideoJob {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            id: JobId::new(),
            prompt: prompt.into(),
            state: JobState::Idle,
            created_at: Utc::now(),
        }
    }

    pub fn status(&self) -> JobStatus {
        match self.state {
            JobState::Idle => JobStatus::Idle,
            JobState::Generating => JobStatus::Generating,
            JobState::Success(_) => JobStatus::Success,
            JobState::Error(_) => JobStatus::Error,
        }
    }

    pub fn video(&self) -> Option<&Arc<VideoHandle>> {
        match &self.state {
            JobState::Success(video) => Some(video),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            JobState::Error(message) => Some(message),
            _ => None,
        }
    }
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct JobPatch {
    pub prompt: Option<String>,
    pub state: Option<JobState>,
}

impl JobPatch {
    pub fn prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            state: None,
        }
    }

    pub fn state(state: JobState) -> Self {
        Self {
            prompt: None,
            state: Some(state),
        }
    }
}

#[derive(Debug, Clone)]
pub enum RegistryEvent {
    Added(VideoJob),
    Updated(VideoJob),
    Removed(JobId),
    Replaced(Vec<VideoJob>),
}

/// Ordered set of at most [`MAX_JOBS`] jobs. All mutation goes through its
/// methods, and each one is announced to subscribers.
#[derive(Default)]
pub struct JobRegistry {
    jobs: Vec<VideoJob>,
    subscribers: Vec<Sender<RegistryEvent>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> Receiver<RegistryEvent> {
        let (tx, rx) = channel::unbounded();
        self.subscribers.push(tx);
        rx
    }

    pub fn jobs(&self) -> &[VideoJob] {
        &self.jobs
    }

    pub fn get(&self, id: JobId) -> Option<&VideoJob> {
        self.jobs.iter().find(|job| job.id == id)
    }

    /// 1-based position of a job, as shown to users ("Scene 3").
    pub fn scene_number(&self, id: JobId) -> Option<usize> {
        self.jobs.iter().position(|job| job.id == id).map(|i| i + 1)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.jobs.len() >= MAX_JOBS
    }

    pub fn remaining(&self) -> usize {
        MAX_JOBS.saturating_sub(self.jobs.len())
    }

    /// Adds an idle job with an empty prompt. Returns `None` at capacity.
    pub fn add(&mut self) -> Option<JobId> {
        self.add_with_prompt("")
    }

    pub fn add_with_prompt(&mut self, prompt: impl Into<String>) -> Option<JobId> {
        if self.is_full() {
            return None;
        }
        let job = VideoJob::new(prompt);
        let id = job.id;
        self.jobs.push(job.clone());
        self.emit(RegistryEvent::Added(job));
        Some(id)
    }

    /// Replaces every job with fresh idle jobs, one per prompt.
    pub fn replace_all<I, S>(&mut self, prompts: I) -> Vec<JobId>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.jobs = prompts
            .into_iter()
            .take(MAX_JOBS)
            .map(VideoJob::new)
            .collect();
        let snapshot = self.jobs.clone();
        self.emit(RegistryEvent::Replaced(snapshot));
        self.jobs.iter().map(|job| job.id).collect()
    }

    pub fn remove(&mut self, id: JobId) -> Option<VideoJob> {
        let index = self.jobs.iter().position(|job| job.id == id)?;
        let job = self.jobs.remove(index);
        self.emit(RegistryEvent::Removed(id));
        Some(job)
    }

    /// Merges `patch` into the job. Returns `false` for an unknown id.
    pub fn update(&mut self, id: JobId, patch: JobPatch) -> bool {
        let Some(job) = self.jobs.iter_mut().find(|job| job.id == id) else {
            return false;
        };
        if let Some(prompt) = patch.prompt {
            job.prompt = prompt;
        }
        if let Some(state) = patch.state {
            job.state = state;
        }
        let snapshot = job.clone();
        self.emit(RegistryEvent::Updated(snapshot));
        true
    }

    pub fn set_prompt(&mut self, id: JobId, prompt: impl Into<String>) -> bool {
        self.update(id, JobPatch::prompt(prompt))
    }

    fn emit(&mut self, event: RegistryEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
