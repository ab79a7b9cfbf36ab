//! Render client and batch queue against a scripted video backend.

mod common;

use common::{DownloadBehavior, MockRenderBackend, SCENE_JSON, renderer};
use pinn_studio::StudioError;
use pinn_studio::jobs::{JobId, JobPatch, JobState, JobStatus};
use pinn_studio::queue::{JobOutcome, RenderQueue};
use std::time::Duration;

async fn wait_for_status(queue: &RenderQueue<MockRenderBackend>, id: JobId, want: JobStatus) {
    for _ in 0..5_000 {
        let status = queue.registry().get(id).map(|job| job.status());
        if status == Some(want) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("job {id} never reached {want}");
}

#[tokio::test]
async fn render_polls_until_done_then_stores_clip() {
    let dir = tempfile::tempdir().unwrap();
    let renderer = renderer(MockRenderBackend::succeeding(), dir.path(), None);

    let video = renderer.render(SCENE_JSON, "key").await.unwrap();
    assert_eq!(std::fs::read(video.path()).unwrap(), b"mp4-bytes");
    assert_eq!(renderer.backend().submits(), 1);
    assert_eq!(renderer.backend().polls(), 2);
    assert_eq!(renderer.backend().prompts.lock().unwrap()[0], SCENE_JSON);
}

#[tokio::test]
async fn never_finishing_operation_keeps_polling_until_the_cap() {
    let dir = tempfile::tempdir().unwrap();
    let backend = MockRenderBackend {
        done_after_polls: None,
        ..MockRenderBackend::succeeding()
    };
    let renderer = renderer(backend, dir.path(), Some(25));

    let err = renderer.render(SCENE_JSON, "key").await.unwrap_err();
    assert!(matches!(err, StudioError::Remote(ref m) if m.contains("25 status checks")));
    assert_eq!(renderer.backend().polls(), 25);
    assert_eq!(renderer.backend().downloads.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unbounded_policy_waits_for_a_slow_operation() {
    let dir = tempfile::tempdir().unwrap();
    let backend = MockRenderBackend {
        done_after_polls: Some(40),
        ..MockRenderBackend::succeeding()
    };
    let renderer = renderer(backend, dir.path(), None);

    assert!(renderer.render(SCENE_JSON, "key").await.is_ok());
    assert_eq!(renderer.backend().polls(), 40);
}

#[tokio::test]
async fn operation_error_surfaces_its_message() {
    let dir = tempfile::tempdir().unwrap();
    let backend = MockRenderBackend {
        operation_error: Some("prompt rejected by safety filter".into()),
        ..MockRenderBackend::succeeding()
    };
    let renderer = renderer(backend, dir.path(), None);

    let err = renderer.render(SCENE_JSON, "key").await.unwrap_err();
    assert_eq!(err.to_string(), "Gemini API Error: prompt rejected by safety filter");
}

#[tokio::test]
async fn missing_model_maps_to_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let backend = MockRenderBackend {
        submit_error: Some(r#"HTTP 404: {"error":{"code":404,"status":"NOT_FOUND"}}"#.into()),
        ..MockRenderBackend::succeeding()
    };
    let renderer = renderer(backend, dir.path(), None);

    let err = renderer.render(SCENE_JSON, "key").await.unwrap_err();
    assert!(matches!(err, StudioError::NotFound(ref m) if m.contains("veo-test")));
}

#[tokio::test]
async fn failed_download_marks_job_error_without_video() {
    let dir = tempfile::tempdir().unwrap();
    let backend = MockRenderBackend {
        download: DownloadBehavior::Fail("Forbidden".into()),
        ..MockRenderBackend::succeeding()
    };
    let queue = RenderQueue::new(renderer(backend, dir.path(), None));
    let id = queue.registry().add_with_prompt(SCENE_JSON).unwrap();

    let outcome = queue.regenerate(id, "key").await.unwrap();
    assert_eq!(outcome, Some(JobOutcome::Failed));

    let registry = queue.registry();
    let job = registry.get(id).unwrap();
    assert_eq!(job.status(), JobStatus::Error);
    assert!(job.video().is_none());
    assert!(job.error().unwrap().contains("Failed to download video file. Status: Forbidden"));
}

#[tokio::test]
async fn malformed_prompt_never_reaches_the_backend() {
    let dir = tempfile::tempdir().unwrap();
    let queue = RenderQueue::new(renderer(MockRenderBackend::succeeding(), dir.path(), None));
    let id = queue.registry().add_with_prompt("{ not json").unwrap();

    let report = queue.generate_all("key").await.unwrap();
    assert_eq!(report.failed, 1);

    let registry = queue.registry();
    let job = registry.get(id).unwrap();
    assert_eq!(job.status(), JobStatus::Error);
    assert_eq!(job.error(), Some("Invalid JSON format."));
    assert_eq!(queue.renderer().backend().calls(), 0);
}

#[tokio::test]
async fn missing_key_fails_jobs_without_calls() {
    let dir = tempfile::tempdir().unwrap();
    let queue = RenderQueue::new(renderer(MockRenderBackend::succeeding(), dir.path(), None));
    let first = queue.registry().add_with_prompt(SCENE_JSON).unwrap();
    let second = queue.registry().add_with_prompt(SCENE_JSON).unwrap();

    let report = queue.generate_all("").await.unwrap();
    assert_eq!(report.failed, 2);
    for id in [first, second] {
        let registry = queue.registry();
        assert_eq!(
            registry.get(id).unwrap().error(),
            Some("VEO API Key is not configured in the Setup tab.")
        );
    }
    assert_eq!(queue.renderer().backend().calls(), 0);
}

#[tokio::test]
async fn generate_all_skips_success_but_regenerate_does_not() {
    let dir = tempfile::tempdir().unwrap();
    let queue = RenderQueue::new(renderer(MockRenderBackend::succeeding(), dir.path(), None));
    let done = queue.registry().add_with_prompt(SCENE_JSON).unwrap();
    let blank = queue.registry().add().unwrap();

    let first = queue.generate_all("key").await.unwrap();
    assert_eq!(first.rendered, 1);
    assert_eq!(first.skipped, 1);
    assert_eq!(queue.registry().get(done).unwrap().status(), JobStatus::Success);
    assert_eq!(queue.registry().get(blank).unwrap().status(), JobStatus::Idle);
    assert_eq!(queue.renderer().backend().submits(), 1);

    let second = queue.generate_all("key").await.unwrap();
    assert_eq!(second.rendered, 0);
    assert_eq!(queue.renderer().backend().submits(), 1);

    let old_clip = queue.registry().get(done).unwrap().video().unwrap().path().to_path_buf();
    let outcome = queue.regenerate(done, "key").await.unwrap();
    assert_eq!(outcome, Some(JobOutcome::Rendered));
    assert_eq!(queue.renderer().backend().submits(), 2);
    assert!(!old_clip.exists(), "superseded clip should be released");
    assert!(!queue.is_generating());
}

#[tokio::test]
async fn per_job_failures_do_not_stop_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let queue = RenderQueue::new(renderer(MockRenderBackend::succeeding(), dir.path(), None));
    let bad = queue.registry().add_with_prompt("nope").unwrap();
    let good = queue.registry().add_with_prompt(SCENE_JSON).unwrap();
    let events = queue.registry().subscribe();

    let report = queue.generate_all("key").await.unwrap();
    assert_eq!((report.rendered, report.failed), (1, 1));
    assert_eq!(queue.registry().get(bad).unwrap().status(), JobStatus::Error);
    assert_eq!(queue.registry().get(good).unwrap().status(), JobStatus::Success);

    let statuses: Vec<JobStatus> = events
        .try_iter()
        .filter_map(|event| match event {
            pinn_studio::jobs::RegistryEvent::Updated(job) if job.id == good => Some(job.status()),
            _ => None,
        })
        .collect();
    assert_eq!(statuses, vec![JobStatus::Generating, JobStatus::Success]);
}

#[tokio::test]
async fn invalid_key_aborts_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let backend = MockRenderBackend {
        submit_error: Some("HTTP 400: API key not valid. Please pass a valid API key.".into()),
        ..MockRenderBackend::succeeding()
    };
    let queue = RenderQueue::new(renderer(backend, dir.path(), None));
    let first = queue.registry().add_with_prompt(SCENE_JSON).unwrap();
    let second = queue.registry().add_with_prompt(SCENE_JSON).unwrap();

    let err = queue.generate_all("bad-key").await.unwrap_err();
    assert!(err.is_auth());
    assert_eq!(queue.registry().get(first).unwrap().status(), JobStatus::Error);
    assert_eq!(queue.registry().get(second).unwrap().status(), JobStatus::Idle);
    assert_eq!(queue.renderer().backend().submits(), 1);
    assert!(!queue.is_generating());
}

#[tokio::test]
async fn regenerate_recovers_an_errored_job() {
    let dir = tempfile::tempdir().unwrap();
    let queue = RenderQueue::new(renderer(MockRenderBackend::succeeding(), dir.path(), None));
    let id = queue.registry().add_with_prompt(SCENE_JSON).unwrap();
    queue
        .registry()
        .update(id, JobPatch::state(JobState::Error("earlier failure".into())));

    assert_eq!(queue.regenerate(id, "key").await.unwrap(), Some(JobOutcome::Rendered));
    {
        let registry = queue.registry();
        let job = registry.get(id).unwrap();
        assert!(job.error().is_none());
        assert!(job.video().is_some());
    }

    let unknown = JobId::new();
    assert_eq!(queue.regenerate(unknown, "key").await.unwrap(), None);
}

#[tokio::test]
async fn prompts_stay_editable_while_a_batch_renders() {
    let dir = tempfile::tempdir().unwrap();
    let queue = RenderQueue::new(renderer(MockRenderBackend::held(), dir.path(), None));
    let first = queue.registry().add_with_prompt(SCENE_JSON).unwrap();
    let second = queue.registry().add_with_prompt(SCENE_JSON).unwrap();

    let batch = queue.spawn_generate_all("key").unwrap();
    wait_for_status(&queue, first, JobStatus::Generating).await;

    let edited = r#"{"scene":{"id":2,"setting":"rooftop"}}"#;
    assert!(queue.registry().set_prompt(second, edited));
    {
        let registry = queue.registry();
        assert_eq!(registry.get(second).unwrap().prompt, edited);
        assert_eq!(registry.get(first).unwrap().status(), JobStatus::Generating);
    }
    let added = queue.registry().add();
    assert!(added.is_some());

    queue.renderer().backend().release();
    let report = batch.await.unwrap().unwrap();
    assert_eq!(report.rendered, 2);
    assert_eq!(
        *queue.renderer().backend().prompts.lock().unwrap(),
        vec![SCENE_JSON.to_string(), edited.to_string()]
    );
}

#[tokio::test]
async fn generating_flag_is_raised_for_the_whole_run_and_blocks_a_second() {
    let dir = tempfile::tempdir().unwrap();
    let queue = RenderQueue::new(renderer(MockRenderBackend::held(), dir.path(), None));
    let signal = queue.generating_signal();
    queue.renderer().backend().watch.set(signal.clone()).unwrap();
    let id = queue.registry().add_with_prompt(SCENE_JSON).unwrap();

    let batch = queue.spawn_generate_all("key").unwrap();
    assert!(signal.get(), "flag is claimed when the run is dispatched");

    let err = queue.generate_all("key").await.unwrap_err();
    assert!(matches!(err, StudioError::Validation(ref m) if m.contains("already in progress")));
    assert!(matches!(
        queue.spawn_regenerate(id, "key"),
        Err(StudioError::Validation(_))
    ));

    wait_for_status(&queue, id, JobStatus::Generating).await;
    queue.renderer().backend().release();
    batch.await.unwrap().unwrap();

    let seen = queue.renderer().backend().flags_seen();
    assert!(!seen.is_empty());
    assert!(seen.iter().all(|flag| *flag));
    assert!(!signal.get());
    assert_eq!(queue.renderer().backend().submits(), 1);
}
