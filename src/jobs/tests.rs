use super::*;
use crate::client::{CredentialSelector, RetryingApiClient};
use crate::env;
use crate::service::GenerationService;
use crate::service::types::{
    Artifact, GenerationError, GenerationRequest, GenerationResponse, JobHandle, JobStatus,
    OperationKind,
};
use futures::future::BoxFuture;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct AcceptingSelector {
    calls: AtomicU32,
}

impl CredentialSelector for AcceptingSelector {
    fn select_credential(&self) -> BoxFuture<'_, Result<(), GenerationError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Ok(()) })
    }
}

/// Job service replaying scripted poll outcomes
struct ScriptedJobs {
    statuses: Mutex<VecDeque<Result<JobStatus, GenerationError>>>,
    fetch_result: Result<Artifact, GenerationError>,
    submits: AtomicU32,
    polls: AtomicU32,
    fetches: AtomicU32,
}

impl ScriptedJobs {
    fn new(statuses: Vec<Result<JobStatus, GenerationError>>) -> Arc<Self> {
        Self::with_fetch(statuses, Ok(video()))
    }

    fn with_fetch(
        statuses: Vec<Result<JobStatus, GenerationError>>,
        fetch_result: Result<Artifact, GenerationError>,
    ) -> Arc<Self> {
        Arc::new(Self {
            statuses: Mutex::new(statuses.into()),
            fetch_result,
            submits: AtomicU32::new(0),
            polls: AtomicU32::new(0),
            fetches: AtomicU32::new(0),
        })
    }

    fn counts(&self) -> (u32, u32, u32) {
        (
            self.submits.load(Ordering::SeqCst),
            self.polls.load(Ordering::SeqCst),
            self.fetches.load(Ordering::SeqCst),
        )
    }
}

impl GenerationService for ScriptedJobs {
    fn generate(
        &self,
        _request: GenerationRequest,
    ) -> BoxFuture<'_, Result<GenerationResponse, GenerationError>> {
        Box::pin(async { Err(GenerationError::InvalidRequest("jobs only".into())) })
    }

    fn submit_job(
        &self,
        _request: GenerationRequest,
    ) -> BoxFuture<'_, Result<JobHandle, GenerationError>> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Ok(JobHandle::new("job-1")) })
    }

    fn poll_job(&self, _handle: JobHandle) -> BoxFuture<'_, Result<JobStatus, GenerationError>> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(running()));
        Box::pin(async move { next })
    }

    fn fetch_job_result(
        &self,
        _handle: JobHandle,
    ) -> BoxFuture<'_, Result<Artifact, GenerationError>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let result = self.fetch_result.clone();
        Box::pin(async move { result })
    }

    fn service_name(&self) -> &'static str {
        "scripted"
    }
}

fn running() -> JobStatus {
    JobStatus {
        done: false,
        error: None,
    }
}

fn done() -> JobStatus {
    JobStatus {
        done: true,
        error: None,
    }
}

fn video() -> Artifact {
    Artifact::new("dmlkZW8=", "video/mp4")
}

fn poller_for(
    service: Arc<ScriptedJobs>,
    config: PollerConfig,
) -> (LongRunningJobPoller, Arc<AcceptingSelector>) {
    let selector = Arc::new(AcceptingSelector {
        calls: AtomicU32::new(0),
    });
    let client = Arc::new(RetryingApiClient::new(selector.clone()));
    (LongRunningJobPoller::new(service, client, config), selector)
}

fn config(max_polls: Option<u32>) -> PollerConfig {
    PollerConfig {
        interval_ms: 1_000,
        max_polls,
    }
}

fn request() -> GenerationRequest {
    let mut request = GenerationRequest::new(OperationKind::Animate, "waves rolling in");
    request.images = vec![Artifact::new("base", env::test::TEST_MEDIA_TYPE)];
    request
}

fn phases() -> Vec<String> {
    vec!["warming up".to_string(), "rendering".to_string()]
}

#[tokio::test(start_paused = true)]
async fn test_job_completes_with_rotating_progress() {
    let service = ScriptedJobs::new(vec![Ok(running()), Ok(running()), Ok(done())]);
    let (poller, _) = poller_for(service.clone(), config(None));
    let mut seen = Vec::new();

    let started = tokio::time::Instant::now();
    let artifact = poller
        .start(request(), &phases(), |p| seen.push(p), &CancelFlag::new())
        .await
        .unwrap();

    assert_eq!(artifact, video());
    assert_eq!(service.counts(), (1, 3, 1));
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(3) && elapsed < Duration::from_secs(4));

    let states: Vec<JobState> = seen.iter().map(|p| p.state).collect();
    assert_eq!(
        states,
        vec![
            JobState::Submitted,
            JobState::Polling,
            JobState::Polling,
            JobState::Completed
        ]
    );
    let phases_seen: Vec<&str> = seen.iter().map(|p| p.phase.as_str()).collect();
    assert_eq!(
        phases_seen,
        vec!["warming up", "rendering", "warming up", "rendering"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancel_before_first_tick() {
    let service = ScriptedJobs::new(vec![Ok(done())]);
    let (poller, _) = poller_for(service.clone(), config(None));
    let cancel = CancelFlag::new();
    cancel.cancel();

    let result = poller.start(request(), &phases(), |_| {}, &cancel).await;

    assert_eq!(result, Err(GenerationError::Cancelled));
    assert_eq!(service.counts(), (1, 0, 0));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_while_polling() {
    let service = ScriptedJobs::new(Vec::new());
    let (poller, _) = poller_for(service.clone(), config(None));
    let cancel = CancelFlag::new();
    let trigger = cancel.clone();

    let result = poller
        .start(
            request(),
            &phases(),
            move |p| {
                if p.poll_count == 2 {
                    trigger.cancel();
                }
            },
            &cancel,
        )
        .await;

    assert_eq!(result, Err(GenerationError::Cancelled));
    assert_eq!(service.counts(), (1, 2, 0));
}

#[tokio::test(start_paused = true)]
async fn test_job_error_fails_without_fetch() {
    let failed = JobStatus {
        done: true,
        error: Some("content policy".to_string()),
    };
    let service = ScriptedJobs::new(vec![Ok(running()), Ok(failed)]);
    let (poller, _) = poller_for(service.clone(), config(None));
    let mut last_state = None;

    let result = poller
        .start(request(), &[], |p| last_state = Some(p.state), &CancelFlag::new())
        .await;

    assert_eq!(result, Err(GenerationError::Unknown("content policy".into())));
    assert_eq!(last_state, Some(JobState::Failed));
    assert_eq!(service.counts(), (1, 2, 0));
}

#[tokio::test(start_paused = true)]
async fn test_polling_gives_up_after_max_polls() {
    let service = ScriptedJobs::new(Vec::new());
    let (poller, _) = poller_for(service.clone(), config(Some(4)));

    let result = poller
        .start(request(), &phases(), |_| {}, &CancelFlag::new())
        .await;

    match result {
        Err(GenerationError::NetworkError(message)) => assert!(message.contains("timed out")),
        other => panic!("expected timeout, got {:?}", other),
    }
    assert_eq!(service.counts(), (1, 4, 0));
}

#[tokio::test(start_paused = true)]
async fn test_poll_reauth_is_retried_once_without_resubmit() {
    let service = ScriptedJobs::new(vec![
        Err(GenerationError::PermissionDenied("expired key".into())),
        Ok(done()),
    ]);
    let (poller, selector) = poller_for(service.clone(), config(None));

    let artifact = poller
        .start(request(), &phases(), |_| {}, &CancelFlag::new())
        .await
        .unwrap();

    assert_eq!(artifact, video());
    assert_eq!(selector.calls.load(Ordering::SeqCst), 1);
    assert_eq!(service.counts(), (1, 2, 1));
}

#[tokio::test(start_paused = true)]
async fn test_fetch_failure_does_not_resubmit() {
    let service = ScriptedJobs::with_fetch(
        vec![Ok(done())],
        Err(GenerationError::NetworkError("connection reset".into())),
    );
    let (poller, selector) = poller_for(service.clone(), config(None));

    let result = poller
        .start(request(), &phases(), |_| {}, &CancelFlag::new())
        .await;

    assert!(matches!(result, Err(GenerationError::NetworkError(_))));
    assert_eq!(selector.calls.load(Ordering::SeqCst), 0);
    assert_eq!(service.counts(), (1, 1, 1));
}
