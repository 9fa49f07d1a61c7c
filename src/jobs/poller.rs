use crate::client::RetryingApiClient;
use crate::service::GenerationService;
use crate::service::types::{Artifact, GenerationError, GenerationRequest, JobHandle, JobStatus};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    pub interval_ms: u64,
    /// Give up after this many status checks; `None` polls until done
    pub max_polls: Option<u32>,
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_ms: 10_000,
            max_polls: Some(90),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Submitted,
    Polling,
    Completed,
    Failed,
    Cancelled,
}

/// Notification passed to the progress callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobProgress {
    pub phase: String,
    pub poll_count: u32,
    pub state: JobState,
}

/// Cooperative cancellation, checked at every poll boundary
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Drives a submitted job to completion
///
/// `Submitted -> Polling -> {Completed | Failed | Cancelled}`. The job is
/// submitted once and never re-submitted; every individual call goes through
/// the retrying client.
pub struct LongRunningJobPoller {
    service: Arc<dyn GenerationService>,
    client: Arc<RetryingApiClient>,
    config: PollerConfig,
}

impl LongRunningJobPoller {
    pub fn new(
        service: Arc<dyn GenerationService>,
        client: Arc<RetryingApiClient>,
        config: PollerConfig,
    ) -> Self {
        Self {
            service,
            client,
            config,
        }
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    pub async fn start<P>(
        &self,
        request: GenerationRequest,
        phases: &[String],
        mut on_progress: P,
        cancel: &CancelFlag,
    ) -> Result<Artifact, GenerationError>
    where
        P: FnMut(JobProgress) + Send,
    {
        let phase_at = |n: u32| -> String {
            if phases.is_empty() {
                String::new()
            } else {
                phases[n as usize % phases.len()].clone()
            }
        };

        let handle = self.submit(request).await?;
        info!("Job {} submitted", handle.id);
        on_progress(JobProgress {
            phase: phase_at(0),
            poll_count: 0,
            state: JobState::Submitted,
        });

        let mut poll_count: u32 = 0;
        loop {
            tokio::time::sleep(self.config.interval()).await;

            if cancel.is_cancelled() {
                info!("Job {} cancelled after {} polls", handle.id, poll_count);
                on_progress(JobProgress {
                    phase: phase_at(poll_count),
                    poll_count,
                    state: JobState::Cancelled,
                });
                return Err(GenerationError::Cancelled);
            }

            if let Some(max_polls) = self.config.max_polls
                && poll_count >= max_polls
            {
                warn!("Job {} still running after {} polls", handle.id, poll_count);
                return Err(self.fail(
                    &mut on_progress,
                    poll_count,
                    GenerationError::NetworkError(format!(
                        "polling timed out after {} polls",
                        poll_count
                    )),
                ));
            }

            poll_count += 1;
            let status = match self.poll(&handle).await {
                Ok(status) => status,
                Err(error) => return Err(self.fail(&mut on_progress, poll_count, error)),
            };

            if let Some(message) = status.error {
                return Err(self.fail(
                    &mut on_progress,
                    poll_count,
                    GenerationError::Unknown(message),
                ));
            }

            if status.done {
                let artifact = match self.fetch(&handle).await {
                    Ok(artifact) => artifact,
                    Err(error) => return Err(self.fail(&mut on_progress, poll_count, error)),
                };
                info!("Job {} completed after {} polls", handle.id, poll_count);
                on_progress(JobProgress {
                    phase: phase_at(poll_count),
                    poll_count,
                    state: JobState::Completed,
                });
                return Ok(artifact);
            }

            debug!("Job {} still running (poll {})", handle.id, poll_count);
            on_progress(JobProgress {
                phase: phase_at(poll_count),
                poll_count,
                state: JobState::Polling,
            });
        }
    }

    fn fail<P>(&self, on_progress: &mut P, poll_count: u32, error: GenerationError) -> GenerationError
    where
        P: FnMut(JobProgress),
    {
        warn!("Job failed: {}", error);
        on_progress(JobProgress {
            phase: String::new(),
            poll_count,
            state: JobState::Failed,
        });
        error
    }

    async fn submit(&self, request: GenerationRequest) -> Result<JobHandle, GenerationError> {
        let service = self.service.clone();
        self.client
            .execute(move || -> BoxFuture<'static, Result<JobHandle, GenerationError>> {
                let service = service.clone();
                let request = request.clone();
                Box::pin(async move { service.submit_job(request).await })
            })
            .await
    }

    async fn poll(&self, handle: &JobHandle) -> Result<JobStatus, GenerationError> {
        let service = self.service.clone();
        let handle = handle.clone();
        self.client
            .execute(move || -> BoxFuture<'static, Result<JobStatus, GenerationError>> {
                let service = service.clone();
                let handle = handle.clone();
                Box::pin(async move { service.poll_job(handle).await })
            })
            .await
    }

    async fn fetch(&self, handle: &JobHandle) -> Result<Artifact, GenerationError> {
        let service = self.service.clone();
        let handle = handle.clone();
        self.client
            .execute(move || -> BoxFuture<'static, Result<Artifact, GenerationError>> {
                let service = service.clone();
                let handle = handle.clone();
                Box::pin(async move { service.fetch_job_result(handle).await })
            })
            .await
    }
}
