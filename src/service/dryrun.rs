//! Offline generation service
//!
//! Produces deterministic placeholder payloads without touching the network.
//! Jobs report completion after a fixed number of polls.

use crate::service::provider::GenerationService;
use crate::service::types::{
    Artifact, GenerationError, GenerationRequest, GenerationResponse, JobHandle, JobStatus,
    OperationKind,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;
use tracing::debug;

pub const DRYRUN_IMAGE_MEDIA_TYPE: &str = "image/png";
pub const DRYRUN_VIDEO_MEDIA_TYPE: &str = "video/mp4";

#[derive(Debug)]
pub struct DryRunService {
    polls_until_done: u32,
    jobs: Mutex<HashMap<String, (u32, GenerationRequest)>>,
}

impl DryRunService {
    pub fn new(polls_until_done: u32) -> Self {
        Self {
            polls_until_done,
            jobs: Mutex::new(HashMap::new()),
        }
    }

    fn placeholder(request: &GenerationRequest, index: u32) -> Artifact {
        let mut hasher = DefaultHasher::new();
        request.instruction.hash(&mut hasher);
        request.kind.as_str().hash(&mut hasher);
        request.settings.seed.hash(&mut hasher);
        index.hash(&mut hasher);
        for image in &request.images {
            image.payload.hash(&mut hasher);
        }

        let body = format!(
            "dryrun:{}:{:016x}:{}",
            request.kind,
            hasher.finish(),
            request.instruction
        );
        let media_type = if request.kind == OperationKind::Animate {
            DRYRUN_VIDEO_MEDIA_TYPE
        } else {
            DRYRUN_IMAGE_MEDIA_TYPE
        };
        Artifact::new(BASE64.encode(body.as_bytes()), media_type)
    }
}

impl Default for DryRunService {
    fn default() -> Self {
        Self::new(2)
    }
}

impl GenerationService for DryRunService {
    fn generate(
        &self,
        request: GenerationRequest,
    ) -> BoxFuture<'_, Result<GenerationResponse, GenerationError>> {
        Box::pin(async move {
            let count = request.settings.image_count.max(1);
            let results = (0..count)
                .map(|index| Self::placeholder(&request, index))
                .collect();
            debug!("Dry run produced {} result(s) for {}", count, request.kind);
            Ok(GenerationResponse {
                results,
                text: None,
            })
        })
    }

    fn submit_job(
        &self,
        request: GenerationRequest,
    ) -> BoxFuture<'_, Result<JobHandle, GenerationError>> {
        Box::pin(async move {
            let handle = JobHandle::new(format!("dryrun-{}", request.id));
            let mut jobs = self
                .jobs
                .lock()
                .map_err(|_| GenerationError::Unknown("dry run job table poisoned".to_string()))?;
            jobs.insert(handle.id.clone(), (0, request));
            Ok(handle)
        })
    }

    fn poll_job(&self, handle: JobHandle) -> BoxFuture<'_, Result<JobStatus, GenerationError>> {
        Box::pin(async move {
            let mut jobs = self
                .jobs
                .lock()
                .map_err(|_| GenerationError::Unknown("dry run job table poisoned".to_string()))?;
            let (polls, _) = jobs
                .get_mut(&handle.id)
                .ok_or_else(|| GenerationError::NotFound(format!("job {}", handle.id)))?;
            *polls += 1;
            Ok(JobStatus {
                done: *polls >= self.polls_until_done,
                error: None,
            })
        })
    }

    fn fetch_job_result(
        &self,
        handle: JobHandle,
    ) -> BoxFuture<'_, Result<Artifact, GenerationError>> {
        Box::pin(async move {
            let jobs = self
                .jobs
                .lock()
                .map_err(|_| GenerationError::Unknown("dry run job table poisoned".to_string()))?;
            let (_, request) = jobs
                .get(&handle.id)
                .ok_or_else(|| GenerationError::NotFound(format!("job {}", handle.id)))?;
            Ok(Self::placeholder(request, 0))
        })
    }

    fn service_name(&self) -> &'static str {
        "dryrun"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_generate_is_deterministic() {
        let service = DryRunService::default();
        let mut request = GenerationRequest::new(OperationKind::Generate, "a red fox");
        request.settings.seed = Some(7);
        request.settings.image_count = 2;

        let first = service.generate(request.clone()).await.unwrap();
        let second = service.generate(request).await.unwrap();

        assert_eq!(first.results.len(), 2);
        assert_eq!(first.results, second.results);
        assert_ne!(first.results[0], first.results[1]);
    }

    #[tokio::test]
    async fn test_job_completes_after_configured_polls() {
        let service = DryRunService::new(3);
        let request = GenerationRequest::new(OperationKind::Animate, "waves");
        let handle = service.submit_job(request).await.unwrap();

        assert!(!service.poll_job(handle.clone()).await.unwrap().done);
        assert!(!service.poll_job(handle.clone()).await.unwrap().done);
        assert!(service.poll_job(handle.clone()).await.unwrap().done);

        let artifact = service.fetch_job_result(handle).await.unwrap();
        assert_eq!(artifact.media_type, DRYRUN_VIDEO_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let service = DryRunService::default();
        let result = service.poll_job(JobHandle::new("missing")).await;
        assert!(matches!(result, Err(GenerationError::NotFound(_))));
    }
}
