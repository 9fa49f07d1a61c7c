use crate::service::types::{
    Artifact, GenerationError, GenerationRequest, GenerationResponse, JobHandle, JobStatus,
};
use futures::future::BoxFuture;

/// Boundary of the wrapped generative service
///
/// Every method performs exactly one remote call. Retries and credential
/// reselection are layered on top by [`crate::client::RetryingApiClient`].
pub trait GenerationService: Send + Sync {
    /// Execute a synchronous operation (everything except long-running jobs)
    fn generate(
        &self,
        request: GenerationRequest,
    ) -> BoxFuture<'_, Result<GenerationResponse, GenerationError>>;

    /// Submit a long-running job and return its handle
    fn submit_job(
        &self,
        request: GenerationRequest,
    ) -> BoxFuture<'_, Result<JobHandle, GenerationError>>;

    /// Check the status of a submitted job
    fn poll_job(&self, handle: JobHandle) -> BoxFuture<'_, Result<JobStatus, GenerationError>>;

    /// Download the final artifact of a completed job
    fn fetch_job_result(&self, handle: JobHandle)
    -> BoxFuture<'_, Result<Artifact, GenerationError>>;

    /// Get service name/identifier
    fn service_name(&self) -> &'static str;
}
