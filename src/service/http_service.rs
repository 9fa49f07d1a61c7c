//! HTTP/JSON adapter for the generation service
//!
//! Speaks a small REST contract:
//!
//! - `POST {base}/v1/generate` runs a synchronous operation
//! - `POST {base}/v1/jobs` submits a long-running job
//! - `GET {base}/v1/jobs/{id}` reports job status
//! - `GET {base}/v1/jobs/{id}/result` downloads the finished artifact
//!
//! Status codes are mapped onto [`GenerationError`] so the retrying client can
//! classify them: 401/403 become `PermissionDenied`, 404 becomes `NotFound`,
//! 429, 5xx and transport failures become `NetworkError`.

use crate::client::CredentialHandle;
use crate::service::provider::GenerationService;
use crate::service::schema::{
    self, WireGenerateResponse, WireJobStatus, WireJobSubmitted, WirePayload, WireRequest,
};
use crate::service::types::{
    Artifact, GenerationError, GenerationRequest, GenerationResponse, JobHandle, JobStatus,
    ServiceConfig,
};
use futures::future::BoxFuture;
use reqwest::{Client as HttpClient, RequestBuilder, StatusCode};
use std::time::Duration;
use tracing::debug;
use url::Url;

const MAX_ERROR_BODY_CHARS: usize = 300;

pub struct HttpGenerationService {
    base_url: Url,
    http: HttpClient,
    credential: CredentialHandle,
}

impl HttpGenerationService {
    pub fn new(config: &ServiceConfig, credential: CredentialHandle) -> Result<Self, GenerationError> {
        let base_url = Url::parse(config.base_url.trim_end_matches('/')).map_err(|e| {
            GenerationError::InvalidRequest(format!("invalid base URL '{}': {}", config.base_url, e))
        })?;

        let http = HttpClient::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| GenerationError::NetworkError(e.to_string()))?;

        Ok(Self {
            base_url,
            http,
            credential,
        })
    }

    fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        let joined = format!("{}/{}", url.path().trim_end_matches('/'), path);
        url.set_path(&joined);
        url
    }

    async fn authorized(&self, builder: RequestBuilder) -> Result<RequestBuilder, GenerationError> {
        match self.credential.get().await {
            Some(key) => Ok(builder.bearer_auth(key)),
            None => Err(GenerationError::PermissionDenied(
                "no credential selected".to_string(),
            )),
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Vec<u8>, GenerationError> {
        let response = self
            .authorized(builder)
            .await?
            .send()
            .await
            .map_err(|e| GenerationError::NetworkError(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| GenerationError::NetworkError(e.to_string()))?;

        debug!("Service responded {} ({} bytes)", status, body.len());

        if status.is_success() {
            Ok(body.to_vec())
        } else {
            Err(error_for_status(status, &String::from_utf8_lossy(&body)))
        }
    }
}

/// Map a non-success status onto the error taxonomy
pub fn error_for_status(status: StatusCode, body: &str) -> GenerationError {
    let detail: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    let message = if detail.trim().is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, detail.trim())
    };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            GenerationError::PermissionDenied(message)
        }
        StatusCode::NOT_FOUND => GenerationError::NotFound(message),
        StatusCode::TOO_MANY_REQUESTS => GenerationError::NetworkError(message),
        s if s.is_server_error() => GenerationError::NetworkError(message),
        _ => GenerationError::Unknown(message),
    }
}

impl GenerationService for HttpGenerationService {
    fn generate(
        &self,
        request: GenerationRequest,
    ) -> BoxFuture<'_, Result<GenerationResponse, GenerationError>> {
        Box::pin(async move {
            let url = self.endpoint("v1/generate");
            let body = self
                .send(self.http.post(url).json(&WireRequest::from(&request)))
                .await?;
            let wire: WireGenerateResponse = schema::decode(&body)?;
            Ok(GenerationResponse::from(wire))
        })
    }

    fn submit_job(
        &self,
        request: GenerationRequest,
    ) -> BoxFuture<'_, Result<JobHandle, GenerationError>> {
        Box::pin(async move {
            let url = self.endpoint("v1/jobs");
            let body = self
                .send(self.http.post(url).json(&WireRequest::from(&request)))
                .await?;
            let wire: WireJobSubmitted = schema::decode(&body)?;
            Ok(JobHandle::from(wire))
        })
    }

    fn poll_job(&self, handle: JobHandle) -> BoxFuture<'_, Result<JobStatus, GenerationError>> {
        Box::pin(async move {
            let url = self.endpoint(&format!("v1/jobs/{}", handle.id));
            let body = self.send(self.http.get(url)).await?;
            let wire: WireJobStatus = schema::decode(&body)?;
            Ok(JobStatus::from(wire))
        })
    }

    fn fetch_job_result(
        &self,
        handle: JobHandle,
    ) -> BoxFuture<'_, Result<Artifact, GenerationError>> {
        Box::pin(async move {
            let url = self.endpoint(&format!("v1/jobs/{}/result", handle.id));
            let body = self.send(self.http.get(url)).await?;
            let wire: WirePayload = schema::decode(&body)?;
            Ok(Artifact::from(wire))
        })
    }

    fn service_name(&self) -> &'static str {
        "http"
    }
}
