use chrono::NaiveDate;
use futures::future::BoxFuture;
use genstudio::service::types::{GenerationRequest, GenerationResponse, JobHandle, JobStatus};
use genstudio::storage::{ManualClock, MemoryStore};
use genstudio::{
    Artifact, CredentialHandle, CredentialSelector, DryRunService, GenerationError,
    GenerationService, StudioComponents, StudioConfig, StudioSystem, ToolAction, UserAction,
};
use std::sync::Arc;

/// Dry-run service that only answers callers holding the expected key
struct KeyCheckingService {
    credential: CredentialHandle,
    expected: &'static str,
    inner: DryRunService,
}

impl KeyCheckingService {
    async fn check(&self) -> Result<(), GenerationError> {
        match self.credential.get().await {
            Some(key) if key == self.expected => Ok(()),
            _ => Err(GenerationError::PermissionDenied("key rejected".to_string())),
        }
    }
}

impl GenerationService for KeyCheckingService {
    fn generate(
        &self,
        request: GenerationRequest,
    ) -> BoxFuture<'_, Result<GenerationResponse, GenerationError>> {
        Box::pin(async move {
            self.check().await?;
            self.inner.generate(request).await
        })
    }

    fn submit_job(
        &self,
        request: GenerationRequest,
    ) -> BoxFuture<'_, Result<JobHandle, GenerationError>> {
        Box::pin(async move {
            self.check().await?;
            self.inner.submit_job(request).await
        })
    }

    fn poll_job(&self, handle: JobHandle) -> BoxFuture<'_, Result<JobStatus, GenerationError>> {
        Box::pin(async move {
            self.check().await?;
            self.inner.poll_job(handle).await
        })
    }

    fn fetch_job_result(
        &self,
        handle: JobHandle,
    ) -> BoxFuture<'_, Result<Artifact, GenerationError>> {
        Box::pin(async move {
            self.check().await?;
            self.inner.fetch_job_result(handle).await
        })
    }

    fn service_name(&self) -> &'static str {
        "key-checking"
    }
}

/// Installs a fixed key when asked, or refuses
struct ScriptedSelector {
    credential: CredentialHandle,
    replacement: Option<&'static str>,
}

impl CredentialSelector for ScriptedSelector {
    fn select_credential(&self) -> BoxFuture<'_, Result<(), GenerationError>> {
        Box::pin(async move {
            match self.replacement {
                Some(key) => {
                    self.credential.set(key.to_string()).await;
                    Ok(())
                }
                None => Err(GenerationError::PermissionDenied("dialog dismissed".to_string())),
            }
        })
    }
}

async fn studio_with_key(initial: &str, replacement: Option<&'static str>) -> StudioSystem {
    let credential = CredentialHandle::new(Some(initial.to_string()));
    let mut config = StudioConfig::default();
    config.poller.interval_ms = 5;

    let components = StudioComponents {
        service: Arc::new(KeyCheckingService {
            credential: credential.clone(),
            expected: "fresh-key",
            inner: DryRunService::new(1),
        }),
        selector: Arc::new(ScriptedSelector {
            credential,
            replacement,
        }),
        backend: Arc::new(MemoryStore::new(None)),
        clock: Arc::new(ManualClock::new(NaiveDate::from_ymd_opt(2026, 3, 14).unwrap())),
    };
    StudioSystem::with_components(config, components)
        .await
        .expect("Studio should initialize")
}

#[tokio::test]
async fn test_stale_key_is_replaced_and_call_retried() {
    let studio = studio_with_key("stale-key", Some("fresh-key")).await;

    let outcome = studio.perform(UserAction::new("a tidal pool")).await;
    assert!(outcome.is_ok(), "Retry after reselection should succeed");

    let stats = studio.client_statistics().await;
    assert_eq!(stats.total_calls, 1);
    assert_eq!(stats.total_attempts, 2);
    assert_eq!(stats.reauth_attempts, 1);
    assert_eq!(stats.reauth_successes, 1);
    assert_eq!(studio.history().await.len(), 1);
}

#[tokio::test]
async fn test_refused_reselection_surfaces_original_error() {
    let studio = studio_with_key("stale-key", None).await;

    let result = studio.perform(UserAction::new("a tidal pool")).await;
    assert_eq!(
        result.unwrap_err(),
        GenerationError::PermissionDenied("key rejected".to_string())
    );
    assert!(studio.history().await.is_empty());
    assert!(studio.current().await.is_none());
}

#[tokio::test]
async fn test_second_rejection_is_not_retried_again() {
    let studio = studio_with_key("stale-key", Some("still-wrong")).await;

    let result = studio.perform(UserAction::new("a tidal pool")).await;
    assert!(matches!(result, Err(GenerationError::PermissionDenied(_))));

    let stats = studio.client_statistics().await;
    assert_eq!(stats.total_attempts, 2);
    assert_eq!(stats.reauth_attempts, 1);
}

#[tokio::test]
async fn test_failed_video_still_consumes_quota() {
    let studio = studio_with_key("stale-key", None).await;
    studio.open(Artifact::new("cGhvdG8=", "image/png")).await;

    let result = studio
        .perform(UserAction::new("slow pan").with_tool(ToolAction::Animate))
        .await;

    assert!(result.is_err());
    assert_eq!(studio.quota_remaining().await, 2);
}
