use crate::client::credentials::CredentialSelector;
use crate::service::types::{ErrorClass, GenerationError};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Wraps every remote call with one credential-reselection retry
///
/// A call is attempted once. If it fails with a reauth-eligible error
/// (`PermissionDenied`, `NotFound`), the credential selector is awaited and
/// the call is attempted exactly once more. Every other failure, and any
/// failure of the second attempt, is returned unchanged.
pub struct RetryingApiClient {
    selector: Arc<dyn CredentialSelector>,
    stats: Arc<Mutex<ClientStatistics>>,
}

#[derive(Debug, Clone, Default)]
pub struct ClientStatistics {
    pub total_calls: u64,
    pub total_attempts: u64,
    pub reauth_attempts: u64,
    pub reauth_successes: u64,
    pub total_errors: u64,
    pub last_error_time: Option<DateTime<Utc>>,
    pub error_types: HashMap<String, u32>,
}

impl RetryingApiClient {
    pub fn new(selector: Arc<dyn CredentialSelector>) -> Self {
        Self {
            selector,
            stats: Arc::new(Mutex::new(ClientStatistics::default())),
        }
    }

    pub async fn execute<F, T>(&self, operation: F) -> Result<T, GenerationError>
    where
        F: Fn() -> BoxFuture<'static, Result<T, GenerationError>> + Send + Sync,
        T: Send,
    {
        self.stats.lock().await.total_calls += 1;

        let first_error = match self.attempt(&operation).await {
            Ok(result) => return Ok(result),
            Err(error) => error,
        };

        if !first_error.is_reauth_eligible() {
            debug!("Not retrying {} failure", first_error.class().as_str());
            return Err(first_error);
        }

        info!(
            "{} failure, requesting credential reselection",
            first_error.class().as_str()
        );
        self.stats.lock().await.reauth_attempts += 1;

        if let Err(reauth_error) = self.selector.select_credential().await {
            warn!("Credential reselection refused: {}", reauth_error);
            return Err(first_error);
        }
        self.stats.lock().await.reauth_successes += 1;

        self.attempt(&operation).await
    }

    async fn attempt<F, T>(&self, operation: &F) -> Result<T, GenerationError>
    where
        F: Fn() -> BoxFuture<'static, Result<T, GenerationError>> + Send + Sync,
    {
        self.stats.lock().await.total_attempts += 1;

        let result = operation().await;
        if let Err(error) = &result {
            self.record_error(error.class()).await;
        }
        result
    }

    async fn record_error(&self, class: ErrorClass) {
        let mut stats = self.stats.lock().await;
        stats.total_errors += 1;
        stats.last_error_time = Some(Utc::now());
        *stats.error_types.entry(class.as_str().to_string()).or_insert(0) += 1;
    }

    pub async fn statistics(&self) -> ClientStatistics {
        self.stats.lock().await.clone()
    }
}
