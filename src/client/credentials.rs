use crate::service::types::GenerationError;
use futures::future::BoxFuture;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Shared, swappable credential read by service adapters on every call
#[derive(Debug, Clone, Default)]
pub struct CredentialHandle {
    inner: Arc<RwLock<Option<String>>>,
}

impl CredentialHandle {
    pub fn new(initial: Option<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial.filter(|key| !key.trim().is_empty()))),
        }
    }

    pub async fn get(&self) -> Option<String> {
        self.inner.read().await.clone()
    }

    pub async fn set(&self, key: String) {
        *self.inner.write().await = Some(key);
    }

    pub async fn is_set(&self) -> bool {
        self.inner.read().await.is_some()
    }
}

/// Out-of-band credential selection, awaited once per reauth-eligible failure
pub trait CredentialSelector: Send + Sync {
    /// Ask for a fresh credential. `Ok(())` means a new credential is in place.
    fn select_credential(&self) -> BoxFuture<'_, Result<(), GenerationError>>;
}

/// Re-reads an environment variable into the shared handle
pub struct EnvCredentialSelector {
    variable: String,
    handle: CredentialHandle,
}

impl EnvCredentialSelector {
    pub fn new(variable: impl Into<String>, handle: CredentialHandle) -> Self {
        Self {
            variable: variable.into(),
            handle,
        }
    }
}

impl CredentialSelector for EnvCredentialSelector {
    fn select_credential(&self) -> BoxFuture<'_, Result<(), GenerationError>> {
        Box::pin(async move {
            match std::env::var(&self.variable) {
                Ok(key) if !key.trim().is_empty() => {
                    self.handle.set(key.trim().to_string()).await;
                    info!("Reloaded credential from {}", self.variable);
                    Ok(())
                }
                _ => Err(GenerationError::PermissionDenied(format!(
                    "{} is not set",
                    self.variable
                ))),
            }
        })
    }
}

/// Interactive selection on the terminal
pub struct PromptCredentialSelector {
    handle: CredentialHandle,
}

impl PromptCredentialSelector {
    pub fn new(handle: CredentialHandle) -> Self {
        Self { handle }
    }
}

impl CredentialSelector for PromptCredentialSelector {
    fn select_credential(&self) -> BoxFuture<'_, Result<(), GenerationError>> {
        Box::pin(async move {
            let entered = tokio::task::spawn_blocking(|| -> io::Result<String> {
                print!("\nThe service rejected the current API key. Enter a new key (blank to cancel): ");
                io::stdout().flush()?;
                let mut line = String::new();
                io::stdin().lock().read_line(&mut line)?;
                Ok(line.trim().to_string())
            })
            .await
            .map_err(|e| GenerationError::Unknown(e.to_string()))?
            .map_err(|e| GenerationError::Unknown(e.to_string()))?;

            if entered.is_empty() {
                warn!("Credential selection cancelled by user");
                return Err(GenerationError::PermissionDenied(
                    "credential selection cancelled".to_string(),
                ));
            }

            self.handle.set(entered).await;
            Ok(())
        })
    }
}
