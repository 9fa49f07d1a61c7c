//! # Studio Orchestration
//!
//! Wires the router, the retrying client, the job poller, the session stack
//! and the durable stores into one [`StudioSystem`].
//!
//! ## Core Components
//!
//! - **[`StudioSystem`]**: owns one of each component and runs user actions
//! - **[`StudioConfig`]**: unified TOML configuration for all components
//! - **[`UserAction`]** / **[`ActionOutcome`]**: one request in, one result out
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      StudioSystem                        │
//! │  ┌──────────┐  ┌──────────────┐  ┌────────────────────┐  │
//! │  │  Router  │→ │ QuotaManager │→ │ RetryingApiClient  │  │
//! │  └──────────┘  └──────────────┘  │  (+ job poller)    │  │
//! │                                  └────────────────────┘  │
//! │  ┌─────────────────────┐  ┌───────────────────────────┐  │
//! │  │ SessionHistoryStack │  │ PersistentActivityStore   │  │
//! │  └─────────────────────┘  └───────────────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! An action either succeeds, in which case the session stack and the
//! activity log both advance, or fails and leaves both untouched. Metered
//! operations are charged before the remote call and are not refunded.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use genstudio::{StudioConfig, StudioSystem, UserAction};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut config = StudioConfig::default();
//!     config.service.dry_run = true;
//!     let studio = StudioSystem::new(config).await?;
//!
//!     let outcome = studio.perform(UserAction::new("a lighthouse at dusk")).await?;
//!     println!("{} produced {} result(s)", outcome.plan.kind, outcome.results.len());
//!
//!     studio.undo().await;
//!     Ok(())
//! }
//! ```

use crate::client::{
    ClientStatistics, CredentialHandle, CredentialSelector, EnvCredentialSelector,
    RetryingApiClient,
};
use crate::jobs::{CancelFlag, JobProgress, LongRunningJobPoller, PollerConfig};
use crate::router::{
    EditingState, OperationPlan, RequestInputs, RequestRouter, RoutingConfig, ToolAction,
    build_request,
};
use crate::service::types::{
    Artifact, GenerationError, GenerationRequest, GenerationResponse, OperationKind,
    OperationSettings, ServiceConfig, UpscaleFactor,
};
use crate::service::{DryRunService, GenerationService, HttpGenerationService};
use crate::session::{EditingSnapshot, SessionConfig, SessionHistoryStack, StackState};
use crate::storage::{
    ActivityRecord, AppendOutcome, Clock, FileStore, FilterKind, KeyValueStore, LocalClock,
    MemoryStore, PersistentActivityStore, QuotaConfig, QuotaManager, ResultItem, ResultUpdate,
    StorageConfig, StorageError,
};
use anyhow::{Context, Result};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Progress phases shown while a video job runs
pub const VIDEO_PHASES: &[&str] = &[
    "Submitting to the video model",
    "Composing frames",
    "Rendering motion",
    "Finalizing video",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    pub service: ServiceConfig,
    pub session: SessionConfig,
    pub storage: StorageConfig,
    pub quota: QuotaConfig,
    pub poller: PollerConfig,
    pub routing: RoutingConfig,
}

impl StudioConfig {
    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).context("Failed to read config file")?;
        Self::from_toml_str(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }

    /// Save configuration to a TOML file
    pub fn to_toml_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let content = self.to_toml_string()?;
        std::fs::write(path, content).context("Failed to write config file")
    }

    /// Convert configuration to a TOML string
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }
}

/// Errors from operations that touch both the service and the activity log
#[derive(Debug, thiserror::Error)]
pub enum StudioError {
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// One user request against the open document
#[derive(Debug, Clone, Default)]
pub struct UserAction {
    pub instruction: String,
    pub staged_images: Vec<Artifact>,
    pub mask: Option<Artifact>,
    pub tool: Option<ToolAction>,
    pub settings: OperationSettings,
}

impl UserAction {
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            ..Default::default()
        }
    }

    pub fn with_tool(mut self, tool: ToolAction) -> Self {
        self.tool = Some(tool);
        self
    }

    pub fn with_mask(mut self, mask: Artifact) -> Self {
        self.mask = Some(mask);
        self
    }

    pub fn with_staged_images(mut self, images: Vec<Artifact>) -> Self {
        self.staged_images = images;
        self
    }

    pub fn with_settings(mut self, settings: OperationSettings) -> Self {
        self.settings = settings;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ActionOutcome {
    pub plan: OperationPlan,
    pub results: Vec<Artifact>,
    pub record_id: String,
    pub append: AppendOutcome,
    /// Remaining quota after a metered operation
    pub quota_remaining: Option<u32>,
}

/// Pluggable collaborators, mainly for the CLI and tests
pub struct StudioComponents {
    pub service: Arc<dyn GenerationService>,
    pub selector: Arc<dyn CredentialSelector>,
    pub backend: Arc<dyn KeyValueStore>,
    pub clock: Arc<dyn Clock>,
}

impl StudioComponents {
    /// Build the default collaborators described by `config`
    pub fn from_config(config: &StudioConfig) -> Result<Self> {
        let credential = CredentialHandle::new(std::env::var(&config.service.api_key_env).ok());
        let selector = Arc::new(EnvCredentialSelector::new(
            config.service.api_key_env.clone(),
            credential.clone(),
        ));
        Self::with_selector(config, credential, selector)
    }

    /// Same as [`StudioComponents::from_config`] with a caller-chosen selector
    pub fn with_selector(
        config: &StudioConfig,
        credential: CredentialHandle,
        selector: Arc<dyn CredentialSelector>,
    ) -> Result<Self> {
        let service: Arc<dyn GenerationService> = if config.service.dry_run {
            info!("Dry run: no network calls will be made");
            Arc::new(DryRunService::default())
        } else {
            Arc::new(
                HttpGenerationService::new(&config.service, credential)
                    .context("Failed to create generation service")?,
            )
        };

        let backend: Arc<dyn KeyValueStore> = match &config.storage.data_dir {
            Some(dir) => Arc::new(
                FileStore::new(dir.clone(), config.storage.capacity_bytes)
                    .with_context(|| format!("Failed to open data directory {}", dir.display()))?,
            ),
            None => Arc::new(MemoryStore::new(config.storage.capacity_bytes)),
        };

        Ok(Self {
            service,
            selector,
            backend,
            clock: Arc::new(LocalClock),
        })
    }
}

/// Integrated studio: routing, remote calls, undo/redo, history and quota
pub struct StudioSystem {
    router: RequestRouter,
    client: Arc<RetryingApiClient>,
    service: Arc<dyn GenerationService>,
    poller: LongRunningJobPoller,
    session: Mutex<SessionHistoryStack>,
    activity: Arc<PersistentActivityStore>,
    quota: Arc<QuotaManager>,
    config: StudioConfig,
}

impl StudioSystem {
    pub async fn new(config: StudioConfig) -> Result<Self> {
        let components = StudioComponents::from_config(&config)?;
        Self::with_components(config, components).await
    }

    pub async fn with_components(config: StudioConfig, components: StudioComponents) -> Result<Self> {
        let router = RequestRouter::new(config.routing.clone())
            .context("Invalid merge keywords in routing configuration")?;
        let client = Arc::new(RetryingApiClient::new(components.selector));
        let poller = LongRunningJobPoller::new(
            components.service.clone(),
            client.clone(),
            config.poller.clone(),
        );

        let activity = Arc::new(
            PersistentActivityStore::open(components.backend.clone(), config.storage.history_cap)
                .await,
        );
        let quota = Arc::new(QuotaManager::new(
            components.backend,
            components.clock,
            &config.quota,
        ));

        info!(
            "Studio ready ({} service, {} history records, {} quota left)",
            components.service.service_name(),
            activity.len().await,
            quota.peek().await
        );

        Ok(Self {
            router,
            client,
            service: components.service,
            poller,
            session: Mutex::new(SessionHistoryStack::new(config.session.undo_capacity)),
            activity,
            quota,
            config,
        })
    }

    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    /// Run an action with no progress reporting
    pub async fn perform(&self, action: UserAction) -> Result<ActionOutcome, GenerationError> {
        let phases: Vec<String> = VIDEO_PHASES.iter().map(|p| p.to_string()).collect();
        self.perform_with_progress(action, &phases, |_| {}, &CancelFlag::new())
            .await
    }

    /// Route, charge, execute and record one action
    pub async fn perform_with_progress<P>(
        &self,
        action: UserAction,
        phases: &[String],
        on_progress: P,
        cancel: &CancelFlag,
    ) -> Result<ActionOutcome, GenerationError>
    where
        P: FnMut(JobProgress) + Send,
    {
        let current = self.current().await;
        let current_artifact = current.and_then(|snapshot| snapshot.artifact);

        let state = EditingState {
            staged_images: action.staged_images.len(),
            mask_active: action.mask.is_some(),
            artifact_loaded: current_artifact.is_some(),
            instruction: action.instruction.clone(),
            tool: action.tool,
        };
        let plan = self.router.route(&state);

        let inputs = RequestInputs {
            instruction: action.instruction,
            current_artifact: current_artifact.clone(),
            staged_images: action.staged_images,
            mask: action.mask,
            settings: action.settings,
        };
        let request = build_request(&plan, inputs, self.router.config())?;

        let quota_remaining = if plan.metered {
            if !self.quota.consume().await {
                warn!("Daily quota exhausted, {} refused", plan.kind);
                return Err(GenerationError::QuotaExceeded);
            }
            Some(self.quota.peek().await)
        } else {
            None
        };

        info!("Running {} request {}", plan.kind, request.id);
        let (results, note) = if plan.kind.is_long_running() {
            let video = self
                .poller
                .start(request.clone(), phases, on_progress, cancel)
                .await?;
            (vec![video], None)
        } else {
            self.generate(request.clone()).await?
        };

        // A video sits beside the image under edit rather than replacing it.
        if plan.kind != OperationKind::Animate
            && let Some(first) = results.first()
        {
            self.session.lock().await.push(EditingSnapshot::new(
                Some(first.clone()),
                request.instruction.clone(),
            ));
        }

        let record_id = self.activity.next_id();
        let items = results
            .iter()
            .map(|artifact| result_item(plan.kind, &request, artifact.clone()))
            .collect();
        let mut record = ActivityRecord::new(
            record_id.clone(),
            plan.kind,
            request.instruction.clone(),
            request.settings.clone(),
            items,
        )
        .with_source(current_artifact);
        if let Some(text) = note {
            record = record.with_extra(serde_json::json!({ "text": text }));
        }
        let append = self.activity.append(record).await;
        if append == AppendOutcome::Abandoned {
            warn!("{} succeeded but could not be recorded", plan.kind);
        }

        Ok(ActionOutcome {
            plan,
            results,
            record_id,
            append,
            quota_remaining,
        })
    }

    /// Run a synchronous generation, returning the results and any text the
    /// model sent alongside them.
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<(Vec<Artifact>, Option<String>), GenerationError> {
        let service = self.service.clone();
        let response = self
            .client
            .execute(move || -> BoxFuture<'static, Result<GenerationResponse, GenerationError>> {
                let service = service.clone();
                let request = request.clone();
                Box::pin(async move { service.generate(request).await })
            })
            .await?;
        let note = response
            .text
            .clone()
            .filter(|text| !text.trim().is_empty());
        Ok((response.into_results()?, note))
    }

    /// Start a new document from an opened image
    pub async fn open(&self, artifact: Artifact) {
        let mut session = self.session.lock().await;
        session.clear();
        session.push(EditingSnapshot::new(Some(artifact), ""));
        debug!("Opened new document");
    }

    pub async fn new_document(&self) {
        self.session.lock().await.clear();
    }

    pub async fn current(&self) -> Option<EditingSnapshot> {
        self.session.lock().await.current().cloned()
    }

    pub async fn undo(&self) -> Option<EditingSnapshot> {
        self.session.lock().await.undo().cloned()
    }

    pub async fn redo(&self) -> Option<EditingSnapshot> {
        self.session.lock().await.redo().cloned()
    }

    pub async fn session_state(&self) -> StackState {
        self.session.lock().await.state()
    }

    pub async fn history(&self) -> Vec<ActivityRecord> {
        self.activity.list().await
    }

    pub async fn history_record(&self, id: &str) -> Option<ActivityRecord> {
        self.activity.get(id).await
    }

    pub async fn remove_history(&self, ids: &[String]) -> bool {
        self.activity.remove(ids).await
    }

    pub async fn clear_history(&self) -> bool {
        self.activity.clear().await
    }

    /// Reopen a past result as the current artifact
    pub async fn restore_from_history(&self, id: &str, index: usize) -> Option<EditingSnapshot> {
        let record = self.activity.get(id).await?;
        let item = record.results.get(index)?;
        let snapshot = EditingSnapshot::new(Some(item.payload.clone()), record.instruction.clone());
        self.session.lock().await.push(snapshot.clone());
        Some(snapshot)
    }

    pub async fn apply_filter(
        &self,
        id: &str,
        index: usize,
        filter: FilterKind,
    ) -> Result<(), StudioError> {
        self.activity
            .update_result(id, index, ResultUpdate::ApplyFilter(filter))
            .await?;
        Ok(())
    }

    /// Upscale one past result in place
    pub async fn upscale_history_item(
        &self,
        id: &str,
        index: usize,
        factor: UpscaleFactor,
    ) -> Result<Artifact, StudioError> {
        let item = self
            .activity
            .get(id)
            .await
            .and_then(|record| record.results.get(index).cloned())
            .ok_or_else(|| StorageError::RecordNotFound(format!("{}#{}", id, index)))?;

        let mut request = GenerationRequest::new(OperationKind::Upscale, "");
        request.images = vec![item.payload];
        request.settings.resolution = Some(factor);

        let payload = self
            .generate(request)
            .await?
            .0
            .into_iter()
            .next()
            .ok_or_else(|| {
                GenerationError::MalformedModelOutput("upscale returned no result".to_string())
            })?;

        self.activity
            .update_result(
                id,
                index,
                ResultUpdate::RecordUpscale {
                    factor,
                    payload: payload.clone(),
                },
            )
            .await?;
        Ok(payload)
    }

    pub async fn quota_remaining(&self) -> u32 {
        self.quota.peek().await
    }

    pub async fn redeem(&self, code: &str) -> bool {
        self.quota.redeem(code).await
    }

    pub async fn client_statistics(&self) -> ClientStatistics {
        self.client.statistics().await
    }

    pub fn service_name(&self) -> &'static str {
        self.service.service_name()
    }
}

fn result_item(kind: OperationKind, request: &GenerationRequest, artifact: Artifact) -> ResultItem {
    match kind {
        OperationKind::Upscale => ResultItem {
            applied_upscale: request.settings.resolution,
            ..ResultItem::derived(artifact)
        },
        OperationKind::Refine | OperationKind::Reframe => ResultItem::derived(artifact),
        _ => ResultItem::new(artifact),
    }
}
