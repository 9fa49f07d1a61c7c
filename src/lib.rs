//! # genstudio
//!
//! Orchestration core of a generative media studio: it turns user actions
//! into calls against a remote generation service and keeps the local state
//! around those calls consistent.
//!
//! ## Architecture Overview
//!
//! - **[`router`]**: Maps editing state onto exactly one operation and builds its request
//! - **[`client`]**: Wraps remote calls with a single credential-reselection retry
//! - **[`service`]**: The generation service boundary with HTTP and dry-run adapters
//! - **[`jobs`]**: Submit-and-poll driver for long-running video jobs
//! - **[`session`]**: Bounded undo/redo stack for the open document
//! - **[`storage`]**: Durable activity log and daily quota on a size-limited store
//! - **[`integration`]**: [`StudioSystem`], which wires everything together
//!
//! ## Features
//!
//! ### Routing
//! - **Single decision point**: tool, combine, inpaint, generate or edit, first match wins
//! - **Configurable merge intent**: trigger words and the combine image cap live in config
//!
//! ### Resilient Persistence
//! - **Capacity-tolerant history**: oldest records are evicted until a write fits
//! - **Atomic replaces**: each namespace is rewritten through a temp file and rename
//! - **Daily quota**: reset once per calendar day, charged before metered calls
//!
//! ## Quick Start
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
//!     let outcome = studio.perform(UserAction::new("a watercolor fox")).await?;
//!     println!("Recorded as {}", outcome.record_id);
//!     Ok(())
//! }
//! ```

/// Request routing and request building.
pub mod router;

/// Retrying API client and credential selection.
///
/// Every remote call goes through [`client::RetryingApiClient`], which
/// retries once after credential reselection on reauth-eligible failures.
pub mod client;

/// Generation service boundary, wire schema and adapters.
pub mod service;

/// Long-running job polling with cooperative cancellation.
pub mod jobs;

/// In-memory undo/redo history of the open document.
pub mod session;

/// Durable activity log, quota manager and key/value backends.
pub mod storage;

/// High-level system integration and orchestration.
pub mod integration;

/// Environment constants and path utilities.
///
/// Centralizes all hardcoded paths, file names and environment variables
/// used throughout the application.
pub mod env;

// Re-export the routing entry points
pub use router::{OperationPlan, RequestRouter, RoutingConfig, ToolAction};

// Re-export the remote call layer
pub use client::{CredentialHandle, CredentialSelector, RetryingApiClient};
pub use service::{
    Artifact, DryRunService, GenerationError, GenerationService, HttpGenerationService,
    OperationKind,
};

// Re-export local state
pub use jobs::{CancelFlag, JobProgress, LongRunningJobPoller, PollerConfig};
pub use session::{EditingSnapshot, SessionHistoryStack};
pub use storage::{PersistentActivityStore, QuotaManager};

// Re-export integration types
pub use integration::{
    ActionOutcome, StudioComponents, StudioConfig, StudioError, StudioSystem, UserAction,
};

// CLI module for command-line interface
pub mod cli;
