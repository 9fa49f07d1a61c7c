use crate::service::types::{Artifact, OperationKind, OperationSettings, UpscaleFactor};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Cosmetic filter recorded against a result; rendering happens elsewhere
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    Grayscale,
    Sepia,
    Vivid,
    Cool,
    Warm,
}

impl FilterKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "grayscale" | "greyscale" => Some(FilterKind::Grayscale),
            "sepia" => Some(FilterKind::Sepia),
            "vivid" => Some(FilterKind::Vivid),
            "cool" => Some(FilterKind::Cool),
            "warm" => Some(FilterKind::Warm),
            _ => None,
        }
    }
}

/// A single output unit of an activity record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultItem {
    pub payload: Artifact,
    pub applied_upscale: Option<UpscaleFactor>,
    pub is_derived: bool,
    pub applied_filter: Option<FilterKind>,
}

impl ResultItem {
    pub fn new(payload: Artifact) -> Self {
        Self {
            payload,
            applied_upscale: None,
            is_derived: false,
            applied_filter: None,
        }
    }

    pub fn derived(payload: Artifact) -> Self {
        Self {
            is_derived: true,
            ..Self::new(payload)
        }
    }
}

/// Durable log entry for one completed remote operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub id: String,
    pub instruction: String,
    pub parameters: OperationSettings,
    pub results: Vec<ResultItem>,
    pub created_at: DateTime<Utc>,
    pub operation_kind: OperationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_artifact: Option<Artifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

impl ActivityRecord {
    pub fn new(
        id: impl Into<String>,
        operation_kind: OperationKind,
        instruction: impl Into<String>,
        parameters: OperationSettings,
        results: Vec<ResultItem>,
    ) -> Self {
        Self {
            id: id.into(),
            instruction: instruction.into(),
            parameters,
            results,
            created_at: Utc::now(),
            operation_kind,
            source_artifact: None,
            extra: None,
        }
    }

    pub fn with_source(mut self, source: Option<Artifact>) -> Self {
        self.source_artifact = source;
        self
    }

    pub fn with_extra(mut self, extra: serde_json::Value) -> Self {
        self.extra = Some(extra);
        self
    }
}

/// In-place mutation of one result item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultUpdate {
    ApplyFilter(FilterKind),
    RecordUpscale {
        factor: UpscaleFactor,
        payload: Artifact,
    },
}

/// What happened to an append
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Persisted; `evicted` older records were dropped to make room
    Persisted { evicted: usize },
    /// Nothing fit; the store was cleared
    Cleared,
    /// A non-capacity storage failure; the in-memory view is unchanged
    Abandoned,
}

/// Daily allowance for metered operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaRecord {
    pub remaining: u32,
    pub reset_date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("Storage capacity exceeded: need {needed} bytes, budget {budget}")]
    CapacityExceeded { needed: usize, budget: usize },
    #[error("Serialization failed: {0}")]
    Serialization(String),
    #[error("Record not found: {0}")]
    RecordNotFound(String),
    #[error("Storage error: {0}")]
    Other(String),
}

impl StorageError {
    pub fn is_capacity(&self) -> bool {
        matches!(self, StorageError::CapacityExceeded { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding namespace files; `None` keeps everything in memory
    pub data_dir: Option<PathBuf>,
    pub history_cap: usize,
    /// Byte budget shared by all namespaces
    pub capacity_bytes: Option<usize>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            history_cap: 50,
            capacity_bytes: Some(5 * 1024 * 1024),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    pub daily_allotment: u32,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self { daily_allotment: 3 }
    }
}
