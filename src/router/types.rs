use crate::service::types::{Artifact, OperationKind, OperationSettings};
use serde::{Deserialize, Serialize};

/// Tool explicitly invoked by the caller; always overrides inferred routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolAction {
    Upscale,
    Refine,
    Reframe,
    Animate,
}

impl ToolAction {
    pub fn operation(&self) -> OperationKind {
        match self {
            ToolAction::Upscale => OperationKind::Upscale,
            ToolAction::Refine => OperationKind::Refine,
            ToolAction::Reframe => OperationKind::Reframe,
            ToolAction::Animate => OperationKind::Animate,
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "upscale" => Some(ToolAction::Upscale),
            "refine" => Some(ToolAction::Refine),
            "reframe" => Some(ToolAction::Reframe),
            "animate" | "video" => Some(ToolAction::Animate),
            _ => None,
        }
    }
}

/// Snapshot of the editor the router decides on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditingState {
    pub staged_images: usize,
    pub mask_active: bool,
    pub artifact_loaded: bool,
    pub instruction: String,
    pub tool: Option<ToolAction>,
}

/// The single operation selected for a user action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationPlan {
    pub kind: OperationKind,
    pub metered: bool,
}

impl OperationPlan {
    pub fn new(kind: OperationKind) -> Self {
        Self {
            kind,
            metered: kind.is_metered(),
        }
    }
}

/// Everything the request builder may draw payloads from
#[derive(Debug, Clone, Default)]
pub struct RequestInputs {
    pub instruction: String,
    pub current_artifact: Option<Artifact>,
    pub staged_images: Vec<Artifact>,
    pub mask: Option<Artifact>,
    pub settings: OperationSettings,
}

/// Configurable merge-intent policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub merge_keywords: Vec<String>,
    pub max_combine_images: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            merge_keywords: ["combine", "merge", "blend", "fuse", "mix"]
                .iter()
                .map(|k| k.to_string())
                .collect(),
            max_combine_images: 4,
        }
    }
}
