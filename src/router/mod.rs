//! Maps a user action onto exactly one remote operation.
//!
//! Routing is a pure function of [`EditingState`]. Decision order, first
//! match wins:
//!
//! 1. An explicit tool action (upscale, refine, reframe, animate)
//! 2. Two or more staged images and a merge intent in the instruction: combine
//! 3. Active mask on a loaded artifact: inpaint
//! 4. Nothing loaded: generate
//! 5. Otherwise: edit
//!
//! Building the request for the chosen plan is a separate, fallible step
//! (see [`request_builder`]).

pub mod request_builder;
pub mod types;

#[cfg(test)]
mod tests;

pub use request_builder::build_request;
pub use types::*;

use crate::service::types::OperationKind;
use regex::{Regex, RegexBuilder};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct RequestRouter {
    merge_intent: Option<Regex>,
    config: RoutingConfig,
}

impl RequestRouter {
    pub fn new(config: RoutingConfig) -> Result<Self, regex::Error> {
        let keywords: Vec<String> = config
            .merge_keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(regex::escape)
            .collect();

        let merge_intent = if keywords.is_empty() {
            None
        } else {
            Some(
                RegexBuilder::new(&format!(r"\b(?:{})\b", keywords.join("|")))
                    .case_insensitive(true)
                    .build()?,
            )
        };

        Ok(Self {
            merge_intent,
            config,
        })
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    /// Whether the free-text instruction asks for the staged images to be merged
    pub fn has_merge_intent(&self, instruction: &str) -> bool {
        self.merge_intent
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(instruction))
    }

    pub fn route(&self, state: &EditingState) -> OperationPlan {
        let kind = if let Some(tool) = state.tool {
            tool.operation()
        } else if state.staged_images >= 2 && self.has_merge_intent(&state.instruction) {
            OperationKind::Combine
        } else if state.mask_active && state.artifact_loaded {
            OperationKind::Inpaint
        } else if !state.artifact_loaded {
            OperationKind::Generate
        } else {
            OperationKind::Edit
        };

        debug!("Routed action to {}", kind);
        OperationPlan::new(kind)
    }
}

impl Default for RequestRouter {
    fn default() -> Self {
        // The default keyword list is plain words, so the pattern always compiles.
        Self::new(RoutingConfig::default()).unwrap_or(Self {
            merge_intent: None,
            config: RoutingConfig::default(),
        })
    }
}
