//! CLI-specific functionality for the studio
//!
//! This module contains argument parsing, configuration discovery and the
//! file helpers used to read inputs and write results.

pub mod args;
pub mod config;
pub mod media;

pub use args::{Args, ExecutionMode, HistoryAction, InteractiveConfig, QuotaAction, RunConfig};
pub use config::ConfigDiscovery;
pub use media::{read_artifact, write_artifact};
