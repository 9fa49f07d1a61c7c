//! Configuration discovery and loading
//!
//! This module handles the configuration discovery hierarchy:
//! 1. Current directory: ./genstudio.toml or ./.genstudio/config.toml
//! 2. User config: ~/.genstudio/config.toml
//! 3. Built-in defaults

use crate::{StudioConfig, env};
use anyhow::{Context, Result};
use std::env as std_env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Configuration discovery system
pub struct ConfigDiscovery;

impl ConfigDiscovery {
    /// Discover and load configuration using the hierarchy
    pub fn discover_config() -> Result<StudioConfig> {
        if let Some(config_path) = Self::find_config_file() {
            info!("Loading configuration from: {:?}", config_path);
            return StudioConfig::from_toml_file(&config_path)
                .with_context(|| format!("Invalid configuration in {}", config_path.display()));
        }

        info!("No configuration file found, using defaults");
        Ok(StudioConfig::default())
    }

    /// Load an explicit file, or fall back to discovery
    pub fn load(config_override: Option<&Path>) -> Result<StudioConfig> {
        match config_override {
            Some(path) => {
                info!("Loading configuration override from: {:?}", path);
                StudioConfig::from_toml_file(path)
                    .with_context(|| format!("Invalid configuration in {}", path.display()))
            }
            None => Self::discover_config(),
        }
    }

    /// Find configuration file using discovery hierarchy
    pub fn find_config_file() -> Option<PathBuf> {
        let candidates = Self::get_config_candidates();

        for candidate in candidates {
            debug!("Checking for config file: {:?}", candidate);
            if candidate.is_file() {
                debug!("Found config file: {:?}", candidate);
                return Some(candidate);
            }
        }

        debug!("No config file found in discovery hierarchy");
        None
    }

    /// Get list of configuration file candidates in priority order
    fn get_config_candidates() -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        if let Ok(current_dir) = std_env::current_dir() {
            candidates.push(current_dir.join(env::LOCAL_CONFIG_FILE_NAME));
            candidates.push(env::local_config_file_path(&current_dir));
        }

        if let Some(home_dir) = Self::get_home_dir() {
            candidates.push(env::user_config_file_path(&home_dir));
        }

        candidates
    }

    /// Get home directory path
    fn get_home_dir() -> Option<PathBuf> {
        std_env::var("HOME")
            .ok()
            .or_else(|| std_env::var("USERPROFILE").ok())
            .map(PathBuf::from)
    }

    /// Where the CLI keeps history and quota when the config names no directory
    pub fn default_data_dir() -> PathBuf {
        let root = Self::get_home_dir()
            .or_else(|| std_env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        env::data_dir_path(&root)
    }

    /// Fill in a durable data directory if the configuration leaves it unset
    pub fn with_data_dir(mut config: StudioConfig) -> StudioConfig {
        if config.storage.data_dir.is_none() {
            config.storage.data_dir = Some(Self::default_data_dir());
        }
        config
    }

    /// Create a default config file in the user's home directory
    pub fn create_default_user_config() -> Result<PathBuf> {
        let home_dir = Self::get_home_dir().context("Could not determine home directory")?;
        Self::create_default_config_in(&home_dir)
    }

    /// Write `~/.genstudio/config.toml` under `home_dir` unless one exists
    pub fn create_default_config_in(home_dir: &Path) -> Result<PathBuf> {
        let config_dir = env::user_config_dir_path(home_dir);
        let config_path = env::user_config_file_path(home_dir);

        fs::create_dir_all(&config_dir)
            .with_context(|| format!("Failed to create directory {}", config_dir.display()))?;

        if config_path.exists() {
            warn!("Configuration file already exists: {:?}", config_path);
        } else {
            StudioConfig::default().to_toml_file(&config_path)?;
            info!("Created default configuration file: {:?}", config_path);
        }

        Ok(config_path)
    }

    /// Show configuration discovery information for debugging
    pub fn show_discovery_info() {
        println!("Configuration Discovery Hierarchy:");
        println!();

        let candidates = Self::get_config_candidates();
        for (i, candidate) in candidates.iter().enumerate() {
            let status = if candidate.exists() {
                if candidate.is_file() {
                    "✓ EXISTS"
                } else {
                    "✗ NOT A FILE"
                }
            } else {
                "✗ NOT FOUND"
            };

            println!("  {}. {:?} - {}", i + 1, candidate, status);
        }

        println!();
        if let Some(found) = Self::find_config_file() {
            println!("Active configuration: {:?}", found);
        } else {
            println!("Active configuration: Built-in defaults");
        }
        println!("Default data directory: {:?}", Self::default_data_dir());
    }
}
