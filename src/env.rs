//! Environment constants and path utilities for the studio.
//!
//! This module centralizes all hardcoded paths, file names and environment
//! variable names used throughout the application.

use std::path::{Path, PathBuf};

/// Main application directory name (hidden directory like .git, .vscode)
pub const STUDIO_DIR_NAME: &str = ".genstudio";

/// Configuration file name inside the studio directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration file name looked up directly in the current directory
pub const LOCAL_CONFIG_FILE_NAME: &str = "genstudio.toml";

/// Environment variable holding the service credential
pub const API_KEY_ENV: &str = "GENSTUDIO_API_KEY";

/// Environment variable overriding the service base URL
pub const BASE_URL_ENV: &str = "GENSTUDIO_BASE_URL";

/// Storage namespaces and file names
pub mod storage {
    /// Data directory name within .genstudio
    pub const DATA_DIR_NAME: &str = "data";

    /// Namespace holding the serialized activity log
    pub const ACTIVITY_NAMESPACE: &str = "activity";

    /// Namespace holding the quota record
    pub const QUOTA_NAMESPACE: &str = "quota";

    /// Extension used for namespace files
    pub const NAMESPACE_EXTENSION: &str = "json";

    /// Suffix of in-flight temp files written before an atomic rename
    pub const TEMP_SUFFIX: &str = "tmp";
}

/// Test-related constants
pub mod test {
    /// Media type used for synthetic test payloads
    pub const TEST_MEDIA_TYPE: &str = "image/png";
}

/// Build the main .genstudio directory path from a root
pub fn studio_dir_path(root: &Path) -> PathBuf {
    root.join(STUDIO_DIR_NAME)
}

/// Build the data directory path from a root
pub fn data_dir_path(root: &Path) -> PathBuf {
    studio_dir_path(root).join(storage::DATA_DIR_NAME)
}

/// Build the file path backing a storage namespace
pub fn namespace_file_path(data_dir: &Path, namespace: &str) -> PathBuf {
    data_dir.join(format!("{}.{}", namespace, storage::NAMESPACE_EXTENSION))
}

/// Build the temp file path used while replacing a namespace
pub fn namespace_temp_file_path(data_dir: &Path, namespace: &str) -> PathBuf {
    data_dir.join(format!(
        "{}.{}.{}",
        namespace,
        storage::NAMESPACE_EXTENSION,
        storage::TEMP_SUFFIX
    ))
}

/// Build config directory path in user's home directory
pub fn user_config_dir_path(home_dir: &Path) -> PathBuf {
    home_dir.join(STUDIO_DIR_NAME)
}

/// Build config file path in user's home directory
pub fn user_config_file_path(home_dir: &Path) -> PathBuf {
    user_config_dir_path(home_dir).join(CONFIG_FILE_NAME)
}

/// Build local config file path in current directory
pub fn local_config_file_path(current_dir: &Path) -> PathBuf {
    current_dir.join(STUDIO_DIR_NAME).join(CONFIG_FILE_NAME)
}
