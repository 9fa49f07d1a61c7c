//! Reading input images and writing results to disk

use crate::service::types::Artifact;
use anyhow::{Context, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::fs;
use std::path::{Path, PathBuf};

const MEDIA_TYPES: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("webp", "image/webp"),
    ("gif", "image/gif"),
    ("mp4", "video/mp4"),
];

fn media_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase();

    MEDIA_TYPES
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, media_type)| *media_type)
        .unwrap_or("application/octet-stream")
}

fn extension_for(media_type: &str) -> &'static str {
    MEDIA_TYPES
        .iter()
        .find(|(_, known)| *known == media_type)
        .map(|(ext, _)| *ext)
        .unwrap_or("bin")
}

pub fn read_artifact(path: &Path) -> Result<Artifact> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(Artifact::new(BASE64.encode(bytes), media_type_for(path)))
}

/// Decode an artifact into `dir/{stem}.{ext}`
pub fn write_artifact(dir: &Path, stem: &str, artifact: &Artifact) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let bytes = BASE64
        .decode(artifact.payload.as_bytes())
        .context("Result payload is not valid base64")?;
    let path = dir.join(format!("{}.{}", stem, extension_for(&artifact.media_type)));
    fs::write(&path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}
