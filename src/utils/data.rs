use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

/// Create a directory (and parents) if it does not exist.
///
/// This is the only failure the pipeline treats as fatal: without a storage
/// location no run may begin, per the startup contract.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        info!("Creating directory: {}", path.display());
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory {}", path.display()))?;
    }
    Ok(())
}

/// Read and parse a JSON file, returning `None` (with a warning) on any
/// failure. Mirrors the lenient read used across the pipeline stages.
pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Option<T> {
    if !path.exists() {
        warn!("File not found: {}", path.display());
        return None;
    }
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read {}: {}", path.display(), e);
            return None;
        }
    };
    match serde_json::from_str(&content) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("Failed to parse {}: {}", path.display(), e);
            None
        }
    }
}

/// Serialize a value as pretty JSON and write it in one shot.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize JSON")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Load the non-marketable item list: one name per line, blank lines
/// ignored. A missing file disables filtering and is not an error.
pub fn load_non_marketable(path: &Path) -> HashSet<String> {
    if !path.exists() {
        warn!(
            "Non-marketable items file not found at {}. No filtering will be applied.",
            path.display()
        );
        return HashSet::new();
    }

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!(
                "Error reading non-marketable items file {}: {}. Filtering will not be applied.",
                path.display(),
                e
            );
            return HashSet::new();
        }
    };

    let set: HashSet<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    info!("Loaded {} unique non-marketable item names.", set.len());
    set
}
