use crate::api::opendota::LiveMatch;
use crate::utils::config::Config;
use crate::utils::data::{ensure_dir, read_json_file, write_json_file};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{info, warn};

/// Prefix given to raw snapshot files once their content has been folded
/// into the filtered output.
const PROCESSED_PREFIX: &str = "processed_";

/// Top matches extracted from one snapshot, keyed by the snapshot timestamp.
///
/// The per-match value is `[spectators, activate_time]`, matching the on-disk
/// format consumed by the detail-fetch stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotBlock {
    pub timestamp: String,
    pub top_matches: BTreeMap<String, (u64, i64)>,
}

#[derive(Debug, Default)]
pub struct FilterStats {
    pub files_processed: usize,
    pub blocks_added: usize,
    pub errors: usize,
}

/// Pull the `YYYYMMDD_HHMMSS` timestamp out of a raw snapshot filename.
fn timestamp_from_filename(filename: &str) -> Option<&str> {
    let stem = filename
        .strip_prefix("live_data_")?
        .strip_suffix(".json")?;
    // Expect "YYYYMMDD_HHMMSS".
    let ok = stem.len() == 15
        && stem.as_bytes()[8] == b'_'
        && stem
            .bytes()
            .enumerate()
            .all(|(i, b)| i == 8 || b.is_ascii_digit());
    if ok {
        Some(stem)
    } else {
        None
    }
}

/// Reduce one snapshot to its top-K matches by spectator count.
///
/// Matches without an id or spectator count are ignored; matches without an
/// `activate_time` are excluded because the detail stage cannot age them.
fn top_matches_of(matches: &[LiveMatch], k: usize) -> BTreeMap<String, (u64, i64)> {
    let mut valid: Vec<(u64, u64, Option<i64>)> = matches
        .iter()
        .filter_map(|m| match (m.match_id, m.spectators) {
            (Some(id), Some(s)) if s >= 0 => Some((id, s as u64, m.activate_time)),
            _ => None,
        })
        .collect();
    valid.sort_by(|a, b| b.1.cmp(&a.1));

    let mut top = BTreeMap::new();
    for (id, spectators, activate_time) in valid.into_iter().take(k) {
        match activate_time {
            Some(at) => {
                top.insert(id.to_string(), (spectators, at));
            }
            None => warn!(
                "Match {} is missing activate_time; excluding from top matches",
                id
            ),
        }
    }
    top
}

/// Fold new raw snapshots into the filtered top-matches file.
///
/// Each raw file is processed once: its top-K block is appended (deduped by
/// timestamp) and the file is renamed with [`PROCESSED_PREFIX`]. Per-file
/// failures are counted, never fatal.
pub fn run(config: &Config) -> Result<FilterStats> {
    info!("Filtering top {} matches per snapshot...", config.top_matches);
    ensure_dir(&config.raw_dir())?;
    ensure_dir(&config.processed_dir())?;

    let output_file = config.filtered_live_file();
    let mut blocks: Vec<SnapshotBlock> = read_json_file(&output_file).unwrap_or_default();
    let mut seen: HashSet<String> = blocks.iter().map(|b| b.timestamp.clone()).collect();
    info!(
        "Loaded {} existing snapshot blocks ({} unique timestamps).",
        blocks.len(),
        seen.len()
    );

    let mut pending: Vec<(String, String)> = std::fs::read_dir(config.raw_dir())
        .with_context(|| format!("Failed to read raw directory {}", config.raw_dir().display()))?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| !name.starts_with(PROCESSED_PREFIX))
        .filter_map(|name| {
            let timestamp = timestamp_from_filename(&name)?.to_string();
            Some((name, timestamp))
        })
        .collect();
    pending.sort();
    info!("Found {} new raw snapshot files to process.", pending.len());

    let mut stats = FilterStats::default();

    for (filename, timestamp) in pending {
        let current_path = config.raw_dir().join(&filename);
        let processed_path = config.raw_dir().join(format!("{PROCESSED_PREFIX}{filename}"));

        if seen.contains(&timestamp) {
            warn!(
                "Timestamp {} already present in output; renaming {} without reprocessing.",
                timestamp, filename
            );
            if let Err(e) = std::fs::rename(&current_path, &processed_path) {
                warn!("Failed to rename already processed file {}: {}", filename, e);
                stats.errors += 1;
            }
            continue;
        }

        let matches: Vec<LiveMatch> = match read_json_file(&current_path) {
            Some(m) => m,
            None => {
                warn!("Failed to read or parse {}. Skipping.", filename);
                stats.errors += 1;
                continue;
            }
        };

        let top = top_matches_of(&matches, config.top_matches);
        if top.is_empty() {
            info!("No valid top matches in {}.", filename);
        } else {
            info!("Adding {} top matches for timestamp {}.", top.len(), timestamp);
            blocks.push(SnapshotBlock {
                timestamp: timestamp.clone(),
                top_matches: top,
            });
            seen.insert(timestamp);
            stats.blocks_added += 1;
        }

        if let Err(e) = std::fs::rename(&current_path, &processed_path) {
            warn!("Failed to rename {}: {}", filename, e);
            stats.errors += 1;
            continue;
        }
        stats.files_processed += 1;
    }

    if stats.blocks_added > 0 {
        blocks.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        write_json_file(&output_file, &blocks)?;
        info!(
            "Updated {} with {} new snapshot blocks.",
            output_file.display(),
            stats.blocks_added
        );
    } else if !output_file.exists() {
        write_json_file(&output_file, &blocks)?;
    }

    println!("\n--- Snapshot Filter Summary ---");
    println!("Files processed: {}", stats.files_processed);
    println!("New snapshot blocks added: {}", stats.blocks_added);
    println!("Files skipped/errored: {}", stats.errors);
    println!("Total blocks in output: {}", blocks.len());
    Ok(stats)
}
