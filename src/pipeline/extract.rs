use crate::api::opendota::MatchDetail;
use crate::pipeline::top_matches::SnapshotBlock;
use crate::utils::config::Config;
use crate::utils::data::{ensure_dir, read_json_file, write_json_file};
use anyhow::Result;
use std::collections::{BTreeSet, HashMap};
use tracing::{info, warn};

#[derive(Debug, Default)]
pub struct ExtractStats {
    pub processed: usize,
    pub skipped_existing: usize,
    pub errors: usize,
}

/// Peak spectator count per match id across every snapshot block.
///
/// This running maximum is what makes spectator counts monotonically
/// non-decreasing for a given match, which the aggregation engine relies on
/// to distinguish updates from replays.
pub fn build_spectator_map(blocks: &[SnapshotBlock]) -> HashMap<String, u64> {
    let mut map: HashMap<String, u64> = HashMap::new();
    for block in blocks {
        for (match_id, &(spectators, _)) in &block.top_matches {
            let entry = map.entry(match_id.clone()).or_insert(0);
            *entry = (*entry).max(spectators);
        }
    }
    map
}

/// Unique cosmetic names used across all players of a match, sorted.
pub fn extract_cosmetics(detail: &MatchDetail) -> Vec<String> {
    let names: BTreeSet<String> = detail
        .players
        .iter()
        .flat_map(|p| p.cosmetics.iter())
        .filter_map(|c| c.name.clone())
        .collect();
    names.into_iter().collect()
}

/// Turn downloaded match details into contribution records.
///
/// For each `<id>.json` in the matches directory without a corresponding
/// `filtered_<id>.json`, derive the match date from `start_time`, collect its
/// cosmetics, attach the peak spectator count, and write the record the
/// update stage consumes.
pub fn run(config: &Config) -> Result<ExtractStats> {
    info!("Extracting match data...");
    ensure_dir(&config.filtered_matches_dir())?;

    let blocks: Vec<SnapshotBlock> =
        read_json_file(&config.filtered_live_file()).unwrap_or_default();
    let spectator_map = build_spectator_map(&blocks);
    info!("Built spectator map for {} matches.", spectator_map.len());

    let mut stats = ExtractStats::default();

    let mut filenames: Vec<String> = std::fs::read_dir(config.matches_dir())
        .map(|dir| {
            dir.filter_map(|entry| entry.ok())
                .filter_map(|entry| entry.file_name().into_string().ok())
                .filter(|name| name.ends_with(".json"))
                .collect()
        })
        .unwrap_or_default();
    filenames.sort();

    for filename in filenames {
        let match_id = filename.trim_end_matches(".json").to_string();
        if match_id.is_empty() || !match_id.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }

        let output_path = config
            .filtered_matches_dir()
            .join(format!("filtered_{match_id}.json"));
        if output_path.exists() {
            stats.skipped_existing += 1;
            continue;
        }

        let detail: MatchDetail = match read_json_file(&config.matches_dir().join(&filename)) {
            Some(d) => d,
            None => {
                warn!("Failed to parse match detail {}.", filename);
                stats.errors += 1;
                continue;
            }
        };

        let date = match detail.start_time.and_then(crate::models::day_from_unix) {
            Some(d) => d,
            None => {
                warn!("Match {} has no usable start_time; skipping.", match_id);
                stats.errors += 1;
                continue;
            }
        };

        let spectators = match spectator_map.get(&match_id) {
            Some(&s) => s,
            None => {
                warn!(
                    "Match {} has no spectator data in any snapshot; skipping.",
                    match_id
                );
                stats.errors += 1;
                continue;
            }
        };

        let record = crate::models::RawMatchRecord {
            match_id: Some(match_id.clone()),
            date: Some(crate::models::format_day(date)),
            cosmetics: Some(extract_cosmetics(&detail)),
            spectators: Some(spectators as i64),
        };

        match write_json_file(&output_path, &record) {
            Ok(()) => {
                info!("Extracted match {} -> {}", match_id, output_path.display());
                stats.processed += 1;
            }
            Err(e) => {
                warn!("Failed to write contribution for {}: {}", match_id, e);
                stats.errors += 1;
            }
        }
    }

    println!("\n--- Extraction Summary ---");
    println!("Matches extracted: {}", stats.processed);
    println!("Skipped (already extracted): {}", stats.skipped_existing);
    println!("Errors: {}", stats.errors);
    Ok(stats)
}
