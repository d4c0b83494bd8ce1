use crate::api::opendota::{MatchFetch, OpenDotaClient};
use crate::pipeline::top_matches::SnapshotBlock;
use crate::utils::config::Config;
use crate::utils::data::{ensure_dir, read_json_file, write_json_file};
use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Default)]
pub struct FetchStats {
    pub eligible: usize,
    pub fetched: usize,
    pub skipped_existing: usize,
    pub not_found: usize,
    pub errors: usize,
}

/// Collect the unique match ids old enough to have complete details.
///
/// A live match only gets a parsed detail record a while after it ends, so
/// ids are held back until `min_age_hours` have passed since activation.
pub fn mature_match_ids(blocks: &[SnapshotBlock], now_unix: i64, min_age_hours: u64) -> Vec<String> {
    let min_age_secs = min_age_hours as i64 * 3600;
    let mut ids = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for block in blocks {
        for (match_id, &(_, activate_time)) in &block.top_matches {
            if now_unix - activate_time >= min_age_secs {
                if seen.insert(match_id.clone()) {
                    ids.push(match_id.clone());
                }
            }
        }
    }
    ids
}

/// Download details for every mature match that is not already on disk.
///
/// Requests are spaced by the configured delay; a 404 means the match will
/// never be available and is counted separately from transport errors.
/// No per-match failure aborts the run.
pub async fn run(config: &Config) -> Result<FetchStats> {
    info!("Fetching match details...");
    ensure_dir(&config.matches_dir())?;

    let blocks: Vec<SnapshotBlock> = read_json_file(&config.filtered_live_file())
        .with_context(|| {
            format!(
                "Failed to load filtered matches file {}",
                config.filtered_live_file().display()
            )
        })?;

    let now = chrono::Utc::now().timestamp();
    let ids = mature_match_ids(&blocks, now, config.min_match_age_hours);
    info!(
        "Found {} unique match ids meeting the {}h age requirement.",
        ids.len(),
        config.min_match_age_hours
    );

    let mut stats = FetchStats {
        eligible: ids.len(),
        ..Default::default()
    };
    if ids.is_empty() {
        return Ok(stats);
    }

    let client = OpenDotaClient::new(
        config.live_url.clone(),
        config.match_base_url.clone(),
        config.request_timeout_secs,
    );

    let mut any_request_made = false;
    for (i, match_id) in ids.iter().enumerate() {
        let path = config.matches_dir().join(format!("{match_id}.json"));
        info!("({}/{}) Checking match {}...", i + 1, ids.len(), match_id);

        if path.exists() {
            info!("Skipping {}.json (already exists)", match_id);
            stats.skipped_existing += 1;
            continue;
        }

        if any_request_made {
            tokio::time::sleep(Duration::from_millis(config.request_delay_ms)).await;
        }
        any_request_made = true;

        match client.fetch_match(match_id).await {
            Ok(MatchFetch::Fetched(detail)) => match write_json_file(&path, &detail) {
                Ok(()) => {
                    info!("Saved match detail to {}.json", match_id);
                    stats.fetched += 1;
                }
                Err(e) => {
                    warn!("Failed to write detail for {}: {}", match_id, e);
                    stats.errors += 1;
                }
            },
            Ok(MatchFetch::NotFound) => {
                warn!("Match {} not found on OpenDota (404).", match_id);
                stats.not_found += 1;
            }
            Err(e) => {
                warn!("Failed to fetch match {}: {:#}", match_id, e);
                stats.errors += 1;
            }
        }
    }

    println!("\n--- Match Detail Fetch Summary ---");
    println!("Matches meeting age criteria: {}", stats.eligible);
    println!("Successfully downloaded: {}", stats.fetched);
    println!("Skipped (already existed): {}", stats.skipped_existing);
    println!("Not found (404): {}", stats.not_found);
    println!("Errors (network/API/write): {}", stats.errors);
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn block(timestamp: &str, matches: &[(&str, u64, i64)]) -> SnapshotBlock {
        SnapshotBlock {
            timestamp: timestamp.to_string(),
            top_matches: matches
                .iter()
                .map(|&(id, s, at)| (id.to_string(), (s, at)))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn test_mature_match_ids_applies_age_threshold() {
        let now = 1_700_010_000;
        let blocks = vec![block(
            "20240610_090000",
            &[
                ("old", 100, now - 4 * 3600),
                ("fresh", 200, now - 3600),
                ("exact", 300, now - 3 * 3600),
            ],
        )];

        let ids = mature_match_ids(&blocks, now, 3);
        assert!(ids.contains(&"old".to_string()));
        assert!(ids.contains(&"exact".to_string()));
        assert!(!ids.contains(&"fresh".to_string()));
    }

    #[test]
    fn test_mature_match_ids_dedups_across_blocks() {
        let now = 1_700_010_000;
        let at = now - 10 * 3600;
        let blocks = vec![
            block("20240610_090000", &[("m1", 100, at)]),
            block("20240610_091500", &[("m1", 150, at), ("m2", 10, at)]),
        ];

        let ids = mature_match_ids(&blocks, now, 3);
        assert_eq!(ids.len(), 2);
    }
}
