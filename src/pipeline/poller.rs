use crate::api::opendota::OpenDotaClient;
use crate::utils::config::Config;
use crate::utils::data::ensure_dir;
use anyhow::Result;
use std::time::Duration;
use tracing::{error, info, warn};

/// File name for one snapshot, stamped with local wall-clock time.
fn snapshot_filename(now: chrono::DateTime<chrono::Local>) -> String {
    format!("live_data_{}.json", now.format("%Y%m%d_%H%M%S"))
}

/// Fetch one live snapshot and persist it to the raw directory.
async fn capture_snapshot(client: &OpenDotaClient, config: &Config) -> Result<()> {
    let data = client.fetch_live().await?;

    let filename = snapshot_filename(chrono::Local::now());
    let path = config.raw_dir().join(&filename);
    info!("Saving snapshot to: {}", path.display());

    match &data {
        serde_json::Value::Array(matches) if matches.is_empty() => {
            warn!("Snapshot is an empty array. Server returned no live games?");
        }
        serde_json::Value::Array(matches) => {
            info!("Snapshot contains {} live matches.", matches.len());
        }
        _ => {
            warn!("Snapshot is not a JSON array; saving for inspection anyway.");
        }
    }

    if let Err(e) = crate::utils::data::write_json_file(&path, &data) {
        // Don't leave a truncated snapshot behind for stage 2 to trip over.
        if path.exists() {
            if let Err(cleanup) = std::fs::remove_file(&path) {
                error!("Failed to clean up partial snapshot {}: {}", filename, cleanup);
            } else {
                info!("Cleaned up partial snapshot: {}", filename);
            }
        }
        return Err(e);
    }
    Ok(())
}

/// Poll the live endpoint forever, one snapshot per interval.
pub async fn run(config: &Config) -> Result<()> {
    ensure_dir(&config.raw_dir())?;

    let client = OpenDotaClient::new(
        config.live_url.clone(),
        config.match_base_url.clone(),
        config.request_timeout_secs,
    );

    info!(
        "Starting live data poller. Interval: {} seconds.",
        config.poll_interval_secs
    );

    loop {
        if let Err(e) = capture_snapshot(&client, config).await {
            error!("Snapshot capture failed: {:#}", e);
        }
        info!("Waiting {} seconds until next poll...", config.poll_interval_secs);
        tokio::time::sleep(Duration::from_secs(config.poll_interval_secs)).await;
    }
}
