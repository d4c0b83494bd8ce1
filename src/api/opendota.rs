use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

/// One match from the live snapshot endpoint. Fields the API omits or mangles
/// arrive as `None` and are filtered out downstream instead of failing the
/// whole snapshot.
#[derive(Debug, Clone, Deserialize)]
pub struct LiveMatch {
    #[serde(default)]
    pub match_id: Option<u64>,
    #[serde(default)]
    pub spectators: Option<i64>,
    #[serde(default)]
    pub activate_time: Option<i64>,
}

/// Relevant slice of a full match detail payload.
#[derive(Debug, Clone, Deserialize)]
pub struct MatchDetail {
    #[serde(default)]
    pub start_time: Option<i64>,
    #[serde(default)]
    pub players: Vec<PlayerSlot>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayerSlot {
    #[serde(default)]
    pub cosmetics: Vec<Cosmetic>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Cosmetic {
    #[serde(default)]
    pub name: Option<String>,
}

/// Result of a per-match detail fetch. A 404 is an expected signal (the match
/// never got parsed server-side), distinct from transport errors.
#[derive(Debug)]
pub enum MatchFetch {
    Fetched(serde_json::Value),
    NotFound,
}

pub struct OpenDotaClient {
    client: reqwest::Client,
    live_url: String,
    match_base_url: String,
}

impl OpenDotaClient {
    pub fn new(live_url: String, match_base_url: String, timeout_secs: u64) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            live_url,
            match_base_url,
        }
    }

    /// Fetch the current live snapshot as raw JSON.
    ///
    /// The payload is kept untyped here so the poller can persist exactly
    /// what the API returned; the top-K stage parses it leniently later.
    pub async fn fetch_live(&self) -> Result<serde_json::Value> {
        let response = self
            .client
            .get(&self.live_url)
            .send()
            .await
            .context("Failed to fetch live matches from OpenDota")?;

        if !response.status().is_success() {
            anyhow::bail!("OpenDota live endpoint returned error: {}", response.status());
        }

        let data: serde_json::Value = response
            .json()
            .await
            .context("Failed to parse live snapshot response")?;

        if !data.is_array() {
            warn!("Live snapshot response is not a JSON array; saving as-is for inspection");
        }
        Ok(data)
    }

    /// Fetch the full detail payload for one match id.
    pub async fn fetch_match(&self, match_id: &str) -> Result<MatchFetch> {
        let url = format!("{}{}", self.match_base_url, match_id);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch match {} from OpenDota", match_id))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(MatchFetch::NotFound);
        }
        if !response.status().is_success() {
            anyhow::bail!(
                "OpenDota match endpoint returned {} for match {}",
                response.status(),
                match_id
            );
        }

        let data: serde_json::Value = response
            .json()
            .await
            .with_context(|| format!("Failed to parse detail response for match {}", match_id))?;
        Ok(MatchFetch::Fetched(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_match_lenient_parse() {
        let json = r#"[
            {"match_id": 123, "spectators": 50, "activate_time": 1700000000},
            {"match_id": 456, "spectators": 10},
            {"spectators": 5, "activate_time": 1700000001},
            {"unexpected": true}
        ]"#;
        let matches: Vec<LiveMatch> = serde_json::from_str(json).unwrap();
        assert_eq!(matches.len(), 4);
        assert_eq!(matches[0].match_id, Some(123));
        assert!(matches[1].activate_time.is_none());
        assert!(matches[2].match_id.is_none());
    }

    #[test]
    fn test_match_detail_parse_collects_cosmetics() {
        let json = r#"{
            "start_time": 1700000000,
            "players": [
                {"cosmetics": [{"name": "Hat"}, {"name": "Sword"}, {}]},
                {"cosmetics": []},
                {}
            ]
        }"#;
        let detail: MatchDetail = serde_json::from_str(json).unwrap();
        assert_eq!(detail.start_time, Some(1_700_000_000));
        assert_eq!(detail.players.len(), 3);
        assert_eq!(detail.players[0].cosmetics.len(), 3);
        assert_eq!(detail.players[0].cosmetics[0].name.as_deref(), Some("Hat"));
        assert!(detail.players[0].cosmetics[2].name.is_none());
    }

    #[tokio::test]
    #[ignore]
    async fn test_fetch_live_real() {
        let client = OpenDotaClient::new(
            "https://api.opendota.com/api/live".to_string(),
            "https://api.opendota.com/api/matches/".to_string(),
            30,
        );
        let data = client.fetch_live().await.unwrap();
        assert!(data.is_array());
    }
}
