use std::path::PathBuf;

const OPENDOTA_LIVE_URL: &str = "https://api.opendota.com/api/live";
const OPENDOTA_MATCH_BASE_URL: &str = "https://api.opendota.com/api/matches/";

/// Runtime configuration for the pipeline.
///
/// Everything has a working default; individual values can be overridden via
/// environment variables (loaded from `.env` at startup).
#[derive(Debug, Clone)]
pub struct Config {
    pub base_data_dir: PathBuf,
    pub live_url: String,
    pub match_base_url: String,
    /// Seconds between live snapshot fetches in the polling loop.
    pub poll_interval_secs: u64,
    /// How many matches, by spectators, to keep from each snapshot.
    pub top_matches: usize,
    /// A match must be at least this old before details are downloaded.
    pub min_match_age_hours: u64,
    /// Fixed delay between per-match detail requests.
    pub request_delay_ms: u64,
    pub request_timeout_secs: u64,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            base_data_dir: PathBuf::from(
                std::env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()),
            ),
            live_url: std::env::var("OPENDOTA_LIVE_URL")
                .unwrap_or_else(|_| OPENDOTA_LIVE_URL.to_string()),
            match_base_url: std::env::var("OPENDOTA_MATCH_BASE_URL")
                .unwrap_or_else(|_| OPENDOTA_MATCH_BASE_URL.to_string()),
            poll_interval_secs: env_or("POLL_INTERVAL_SECS", 900),
            top_matches: env_or("TOP_MATCHES", 15),
            min_match_age_hours: env_or("MIN_MATCH_AGE_HOURS", 3),
            request_delay_ms: env_or("REQUEST_DELAY_MS", 20_000),
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 30),
        }
    }

    /// Raw live snapshots, one file per poll.
    pub fn raw_dir(&self) -> PathBuf {
        self.base_data_dir.join("raw")
    }

    /// Consolidated top-K snapshot blocks.
    pub fn processed_dir(&self) -> PathBuf {
        self.base_data_dir.join("processed")
    }

    pub fn filtered_live_file(&self) -> PathBuf {
        self.processed_dir().join("filtered_live_matches.json")
    }

    /// Downloaded full match details, one file per match id.
    pub fn matches_dir(&self) -> PathBuf {
        self.base_data_dir.join("matches")
    }

    /// Extracted per-match contribution records.
    pub fn filtered_matches_dir(&self) -> PathBuf {
        self.base_data_dir.join("filtered_matches")
    }

    pub fn db_dir(&self) -> PathBuf {
        self.base_data_dir.join("database")
    }

    pub fn db_file(&self) -> PathBuf {
        self.db_dir().join("daily_cosmetic_stats.json")
    }

    pub fn filtered_db_file(&self) -> PathBuf {
        self.db_dir().join("daily_cosmetic_stats_marketable.json")
    }

    pub fn non_marketable_file(&self) -> PathBuf {
        self.base_data_dir.join("nonmarketable.txt")
    }

    pub fn price_db_file(&self) -> PathBuf {
        self.db_dir().join("price_history.json")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
