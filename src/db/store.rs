use crate::models::day_format;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::warn;

/// A match currently contributing to a date's item scores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchEntry {
    pub spectators: u64,
    /// The exact cosmetics list that was applied for this match, kept so an
    /// update can subtract precisely what was added.
    pub cosmetics: Vec<String>,
}

/// Aggregated stats for one calendar date.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DayStats {
    /// Item name -> accumulated spectator-weighted score.
    pub items: HashMap<String, u64>,
    /// Match id -> its current contribution to this date.
    pub matches: HashMap<String, MatchEntry>,
}

/// Persisted form of a match reference within a daily entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedMatch {
    pub match_id: String,
    pub spectators: u64,
    /// Older database files predate per-match cosmetics storage.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cosmetics: Vec<String>,
}

/// Persisted form of one date's aggregated stats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyEntry {
    #[serde(with = "day_format")]
    pub date: NaiveDate,
    pub items: BTreeMap<String, u64>,
    pub matches: Vec<PersistedMatch>,
}

/// In-memory cosmetic popularity database: per-date item counters plus the
/// matches currently contributing to each date.
///
/// Owned exclusively by a single run; loaded once, mutated in memory, then
/// serialized in full at the end.
#[derive(Debug, Clone, Default)]
pub struct Store {
    pub days: BTreeMap<NaiveDate, DayStats>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the database from a persisted JSON file.
    ///
    /// Lenient by design: a missing or unparseable file yields an empty store
    /// with a warning, and individual entries failing structural checks are
    /// dropped without aborting the load.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            warn!("Database file not found: {}. Starting empty.", path.display());
            return Self::new();
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                warn!(
                    "Failed to read database file {}: {}. Starting empty.",
                    path.display(),
                    e
                );
                return Self::new();
            }
        };

        let raw: Vec<serde_json::Value> = match serde_json::from_str(&content) {
            Ok(v) => v,
            Err(e) => {
                warn!(
                    "Database file {} is not a valid JSON array: {}. Starting empty.",
                    path.display(),
                    e
                );
                return Self::new();
            }
        };

        let mut entries = Vec::new();
        for value in raw {
            match serde_json::from_value::<DailyEntry>(value) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!("Dropping invalid daily entry from database: {}", e),
            }
        }

        Self::from_entries(entries)
    }

    /// Build a store from persisted daily entries.
    pub fn from_entries(entries: Vec<DailyEntry>) -> Self {
        let mut store = Self::new();
        for entry in entries {
            let day = store.day_mut(entry.date);
            for (name, score) in entry.items {
                day.items.insert(name, score);
            }
            for m in entry.matches {
                day.matches.insert(
                    m.match_id,
                    MatchEntry {
                        spectators: m.spectators,
                        cosmetics: m.cosmetics,
                    },
                );
            }
        }
        store
    }

    pub fn get(&self, date: NaiveDate) -> Option<&DayStats> {
        self.days.get(&date)
    }

    /// Return the entry for a date, creating an empty one if absent.
    pub fn day_mut(&mut self, date: NaiveDate) -> &mut DayStats {
        self.days.entry(date).or_default()
    }

    /// Add a signed amount to an item's score on a date, clamped at 0.
    ///
    /// The key is created at 0 first if absent, so a negative delta against a
    /// missing item leaves a 0 entry rather than underflowing.
    pub fn apply_delta(&mut self, date: NaiveDate, item: &str, delta: i64) {
        let day = self.day_mut(date);
        let score = day.items.entry(item.to_string()).or_insert(0);
        let updated = (*score as i64).saturating_add(delta);
        if updated < 0 {
            warn!(
                "Score for item {:?} on {} would go negative ({}); clamping to 0",
                item, date, updated
            );
        }
        *score = updated.max(0) as u64;
    }

    /// Record a match as contributing to a date. Re-adding an id that already
    /// exists on the date overwrites its entry rather than duplicating it.
    pub fn add_match(&mut self, date: NaiveDate, match_id: &str, entry: MatchEntry) {
        let day = self.day_mut(date);
        if day.matches.insert(match_id.to_string(), entry).is_some() {
            warn!(
                "Match {} was already recorded on {}; overwriting its entry",
                match_id, date
            );
        }
    }

    /// Remove a match's reference from a date, returning its stored entry.
    pub fn remove_match(&mut self, date: NaiveDate, match_id: &str) -> Option<MatchEntry> {
        self.days.get_mut(&date).and_then(|day| day.matches.remove(match_id))
    }

    /// Number of dates currently tracked.
    pub fn date_count(&self) -> usize {
        self.days.len()
    }

    /// Total number of match references across all dates.
    pub fn match_count(&self) -> usize {
        self.days.values().map(|d| d.matches.len()).sum()
    }
}
