use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Day-resolution format used throughout the database files.
pub const DAY_FORMAT: &str = "%d/%m/%Y";

/// Parse a `DD/MM/YYYY` date string.
pub fn parse_day(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, DAY_FORMAT).ok()
}

/// Format a date as `DD/MM/YYYY`.
pub fn format_day(date: NaiveDate) -> String {
    date.format(DAY_FORMAT).to_string()
}

/// Convert a Unix timestamp (seconds) to the calendar day it falls on, UTC.
pub fn day_from_unix(unix_secs: i64) -> Option<NaiveDate> {
    chrono::DateTime::from_timestamp(unix_secs, 0).map(|dt| dt.date_naive())
}

/// Serde helper for the `DD/MM/YYYY` day fields in persisted files.
pub mod day_format {
    use super::DAY_FORMAT;
    use chrono::NaiveDate;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.format(DAY_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let s = String::deserialize(deserializer)?;
        NaiveDate::parse_from_str(&s, DAY_FORMAT).map_err(serde::de::Error::custom)
    }
}

/// Raw match record as written by the extraction stage, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawMatchRecord {
    #[serde(default)]
    pub match_id: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub cosmetics: Option<Vec<String>>,
    #[serde(default)]
    pub spectators: Option<i64>,
}

/// Why a raw record was refused by the validator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("match id is missing or empty")]
    MissingMatchId,
    #[error("date is missing")]
    MissingDate,
    #[error("date {0:?} is not in DD/MM/YYYY format")]
    BadDateFormat(String),
    #[error("cosmetics list is missing")]
    MissingCosmetics,
    #[error("spectator count is missing")]
    MissingSpectators,
    #[error("spectator count {0} is negative")]
    NegativeSpectators(i64),
}

/// A validated match contribution, ready for the aggregation engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchContribution {
    pub match_id: String,
    pub date: NaiveDate,
    /// Unique cosmetic names observed in the match. Duplicates within a match
    /// collapse to a single contribution each.
    pub cosmetics: Vec<String>,
    /// Peak spectator count recorded for this match across all snapshots.
    pub spectators: u64,
}

impl RawMatchRecord {
    /// Validate and normalize this record into a [`MatchContribution`].
    ///
    /// Pure function; every failure is reported as a [`RejectReason`], never
    /// as a panic or a fatal error. An empty cosmetics list is accepted: the
    /// engine still records the match with zero item impact.
    pub fn validate(&self) -> Result<MatchContribution, RejectReason> {
        let match_id = match self.match_id.as_deref() {
            Some(id) if !id.trim().is_empty() => id.to_string(),
            _ => return Err(RejectReason::MissingMatchId),
        };

        let date_str = self.date.as_deref().ok_or(RejectReason::MissingDate)?;
        let date =
            parse_day(date_str).ok_or_else(|| RejectReason::BadDateFormat(date_str.to_string()))?;

        let raw_cosmetics = self
            .cosmetics
            .as_ref()
            .ok_or(RejectReason::MissingCosmetics)?;

        // Collapse duplicate names while preserving first-seen order.
        let mut cosmetics = Vec::new();
        for name in raw_cosmetics {
            if !cosmetics.contains(name) {
                cosmetics.push(name.clone());
            }
        }

        let spectators = match self.spectators {
            Some(n) if n >= 0 => n as u64,
            Some(n) => return Err(RejectReason::NegativeSpectators(n)),
            None => return Err(RejectReason::MissingSpectators),
        };

        Ok(MatchContribution {
            match_id,
            date,
            cosmetics,
            spectators,
        })
    }
}
