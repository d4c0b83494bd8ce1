use crate::db::store::Store;
use chrono::NaiveDate;
use std::collections::HashMap;

/// The last-applied contribution for a match id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerEntry {
    pub date: NaiveDate,
    pub spectators: u64,
}

/// Derived index from match id to its most recently applied contribution.
///
/// The ledger is a cache over [`Store`], never a source of truth: it is
/// rebuilt from the store's match references on every load and is never
/// persisted independently, so the two cannot drift apart between runs.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    entries: HashMap<String, LedgerEntry>,
}

impl Ledger {
    /// Rebuild the index by scanning every date's match references.
    pub fn build(store: &Store) -> Self {
        let mut entries = HashMap::new();
        for (&date, day) in &store.days {
            for (match_id, m) in &day.matches {
                entries.insert(
                    match_id.clone(),
                    LedgerEntry {
                        date,
                        spectators: m.spectators,
                    },
                );
            }
        }
        Self { entries }
    }

    pub fn get(&self, match_id: &str) -> Option<LedgerEntry> {
        self.entries.get(match_id).copied()
    }

    /// Record the contribution just applied for a match.
    pub fn record(&mut self, match_id: &str, date: NaiveDate, spectators: u64) {
        self.entries.insert(match_id.to_string(), LedgerEntry { date, spectators });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
