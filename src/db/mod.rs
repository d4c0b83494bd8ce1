pub mod engine;
pub mod filter;
pub mod ledger;
pub mod serialize;
pub mod store;

pub use engine::{apply, Outcome};
pub use ledger::{Ledger, LedgerEntry};
pub use store::{DailyEntry, DayStats, MatchEntry, PersistedMatch, Store};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{parse_day, MatchContribution};
    use std::collections::HashSet;

    fn contrib(match_id: &str, date: &str, cosmetics: &[&str], spectators: u64) -> MatchContribution {
        MatchContribution {
            match_id: match_id.to_string(),
            date: parse_day(date).unwrap(),
            cosmetics: cosmetics.iter().map(|s| s.to_string()).collect(),
            spectators,
        }
    }

    /// End-to-end: empty database, three matches across two dates with
    /// overlapping cosmetics, one name marked non-marketable, both views
    /// persisted and reloaded.
    #[test]
    fn test_full_run_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("daily_cosmetic_stats.json");
        let filtered_path = dir.path().join("daily_cosmetic_stats_marketable.json");

        let mut store = Store::load(&db_path);
        let mut ledger = Ledger::build(&store);
        assert!(ledger.is_empty());

        let batch = [
            contrib("m1", "10/06/2024", &["Cape", "Hat"], 100),
            contrib("m2", "10/06/2024", &["Hat"], 40),
            contrib("m3", "11/06/2024", &["Cape", "Ward"], 25),
        ];
        for c in &batch {
            assert_eq!(apply(c, &mut store, &mut ledger), Outcome::New);
        }

        let d1 = parse_day("10/06/2024").unwrap();
        let d2 = parse_day("11/06/2024").unwrap();

        // Hand-computed sums for the original view.
        assert_eq!(store.get(d1).unwrap().items["Cape"], 100);
        assert_eq!(store.get(d1).unwrap().items["Hat"], 140);
        assert_eq!(store.get(d2).unwrap().items["Cape"], 25);
        assert_eq!(store.get(d2).unwrap().items["Ward"], 25);

        let non_marketable: HashSet<String> = ["Cape".to_string()].into_iter().collect();
        let filtered = filter::project(&store, &non_marketable);

        serialize::save(&db_path, &serialize::to_entries(&store)).unwrap();
        serialize::save(&filtered_path, &serialize::to_entries(&filtered)).unwrap();

        // The filtered view omits exactly the banned name from both dates and
        // leaves every other score unchanged.
        let filtered_back = Store::load(&filtered_path);
        assert!(!filtered_back.get(d1).unwrap().items.contains_key("Cape"));
        assert_eq!(filtered_back.get(d1).unwrap().items["Hat"], 140);
        assert!(!filtered_back.get(d2).unwrap().items.contains_key("Cape"));
        assert_eq!(filtered_back.get(d2).unwrap().items["Ward"], 25);

        // Reload the original view and rebuild the ledger: same state.
        let reloaded = Store::load(&db_path);
        let rebuilt = Ledger::build(&reloaded);
        assert_eq!(rebuilt.len(), 3);
        assert_eq!(rebuilt.get("m1").unwrap().spectators, 100);

        // Rerunning the same batch against the reloaded store is a no-op.
        let mut reloaded = reloaded;
        let mut rebuilt = rebuilt;
        for c in &batch {
            assert_eq!(apply(c, &mut reloaded, &mut rebuilt), Outcome::Skipped);
        }
        assert_eq!(
            serialize::to_json(&serialize::to_entries(&reloaded)).unwrap(),
            serialize::to_json(&serialize::to_entries(&store)).unwrap()
        );
    }
}
