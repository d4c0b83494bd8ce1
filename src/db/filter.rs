use crate::db::store::{DayStats, Store};
use std::collections::HashSet;

/// Project the database to its marketable-only view.
///
/// Pure function over the store: items named in `non_marketable` and items
/// whose score has dropped to 0 are excluded, and dates left with no items at
/// all are omitted entirely. The match references are carried over unchanged
/// so the filtered file remains auditable against the original.
pub fn project(store: &Store, non_marketable: &HashSet<String>) -> Store {
    let mut filtered = Store::new();

    for (&date, day) in &store.days {
        let items: std::collections::HashMap<String, u64> = day
            .items
            .iter()
            .filter(|(name, &score)| score > 0 && !non_marketable.contains(*name))
            .map(|(name, &score)| (name.clone(), score))
            .collect();

        if items.is_empty() {
            continue;
        }

        filtered.days.insert(
            date,
            DayStats {
                items,
                matches: day.matches.clone(),
            },
        );
    }

    filtered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::store::MatchEntry;
    use crate::models::parse_day;

    fn set(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_excludes_non_marketable_and_zero_scores() {
        let mut store = Store::new();
        let d = parse_day("01/05/2024").unwrap();
        store.apply_delta(d, "Hat", 10);
        store.apply_delta(d, "Banned Hat", 20);
        store.apply_delta(d, "Ghost", 0);

        let filtered = project(&store, &set(&["Banned Hat"]));
        let day = filtered.get(d).unwrap();
        assert_eq!(day.items.len(), 1);
        assert_eq!(day.items["Hat"], 10);
    }

    #[test]
    fn test_omits_dates_left_empty() {
        let mut store = Store::new();
        let d1 = parse_day("01/05/2024").unwrap();
        let d2 = parse_day("02/05/2024").unwrap();
        store.apply_delta(d1, "Banned Hat", 10);
        store.apply_delta(d2, "Hat", 5);

        let filtered = project(&store, &set(&["Banned Hat"]));
        assert!(filtered.get(d1).is_none());
        assert!(filtered.get(d2).is_some());
        assert_eq!(filtered.date_count(), 1);
    }

    #[test]
    fn test_projection_invariant() {
        let mut store = Store::new();
        let d = parse_day("01/05/2024").unwrap();
        store.apply_delta(d, "A", 3);
        store.apply_delta(d, "B", 4);
        store.apply_delta(d, "C", 0);
        let banned = set(&["B"]);

        let filtered = project(&store, &banned);
        for (date, day) in &store.days {
            for (item, &score) in &day.items {
                let in_filtered = filtered
                    .get(*date)
                    .map(|f| f.items.contains_key(item))
                    .unwrap_or(false);
                let expected = score > 0 && !banned.contains(item);
                assert_eq!(in_filtered, expected, "item {item} on {date}");
            }
        }
    }

    #[test]
    fn test_does_not_mutate_source_and_keeps_matches() {
        let mut store = Store::new();
        let d = parse_day("01/05/2024").unwrap();
        store.apply_delta(d, "Hat", 10);
        store.apply_delta(d, "Banned Hat", 2);
        store.add_match(
            d,
            "m1",
            MatchEntry {
                spectators: 10,
                cosmetics: vec!["Hat".to_string()],
            },
        );
        let before = store.clone();

        let filtered = project(&store, &set(&["Banned Hat"]));
        assert_eq!(store.days, before.days);
        assert_eq!(filtered.get(d).unwrap().matches["m1"].spectators, 10);
    }
}
