use crate::db::ledger::Ledger;
use crate::db::store::{MatchEntry, Store};
use crate::models::MatchContribution;
use chrono::NaiveDate;
use tracing::{debug, info, warn};

/// What the engine did with a contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// First time this match id was seen.
    New,
    /// A larger spectator count replaced the match's previous contribution.
    Updated,
    /// The spectator count did not grow; nothing was mutated.
    Skipped,
}

/// Apply one validated contribution to the database.
///
/// Decision per match id M with incoming contribution C:
/// - no ledger entry for M: add C as a new contribution;
/// - ledger entry exists and `C.spectators` is strictly greater: remove the
///   old contribution (replaying the cosmetics list stored with the match,
///   not the newly observed one), then add C;
/// - otherwise: skip without mutating anything, which makes replaying the
///   same batch a no-op.
///
/// Upstream keeps a running maximum of spectators per match, so a strictly
/// greater count is the only signal that C supersedes the stored record.
/// Equal counts are exact-duplicate replays and must not mutate anything.
pub fn apply(c: &MatchContribution, store: &mut Store, ledger: &mut Ledger) -> Outcome {
    let mut is_update = false;

    if let Some(previous) = ledger.get(&c.match_id) {
        if c.spectators <= previous.spectators {
            debug!(
                "Skipping match {}: already applied with {} spectators (>= current {})",
                c.match_id, previous.spectators, c.spectators
            );
            return Outcome::Skipped;
        }

        info!(
            "Update for match {}: new spectators ({}) > old ({})",
            c.match_id, c.spectators, previous.spectators
        );

        // The ledger can point at a date the store no longer has if the
        // database file was edited or truncated between runs. There is
        // nothing trustworthy to remove, so fall through and add as new.
        match store.remove_match(previous.date, &c.match_id) {
            Some(old) => {
                remove_contribution(store, previous.date, c, &old);
                is_update = true;
            }
            None => {
                warn!(
                    "Stale ledger entry for match {}: no record on {}; treating as new",
                    c.match_id, previous.date
                );
            }
        }
    }

    for item in &c.cosmetics {
        store.apply_delta(c.date, item, c.spectators as i64);
    }
    store.add_match(
        c.date,
        &c.match_id,
        MatchEntry {
            spectators: c.spectators,
            cosmetics: c.cosmetics.clone(),
        },
    );
    ledger.record(&c.match_id, c.date, c.spectators);

    if is_update {
        Outcome::Updated
    } else {
        Outcome::New
    }
}

/// Subtract a match's previously applied contribution from its old date.
///
/// Replays the exact cosmetics list stored with the match entry. Database
/// files written before cosmetics were stored per match carry an empty list;
/// the newly observed list is the best approximation available there.
fn remove_contribution(
    store: &mut Store,
    prev_date: NaiveDate,
    c: &MatchContribution,
    old: &MatchEntry,
) {
    let items = if old.cosmetics.is_empty() && !c.cosmetics.is_empty() {
        warn!(
            "Match {} has no stored cosmetics; subtracting the current list instead",
            c.match_id
        );
        &c.cosmetics
    } else {
        &old.cosmetics
    };
    for item in items {
        store.apply_delta(prev_date, item, -(old.spectators as i64));
    }
}
