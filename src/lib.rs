pub mod api;
pub mod db;
pub mod models;
pub mod pipeline;
pub mod scrapers;
pub mod utils;

pub use db::{Ledger, Outcome, Store};
pub use models::{MatchContribution, RawMatchRecord, RejectReason};
pub use utils::config::Config;

use anyhow::Result;

/// Run the offline half of the pipeline once: filter snapshots, fetch mature
/// match details, extract contribution records, and fold them into the
/// database. The poller is a long-running process and is started separately.
pub async fn run_batch(config: &Config) -> Result<pipeline::update::RunSummary> {
    pipeline::top_matches::run(config)?;
    pipeline::match_details::run(config).await?;
    pipeline::extract::run(config)?;
    pipeline::update::run(config)
}
