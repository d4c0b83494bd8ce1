use crate::db::{self, Ledger, Outcome, Store};
use crate::models::RawMatchRecord;
use crate::utils::config::Config;
use crate::utils::data::{ensure_dir, load_non_marketable, read_json_file};
use anyhow::{Context, Result};
use tracing::{error, info, warn};

/// End-of-run report for one aggregation batch: per-outcome counts plus the
/// save status of each database view.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub files_found: usize,
    pub new: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: usize,
    pub dates_tracked: usize,
    pub matches_tracked: usize,
    pub non_marketable_count: usize,
    pub db_saved: bool,
    pub filtered_db_saved: bool,
}

impl RunSummary {
    pub fn print(&self, config: &Config) {
        println!("\n--- Database Update Summary ---");
        println!("Contribution files found: {}", self.files_found);
        println!("New matches added: {}", self.new);
        println!("Existing matches updated: {}", self.updated);
        println!("Matches skipped (no spectator growth): {}", self.skipped);
        println!("Files errored/rejected: {}", self.errors);
        println!("Total dates in database: {}", self.dates_tracked);
        println!("Total unique matches tracked: {}", self.matches_tracked);
        println!("Non-marketable items listed: {}", self.non_marketable_count);
        println!(
            "Original view saved: {} ({})",
            self.db_saved,
            config.db_file().display()
        );
        if self.non_marketable_count > 0 {
            println!(
                "Filtered view saved: {} ({})",
                self.filtered_db_saved,
                config.filtered_db_file().display()
            );
        } else {
            println!("Filtered view skipped: non-marketable list empty or missing.");
        }
    }
}

/// Is this a `filtered_<digits>.json` contribution file?
fn is_contribution_file(name: &str) -> bool {
    name.strip_prefix("filtered_")
        .and_then(|rest| rest.strip_suffix(".json"))
        .map(|id| !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(false)
}

/// Run one aggregation batch over the extracted contribution files.
///
/// Loads the persisted database, rebuilds the ledger, applies every
/// contribution in filename order, then persists the original and filtered
/// views. The two writes are attempted independently so one failing cannot
/// block the other. Only an unreachable storage directory is fatal.
pub fn run(config: &Config) -> Result<RunSummary> {
    info!("Updating cosmetic stats database...");
    ensure_dir(&config.db_dir()).context("Database directory cannot be created/accessed")?;

    let input_dir = config.filtered_matches_dir();
    if !input_dir.exists() {
        anyhow::bail!("Input directory {} not found", input_dir.display());
    }

    let non_marketable = load_non_marketable(&config.non_marketable_file());

    let mut store = Store::load(&config.db_file());
    let mut ledger = Ledger::build(&store);
    info!(
        "Database loaded: {} dates, {} previously processed matches.",
        store.date_count(),
        ledger.len()
    );

    let mut filenames: Vec<String> = std::fs::read_dir(&input_dir)
        .with_context(|| format!("Failed to read input directory {}", input_dir.display()))?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| is_contribution_file(name))
        .collect();
    filenames.sort();
    info!("Found {} contribution files to process.", filenames.len());

    let mut summary = RunSummary {
        files_found: filenames.len(),
        non_marketable_count: non_marketable.len(),
        ..Default::default()
    };

    for filename in &filenames {
        let raw: RawMatchRecord = match read_json_file(&input_dir.join(filename)) {
            Some(r) => r,
            None => {
                warn!("Skipping {}: unreadable or invalid JSON.", filename);
                summary.errors += 1;
                continue;
            }
        };

        let contribution = match raw.validate() {
            Ok(c) => c,
            Err(reason) => {
                warn!("Skipping {}: {}", filename, reason);
                summary.errors += 1;
                continue;
            }
        };

        match db::apply(&contribution, &mut store, &mut ledger) {
            Outcome::New => summary.new += 1,
            Outcome::Updated => summary.updated += 1,
            Outcome::Skipped => summary.skipped += 1,
        }
    }

    summary.dates_tracked = store.date_count();
    summary.matches_tracked = ledger.len();

    // Persist the original view.
    match db::serialize::save(&config.db_file(), &db::serialize::to_entries(&store)) {
        Ok(()) => {
            info!("Original database saved to {}", config.db_file().display());
            summary.db_saved = true;
        }
        Err(e) => error!("Failed to save original database: {:#}", e),
    }

    // Persist the filtered view, independently of the original's outcome.
    if !non_marketable.is_empty() {
        let filtered = db::filter::project(&store, &non_marketable);
        match db::serialize::save(
            &config.filtered_db_file(),
            &db::serialize::to_entries(&filtered),
        ) {
            Ok(()) => {
                info!(
                    "Filtered database saved to {}",
                    config.filtered_db_file().display()
                );
                summary.filtered_db_saved = true;
            }
            Err(e) => error!("Failed to save filtered database: {:#}", e),
        }
    } else {
        info!("Skipping filtered view: non-marketable list empty or missing.");
    }

    summary.print(config);
    Ok(summary)
}
