use anyhow::Result;
use clap::{Parser, Subcommand};
use dota_cosmetic_stats::utils::config::Config;
use dota_cosmetic_stats::utils::data::read_json_file;
use dota_cosmetic_stats::{pipeline, scrapers};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dota-cosmetic-stats")]
#[command(about = "Track which Dota 2 cosmetics the most-watched matches are wearing")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Poll the OpenDota live endpoint and save raw snapshots (runs forever)
    Poll,
    /// Fold raw snapshots into the filtered top-matches file
    Filter,
    /// Download details for matches old enough to be complete
    Fetch,
    /// Extract per-match contribution records from downloaded details
    Extract,
    /// Apply contribution records to the cosmetic stats database
    Update,
    /// Run filter, fetch, extract and update in sequence
    Run,
    /// Scrape Steam market price histories for tracked cosmetics
    Prices {
        /// Also export the price database to this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Command::Poll => pipeline::poller::run(&config).await?,
        Command::Filter => {
            pipeline::top_matches::run(&config)?;
        }
        Command::Fetch => {
            pipeline::match_details::run(&config).await?;
        }
        Command::Extract => {
            pipeline::extract::run(&config)?;
        }
        Command::Update => {
            pipeline::update::run(&config)?;
        }
        Command::Run => {
            dota_cosmetic_stats::run_batch(&config).await?;
        }
        Command::Prices { csv } => {
            scrapers::steam_market::run(&config).await?;
            if let Some(path) = csv {
                let price_db: scrapers::steam_market::PriceDb =
                    read_json_file(&config.price_db_file()).unwrap_or_default();
                scrapers::steam_market::export_csv(&price_db, &path)?;
                println!("Price history exported to {}", path.display());
            }
        }
    }

    Ok(())
}
