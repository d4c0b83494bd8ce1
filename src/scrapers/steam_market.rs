use crate::db::store::DailyEntry;
use crate::models::day_format;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use rand::Rng;
use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

const MARKET_LISTING_BASE: &str = "https://steamcommunity.com/market/listings/570/";
const SCRIPT_FINGERPRINT: &str = "var line1=[[";

/// One raw point from the market page's embedded price chart.
#[derive(Debug, Clone, PartialEq)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
    pub volume: u64,
}

/// Consolidated prices for one item on one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPrice {
    #[serde(with = "day_format")]
    pub date: NaiveDate,
    pub median_price: f64,
    pub volume: u64,
}

/// Item name -> consolidated daily series, as persisted.
pub type PriceDb = HashMap<String, Vec<DailyPrice>>;

pub struct SteamMarketScraper {
    client: reqwest::Client,
}

impl SteamMarketScraper {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(
                    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                     (KHTML, like Gecko) Chrome/98.0.4758.102 Safari/537.36",
                )
                .timeout(Duration::from_secs(15))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    /// Fetch an item's market listing page and extract its price history.
    pub async fn fetch_price_history(&self, item: &str) -> Result<Vec<PricePoint>> {
        let base = reqwest::Url::parse(MARKET_LISTING_BASE).expect("valid base url");
        let url = base
            .join(item)
            .with_context(|| format!("Item name {:?} does not form a valid URL", item))?;

        info!("Fetching market page for {:?}: {}", item, url);
        let html = self
            .client
            .get(url)
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await
            .with_context(|| format!("Failed to fetch market page for {:?}", item))?
            .text()
            .await?;

        parse_price_history(&html)
            .with_context(|| format!("Failed to extract price history for {:?}", item))
    }
}

impl Default for SteamMarketScraper {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract the raw price series from a market listing page.
///
/// The chart data lives in an inline `<script>` as `var line1=[[...]];`, an
/// array of `["Mon DD YYYY HH: +0", price, "volume"]` triples. Pages without
/// it (no sales yet, or a CAPTCHA interstitial) are an error for this item
/// only.
pub fn parse_price_history(html: &str) -> Result<Vec<PricePoint>> {
    let document = Html::parse_document(html);
    let script_selector = Selector::parse("script").ok().context("Invalid script selector")?;

    let script = document
        .select(&script_selector)
        .map(|el| el.text().collect::<String>())
        .find(|text| text.contains(SCRIPT_FINGERPRINT))
        .context("No script containing the price chart found on page")?;

    let line1_re =
        Regex::new(r"\bvar\s+line1\s*=\s*(\[\[[\s\S]*?\]\]);").expect("valid line1 regex");
    let captured = line1_re
        .captures(&script)
        .and_then(|caps| caps.get(1))
        .context("Could not locate the line1 array in the chart script")?;

    let raw: Vec<serde_json::Value> =
        serde_json::from_str(captured.as_str()).context("line1 array is not valid JSON")?;

    let mut points = Vec::new();
    for entry in raw {
        match parse_point(&entry) {
            Some(point) => points.push(point),
            None => warn!("Skipping malformed price point: {}", entry),
        }
    }
    Ok(points)
}

/// Parse one `["May 21 2015 01: +0", 0.45, "14"]` triple.
fn parse_point(value: &serde_json::Value) -> Option<PricePoint> {
    let arr = value.as_array()?;
    let ts = arr.first()?.as_str()?;
    let price = arr.get(1)?.as_f64()?;
    let volume: u64 = arr.get(2)?.as_str()?.parse().ok()?;

    // "May 21 2015 01: +0" -> take the month/day/year columns.
    let mut parts = ts.split_whitespace();
    let month = parts.next()?;
    let day = parts.next()?;
    let year = parts.next()?;
    let date =
        NaiveDate::parse_from_str(&format!("{} {} {}", month, day, year), "%b %d %Y").ok()?;

    Some(PricePoint { date, price, volume })
}

/// Collapse raw hourly points into per-day median price and summed volume.
pub fn consolidate_daily(points: &[PricePoint]) -> Vec<DailyPrice> {
    let mut by_day: BTreeMap<NaiveDate, (Vec<f64>, u64)> = BTreeMap::new();
    for p in points {
        let (prices, volume) = by_day.entry(p.date).or_default();
        prices.push(p.price);
        *volume += p.volume;
    }

    by_day
        .into_iter()
        .map(|(date, (mut prices, volume))| {
            prices.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            let mid = prices.len() / 2;
            let median_price = if prices.len() % 2 == 1 {
                prices[mid]
            } else {
                (prices[mid - 1] + prices[mid]) / 2.0
            };
            DailyPrice {
                date,
                median_price,
                volume,
            }
        })
        .collect()
}

/// Collect the item names to price: everything appearing in the marketable
/// database view, plus anything already present in the price database.
pub fn items_to_process(marketable_db: &[DailyEntry], price_db: &PriceDb) -> Vec<String> {
    let mut names: HashSet<String> = price_db.keys().cloned().collect();
    for entry in marketable_db {
        names.extend(entry.items.keys().cloned());
    }
    let mut sorted: Vec<String> = names.into_iter().collect();
    sorted.sort();
    sorted
}

/// Export the consolidated series as CSV, one row per item-day.
pub fn export_csv(price_db: &PriceDb, path: &Path) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("Failed to create {}", path.display()))?;
    writer.write_record(["item", "date", "median_price", "volume"])?;

    let mut items: Vec<&String> = price_db.keys().collect();
    items.sort();
    for item in items {
        for day in &price_db[item] {
            writer.write_record([
                item.as_str(),
                &crate::models::format_day(day.date),
                &format!("{:.2}", day.median_price),
                &day.volume.to_string(),
            ])?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Fetch and consolidate price histories for every known marketable item.
///
/// Progress is saved every few items so a long scrape that dies partway
/// keeps what it already gathered. Page-level failures skip the item.
pub async fn run(config: &crate::utils::config::Config) -> Result<()> {
    let marketable_db: Vec<DailyEntry> =
        crate::utils::data::read_json_file(&config.filtered_db_file()).unwrap_or_default();

    let price_db_path = config.price_db_file();
    let mut price_db: PriceDb = if price_db_path.exists() {
        let content = std::fs::read_to_string(&price_db_path)
            .with_context(|| format!("Failed to read {}", price_db_path.display()))?;
        if content.trim().is_empty() {
            warn!("Price database file is empty. Starting with an empty database.");
            PriceDb::new()
        } else {
            // A corrupt price database is fatal: overwriting it would throw
            // away history the scrape cannot recover.
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", price_db_path.display()))?
        }
    } else {
        info!("Price database not found. Starting with an empty database.");
        PriceDb::new()
    };

    let items = items_to_process(&marketable_db, &price_db);
    if items.is_empty() {
        info!("No items found in the marketable database or price database. Nothing to do.");
        return Ok(());
    }
    info!("Found {} unique items to process.", items.len());

    crate::utils::data::ensure_dir(&config.db_dir())?;
    let scraper = SteamMarketScraper::new();
    let mut updated = 0usize;
    let mut failed = 0usize;

    for (index, item) in items.iter().enumerate() {
        match scraper.fetch_price_history(item).await {
            Ok(points) => {
                let daily = consolidate_daily(&points);
                info!(
                    "Extracted {} points ({} days) for {:?}",
                    points.len(),
                    daily.len(),
                    item
                );
                price_db.insert(item.clone(), daily);
                updated += 1;

                if (index + 1) % 10 == 0 {
                    info!("Saving progress after {} items...", index + 1);
                    if let Err(e) = crate::utils::data::write_json_file(&price_db_path, &price_db)
                    {
                        warn!("Failed to save progress: {}", e);
                    }
                }
            }
            Err(e) => {
                warn!("Skipping {:?}: {}", item, e);
                failed += 1;
            }
        }

        // Random spacing keeps the scrape under the market's rate limits.
        let pause = rand::thread_rng().gen_range(2_000..6_000);
        tokio::time::sleep(Duration::from_millis(pause)).await;
    }

    crate::utils::data::write_json_file(&price_db_path, &price_db)?;
    println!("\n--- Price History Summary ---");
    println!("Items updated: {}", updated);
    println!("Items failed: {}", failed);
    println!("Total items in price database: {}", price_db.len());
    println!("Saved price database to: {}", price_db_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    const SAMPLE_PAGE: &str = r#"
        <html><head><script>var g_rgAppContextData = {};</script></head>
        <body>
        <script>
            var line1=[["May 21 2015 01: +0",0.45,"14"],["May 21 2015 13: +0",0.55,"6"],["May 22 2015 01: +0",0.60,"3"]];
            g_timePriceHistoryEarliest = new Date();
        </script>
        </body></html>
    "#;

    #[test]
    fn test_parse_price_history_from_page() {
        let points = parse_price_history(SAMPLE_PAGE).unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].date, date(2015, 5, 21));
        assert_eq!(points[0].price, 0.45);
        assert_eq!(points[0].volume, 14);
        assert_eq!(points[2].date, date(2015, 5, 22));
    }

    #[test]
    fn test_parse_price_history_missing_chart() {
        let html = "<html><body><script>var unrelated = 1;</script></body></html>";
        assert!(parse_price_history(html).is_err());
    }

    #[test]
    fn test_parse_point_skips_malformed() {
        let bad = serde_json::json!(["not a date", "x", "y"]);
        assert!(parse_point(&bad).is_none());
        let good = serde_json::json!(["Jan 02 2021 01: +0", 1.25, "7"]);
        let p = parse_point(&good).unwrap();
        assert_eq!(p.date, date(2021, 1, 2));
        assert_eq!(p.volume, 7);
    }

    #[test]
    fn test_consolidate_daily_median_and_volume() {
        let points = vec![
            PricePoint { date: date(2021, 1, 2), price: 1.0, volume: 5 },
            PricePoint { date: date(2021, 1, 2), price: 3.0, volume: 2 },
            PricePoint { date: date(2021, 1, 2), price: 2.0, volume: 1 },
            PricePoint { date: date(2021, 1, 3), price: 4.0, volume: 7 },
            PricePoint { date: date(2021, 1, 3), price: 6.0, volume: 1 },
        ];

        let daily = consolidate_daily(&points);
        assert_eq!(daily.len(), 2);
        // Odd count: middle value. Even count: mean of the two middles.
        assert_eq!(daily[0].median_price, 2.0);
        assert_eq!(daily[0].volume, 8);
        assert_eq!(daily[1].median_price, 5.0);
        assert_eq!(daily[1].volume, 8);
        // Output is ordered by date.
        assert!(daily[0].date < daily[1].date);
    }

    #[test]
    fn test_items_to_process_unions_sources() {
        let mut price_db = PriceDb::new();
        price_db.insert("Old Item".to_string(), vec![]);

        let entries = vec![DailyEntry {
            date: date(2024, 6, 1),
            items: [("New Item".to_string(), 5u64)].into_iter().collect(),
            matches: vec![],
        }];

        let items = items_to_process(&entries, &price_db);
        assert_eq!(items, vec!["New Item".to_string(), "Old Item".to_string()]);
    }

    #[test]
    fn test_export_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prices.csv");
        let mut price_db = PriceDb::new();
        price_db.insert(
            "Hat".to_string(),
            vec![DailyPrice {
                date: date(2021, 1, 2),
                median_price: 1.25,
                volume: 7,
            }],
        );

        export_csv(&price_db, &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("item,date,median_price,volume"));
        assert!(content.contains("Hat,02/01/2021,1.25,7"));
    }

    #[tokio::test]
    #[ignore]
    async fn test_fetch_price_history_real() {
        let scraper = SteamMarketScraper::new();
        let points = scraper
            .fetch_price_history("Hides of Hostility - Off-Hand")
            .await
            .unwrap();
        assert!(!points.is_empty());
    }
}
