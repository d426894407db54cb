//! Bargain Normalize - scores a raw listing batch.
//!
//! Reads `RAW_LISTINGS_PATH`, drops duplicates and non-module listings,
//! scores the rest and writes `results.json`.

use anyhow::Result;
use tracing::info;

use bargain::listing::{BatchSummary, DealGrade, BARGAIN_THRESHOLD};
use bargain::store::{load_raw_listings, ListingStore};
use bargain::{init_tracing, load_price_table, normalize, prepare_batch, Config};

/// Bargains listed individually in the log.
const TOP_BARGAINS: usize = 10;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!("normalize_starting");

    let config = Config::from_env();
    info!(
        raw_listings_path = %config.raw_listings_path.display(),
        data_dir = %config.data_dir.display(),
        price_table_path = ?config.price_table_path,
        "config_loaded"
    );

    let table = load_price_table(&config)?;

    let raws = load_raw_listings(&config.raw_listings_path).await?;
    let received = raws.len();
    let batch = prepare_batch(raws);
    let enriched = normalize(&batch, &table);

    let summary = BatchSummary::of(&enriched);
    info!(
        received = received,
        kept = summary.total,
        bargains = summary.bargains,
        average_price_per_gb = ?summary.average_price_per_unit,
        "normalize_complete"
    );

    for listing in enriched
        .iter()
        .filter(|l| l.bargain_score >= BARGAIN_THRESHOLD)
        .take(TOP_BARGAINS)
    {
        info!(
            score = listing.bargain_score,
            grade = DealGrade::from_score(listing.bargain_score).label(),
            price = ?listing.price(),
            price_per_gb = ?listing.price_per_unit,
            title = %listing.title(),
            url = %listing.url(),
            "bargain_found"
        );
    }

    ListingStore::new(config.results_path())
        .save(&config.search_query, enriched)
        .await?;

    Ok(())
}
