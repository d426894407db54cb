//! Bargain Offers - builds the offer queue from scored results.
//!
//! Reads `results.json`, keeps listings in the target regions (or with
//! shipping), prices a counter-offer for each and writes `offers.json`.

use anyhow::{Context, Result};
use tracing::info;

use bargain::store::{ListingStore, OfferStore};
use bargain::{generate_offers, init_tracing, Config, RegionPolicy};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!("offers_starting");

    let config = Config::from_env();
    info!(
        data_dir = %config.data_dir.display(),
        target_regions = ?config.target_regions,
        "config_loaded"
    );

    let results = ListingStore::new(config.results_path())
        .load()
        .await?
        .with_context(|| format!("No results at {}", config.results_path().display()))?;

    let policy = RegionPolicy::new(&config.target_regions);
    let offers = generate_offers(&results.listings, &config.offer_template, &policy);

    for offer in &offers {
        info!(
            offer_id = %offer.id,
            asking_price = offer.asking_price,
            offer_price = offer.offer_price,
            discount_percent = offer.discount_percent,
            bargain_score = offer.bargain_score,
            location = %offer.location,
            title = %offer.title,
            "offer_queued"
        );
    }

    let file = OfferStore::new(config.offers_path()).save(offers).await?;
    info!(
        listings = results.listings.len(),
        total_offers = file.total_offers,
        "offers_complete"
    );

    Ok(())
}
