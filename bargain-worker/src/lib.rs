//! Bargain - marketplace listing scorer and rate-limited offer dispatcher.
//!
//! This library provides shared modules for the four binaries:
//! - `bargain-normalize`: Scores a raw listing batch into `results.json`
//! - `bargain-offers`: Turns eligible bargains into an offer queue in `offers.json`
//! - `bargain-dispatch`: Sends the pending queue, one message at a time
//! - `bargain-web`: Dashboard API with a streaming send endpoint
//!
//! ## Architecture
//!
//! ```text
//! RawListing → listing::normalize → EnrichedListing → offer::generate_offers → Offer
//!                                                                              ↓
//!                                   DispatchEvent stream ← dispatch::dispatch ←┘
//! ```

pub mod config;
pub mod dispatch;
pub mod listing;
pub mod offer;
pub mod store;
pub mod util;
pub mod web;

// Re-export commonly used types
pub use config::{Config, SendMode};
pub use dispatch::{
    dispatch, run_dispatch, sender_for, ApiSender, Credentials, DispatchEvent, DispatchOutcome,
    DryRunSender, OfferSender, SendError,
};
pub use listing::{normalize, prepare_batch, EnrichedListing, PriceTable, RawListing, Specs};
pub use offer::{generate_offers, Offer, OfferStatus, RegionPolicy};
pub use store::{OfferStore, Stores};
pub use web::AppState;

use anyhow::Result;
use tracing::info;

/// Reference prices from `PRICE_TABLE_PATH`, or the built-in table.
pub fn load_price_table(config: &Config) -> Result<PriceTable> {
    match &config.price_table_path {
        Some(path) => PriceTable::load(path),
        None => {
            info!("price_table_default");
            Ok(PriceTable::default())
        }
    }
}

/// Structured JSON logging, filtered by `RUST_LOG` (default `info`).
pub fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();
}
