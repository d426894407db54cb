//! Listing ingestion: spec extraction, bargain scoring and batch normalization.
//!
//! ## Flow
//!
//! ```text
//! RawListing → prepare_batch() → extract() + PriceTable::score() → normalize() → EnrichedListing
//! ```

pub mod extract;
pub mod filter;
pub mod normalize;
pub mod score;
pub mod types;

pub use extract::extract;
pub use filter::{dedupe_by_url, is_component_listing, prepare_batch};
pub use normalize::{enrich, normalize, BatchSummary, DealGrade, BARGAIN_THRESHOLD};
pub use score::{price_key, score_ratio, PriceTable};
pub use types::{parse_price, EnrichedListing, FormFactor, RawListing, Specs, SpeedTier};
