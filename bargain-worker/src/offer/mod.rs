//! Offer generation for eligible listings.
//!
//! ```text
//! EnrichedListing → Eligibility → discount_percent() / offer_price() → render_message() → Offer
//! ```

pub mod generate;
pub mod types;

pub use generate::{
    discount_percent, generate_offers, offer_id, offer_price, render_message, Eligibility,
    RegionPolicy, DEFAULT_REGIONS, DEFAULT_TEMPLATE,
};
pub use types::{Offer, OfferStatus, TransitionError};
