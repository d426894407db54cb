//! Batch normalization: extract, score, sort.

use serde::Serialize;
use tracing::debug;

use super::extract::extract;
use super::score::PriceTable;
use super::types::{EnrichedListing, RawListing};

/// Score at or above which a listing counts as a bargain in summaries.
pub const BARGAIN_THRESHOLD: u8 = 65;

/// Enrich a batch of raw listings and sort it best deal first.
///
/// Nothing is dropped. The sort is stable, so equal scores keep input order.
pub fn normalize(raws: &[RawListing], table: &PriceTable) -> Vec<EnrichedListing> {
    let mut enriched: Vec<EnrichedListing> = raws.iter().map(|raw| enrich(raw, table)).collect();

    enriched.sort_by(|a, b| b.bargain_score.cmp(&a.bargain_score));

    debug!(listings = enriched.len(), "normalize_batch_complete");
    enriched
}

/// Enrich a single listing.
pub fn enrich(raw: &RawListing, table: &PriceTable) -> EnrichedListing {
    let specs = extract(&raw.title);
    let bargain_score = table.score(raw.price, &specs);
    let price_per_unit = match (raw.price, specs.capacity_gb) {
        (Some(price), Some(capacity)) if price > 0.0 && capacity > 0 => {
            Some(round_one_decimal(price / capacity as f64))
        }
        _ => None,
    };

    EnrichedListing {
        raw: raw.clone(),
        specs,
        bargain_score,
        price_per_unit,
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Human-facing grade for a bargain score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DealGrade {
    Great,
    Good,
    Fair,
    None,
}

impl DealGrade {
    pub fn from_score(score: u8) -> Self {
        match score {
            80.. => DealGrade::Great,
            65..=79 => DealGrade::Good,
            45..=64 => DealGrade::Fair,
            _ => DealGrade::None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DealGrade::Great => "Great Deal",
            DealGrade::Good => "Good Price",
            DealGrade::Fair => "Fair",
            DealGrade::None => "",
        }
    }
}

/// Aggregate figures over an enriched batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub total: usize,
    pub bargains: usize,
    pub average_price_per_unit: Option<f64>,
}

impl BatchSummary {
    pub fn of(listings: &[EnrichedListing]) -> Self {
        let bargains = listings
            .iter()
            .filter(|l| l.bargain_score >= BARGAIN_THRESHOLD)
            .count();

        let per_unit: Vec<f64> = listings
            .iter()
            .filter_map(|l| match (l.price(), l.specs.capacity_gb) {
                (Some(price), Some(capacity)) if price > 0.0 && capacity > 0 => {
                    Some(price / capacity as f64)
                }
                _ => None,
            })
            .collect();

        let average_price_per_unit = if per_unit.is_empty() {
            None
        } else {
            Some(round_one_decimal(
                per_unit.iter().sum::<f64>() / per_unit.len() as f64,
            ))
        };

        Self {
            total: listings.len(),
            bargains,
            average_price_per_unit,
        }
    }
}
