//! Bargain scoring against a reference price table.
//!
//! Every caller (batch normalize, web re-scoring) goes through [`PriceTable::score`]
//! so the bands and reference data live in exactly one place.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::types::{FormFactor, Specs, SpeedTier};

/// Laptop modules trade at a discount to desktop modules of equal spec.
pub const LAPTOP_FACTOR: f64 = 0.85;

/// Score returned when no reference price can be computed.
pub const NEUTRAL_SCORE: u8 = 50;

/// Per-gigabyte fallback when a capacity/tier pair has no table entry.
pub const DEFAULT_FALLBACK_PER_UNIT: f64 = 11.0;

/// Ratio bands, checked in order: the first `ratio <= bound` wins.
const SCORE_BANDS: &[(f64, u8)] = &[
    (0.40, 95),
    (0.50, 90),
    (0.60, 85),
    (0.70, 78),
    (0.80, 68),
    (0.90, 55),
    (1.00, 45),
    (1.10, 35),
    (1.25, 25),
];

const OVERPRICED_SCORE: u8 = 10;

/// Default fair used-market prices in EUR, keyed `(capacity, base, mid, high)`.
const DEFAULT_PRICES: &[(u32, f64, f64, f64)] = &[
    (8, 60.0, 75.0, 90.0),
    (16, 160.0, 200.0, 240.0),
    (32, 300.0, 350.0, 420.0),
    (48, 420.0, 500.0, 600.0),
    (64, 550.0, 650.0, 750.0),
    (96, 800.0, 950.0, 1100.0),
    (128, 1100.0, 1300.0, 1500.0),
];

/// Reference prices keyed by `"{capacityGB}-{speedTier}"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceTable {
    pub prices: HashMap<String, f64>,
    #[serde(default = "default_fallback")]
    pub fallback_per_unit: f64,
}

fn default_fallback() -> f64 {
    DEFAULT_FALLBACK_PER_UNIT
}

impl Default for PriceTable {
    fn default() -> Self {
        let mut prices = HashMap::new();
        for &(capacity, base, mid, high) in DEFAULT_PRICES {
            prices.insert(price_key(capacity, SpeedTier::Base), base);
            prices.insert(price_key(capacity, SpeedTier::Mid), mid);
            prices.insert(price_key(capacity, SpeedTier::High), high);
        }

        Self {
            prices,
            fallback_per_unit: DEFAULT_FALLBACK_PER_UNIT,
        }
    }
}

/// Build the table key for a capacity and tier, e.g. `"32-high"`.
pub fn price_key(capacity_gb: u32, tier: SpeedTier) -> String {
    format!("{}-{}", capacity_gb, tier.as_str())
}

impl PriceTable {
    /// Load a table from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read price table {}", path.display()))?;
        let table: PriceTable =
            serde_json::from_str(&raw).context("Failed to parse price table")?;

        tracing::info!(
            path = %path.display(),
            entries = table.prices.len(),
            fallback_per_unit = table.fallback_per_unit,
            "price_table_loaded"
        );

        Ok(table)
    }

    /// Reference price for the given specs, or `None` when capacity is unknown.
    pub fn reference_price(&self, specs: &Specs) -> Option<f64> {
        let capacity = specs.capacity_gb.filter(|gb| *gb > 0)?;

        let mut reference = self
            .prices
            .get(&price_key(capacity, specs.speed_tier))
            .copied()
            .unwrap_or_else(|| capacity as f64 * self.fallback_per_unit);

        if specs.form_factor == FormFactor::Laptop {
            reference *= LAPTOP_FACTOR;
        }

        Some(reference).filter(|r| *r > 0.0)
    }

    /// Map a price and specs to a 0-100 bargain score.
    ///
    /// Absent or non-positive prices score 0; unknown capacity scores
    /// [`NEUTRAL_SCORE`]; otherwise the price/reference ratio is banded.
    pub fn score(&self, price: Option<f64>, specs: &Specs) -> u8 {
        let price = match price {
            Some(p) if p > 0.0 => p,
            _ => return 0,
        };

        match self.reference_price(specs) {
            Some(reference) => score_ratio(price / reference),
            None => NEUTRAL_SCORE,
        }
    }
}

/// Band a price/reference ratio. Lower ratio means a higher score.
pub fn score_ratio(ratio: f64) -> u8 {
    SCORE_BANDS
        .iter()
        .find(|(bound, _)| ratio <= *bound)
        .map(|(_, score)| *score)
        .unwrap_or(OVERPRICED_SCORE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::extract::extract;
    use proptest::prelude::*;

    fn specs(capacity: Option<u32>, tier: SpeedTier, form: FormFactor) -> Specs {
        Specs {
            capacity_gb: capacity,
            speed_tier: tier,
            form_factor: form,
            ..Specs::default()
        }
    }

    #[test]
    fn test_default_table_lookup() {
        let table = PriceTable::default();
        let s = specs(Some(32), SpeedTier::High, FormFactor::Desktop);
        assert_eq!(table.reference_price(&s), Some(420.0));
        assert_eq!(table.prices.len(), 21);
    }

    #[test]
    fn test_fallback_per_unit() {
        let table = PriceTable::default();
        let s = specs(Some(24), SpeedTier::Mid, FormFactor::Desktop);
        assert_eq!(table.reference_price(&s), Some(24.0 * 11.0));
    }

    #[test]
    fn test_laptop_discount() {
        let table = PriceTable::default();
        let s = specs(Some(16), SpeedTier::Base, FormFactor::Laptop);
        let reference = table.reference_price(&s).unwrap();
        assert!((reference - 136.0).abs() < 1e-9);
    }

    #[test]
    fn test_score_absent_or_zero_price() {
        let table = PriceTable::default();
        let s = specs(Some(32), SpeedTier::High, FormFactor::Desktop);
        assert_eq!(table.score(None, &s), 0);
        assert_eq!(table.score(Some(0.0), &s), 0);
        assert_eq!(table.score(Some(-5.0), &s), 0);
    }

    #[test]
    fn test_score_unknown_capacity_is_neutral() {
        let table = PriceTable::default();
        let s = specs(None, SpeedTier::High, FormFactor::Desktop);
        assert_eq!(table.score(Some(1.0), &s), NEUTRAL_SCORE);
        assert_eq!(table.score(Some(99_999.0), &s), NEUTRAL_SCORE);
    }

    #[test]
    fn test_score_end_to_end_scenarios() {
        let table = PriceTable::default();
        let s = extract("Kingston Fury Beast 32GB DDR5 6000MHz CL36");

        // 300 / 420 = 0.714 lands in the <= 0.80 band.
        assert_eq!(table.score(Some(300.0), &s), 68);
        assert_eq!(table.score(Some(420.0), &s), 45);
        assert_eq!(table.score(Some(550.0), &s), 10);
        assert_eq!(table.score(Some(294.0), &s), 78);
    }

    #[test]
    fn test_score_ratio_band_edges() {
        assert_eq!(score_ratio(0.0), 95);
        assert_eq!(score_ratio(0.40), 95);
        assert_eq!(score_ratio(0.41), 90);
        assert_eq!(score_ratio(0.60), 85);
        assert_eq!(score_ratio(0.90), 55);
        assert_eq!(score_ratio(1.00), 45);
        assert_eq!(score_ratio(1.25), 25);
        assert_eq!(score_ratio(1.26), 10);
    }

    #[test]
    fn test_custom_table_from_json() {
        let json = r#"{"prices": {"32-high": 500}, "fallbackPerUnit": 5}"#;
        let table: PriceTable = serde_json::from_str(json).unwrap();
        let s = specs(Some(32), SpeedTier::High, FormFactor::Desktop);
        assert_eq!(table.reference_price(&s), Some(500.0));

        let s = specs(Some(16), SpeedTier::High, FormFactor::Desktop);
        assert_eq!(table.reference_price(&s), Some(80.0));

        let table: PriceTable = serde_json::from_str(r#"{"prices": {}}"#).unwrap();
        assert_eq!(table.fallback_per_unit, DEFAULT_FALLBACK_PER_UNIT);
    }

    proptest! {
        #[test]
        fn prop_score_non_increasing_in_price(
            capacity in prop_oneof![Just(8u32), Just(16), Just(24), Just(32), Just(64), Just(96)],
            laptop in any::<bool>(),
            a in 1.0f64..5000.0,
            b in 1.0f64..5000.0,
        ) {
            let table = PriceTable::default();
            let form = if laptop { FormFactor::Laptop } else { FormFactor::Desktop };
            let s = specs(Some(capacity), SpeedTier::Mid, form);
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(table.score(Some(low), &s) >= table.score(Some(high), &s));
        }

        #[test]
        fn prop_score_bounded(price in proptest::option::of(-100.0f64..10_000.0)) {
            let table = PriceTable::default();
            let s = specs(Some(32), SpeedTier::Base, FormFactor::Desktop);
            prop_assert!(table.score(price, &s) <= 100);
        }
    }
}
