//! Listing records: raw input, extracted specs, and the enriched output.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

/// Coarse speed bucket used to key the reference price table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedTier {
    #[default]
    Base,
    Mid,
    High,
}

impl SpeedTier {
    /// Bucket a speed rating: `>= 6000` high, `>= 5400` mid, else base.
    pub fn from_rating(rating: u32) -> Self {
        if rating >= 6000 {
            SpeedTier::High
        } else if rating >= 5400 {
            SpeedTier::Mid
        } else {
            SpeedTier::Base
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SpeedTier::Base => "base",
            SpeedTier::Mid => "mid",
            SpeedTier::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormFactor {
    #[default]
    Desktop,
    Laptop,
}

/// Attributes derived from a listing title.
///
/// `speed_tier` is only ever set from `speed_rating`; an unknown rating
/// leaves it at `Base`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Specs {
    #[serde(rename = "capacityGB")]
    pub capacity_gb: Option<u32>,
    #[serde(rename = "speedRating")]
    pub speed_rating: Option<u32>,
    #[serde(rename = "speedTier", default)]
    pub speed_tier: SpeedTier,
    #[serde(rename = "stickCount")]
    pub stick_count: Option<u32>,
    #[serde(rename = "formFactor", default)]
    pub form_factor: FormFactor,
}

/// A listing as handed over by the fetch/scrape collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawListing {
    pub title: String,
    #[serde(default, deserialize_with = "deserialize_price")]
    pub price: Option<f64>,
    pub url: String,
    #[serde(default)]
    pub location: Option<String>,
    /// Seller accepts shipped transactions, overriding the region requirement.
    #[serde(default)]
    pub toridiili: bool,
}

impl RawListing {
    pub fn new(title: impl Into<String>, price: Option<f64>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            price,
            url: url.into(),
            location: None,
            toridiili: false,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_toridiili(mut self, toridiili: bool) -> Self {
        self.toridiili = toridiili;
        self
    }
}

/// A raw listing plus its specs and score. Built once during normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedListing {
    #[serde(flatten)]
    pub raw: RawListing,
    pub specs: Specs,
    pub bargain_score: u8,
    #[serde(rename = "pricePerGB")]
    pub price_per_unit: Option<f64>,
}

impl EnrichedListing {
    pub fn title(&self) -> &str {
        &self.raw.title
    }

    pub fn price(&self) -> Option<f64> {
        self.raw.price
    }

    pub fn url(&self) -> &str {
        &self.raw.url
    }

    pub fn location(&self) -> &str {
        self.raw.location.as_deref().unwrap_or("")
    }
}

static RE_LEADING_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?[0-9]+(?:\.[0-9]+)?").expect("valid price regex"));

/// Parse a loosely formatted price: "1 200", "89,90" and "250 €" all work.
///
/// Only the leading number counts; a trailing currency sign or unit is ignored.
pub fn parse_price(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .replacen(',', ".", 1);

    RE_LEADING_NUMBER
        .find(&cleaned)?
        .as_str()
        .parse::<f64>()
        .ok()
        .filter(|p| p.is_finite())
}

fn deserialize_price<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PriceField {
        Number(f64),
        Text(String),
    }

    let value = Option::<PriceField>::deserialize(deserializer)?;
    Ok(match value {
        Some(PriceField::Number(n)) if n.is_finite() => Some(n),
        Some(PriceField::Text(s)) => parse_price(&s),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speed_tier_from_rating() {
        assert_eq!(SpeedTier::from_rating(4800), SpeedTier::Base);
        assert_eq!(SpeedTier::from_rating(5399), SpeedTier::Base);
        assert_eq!(SpeedTier::from_rating(5400), SpeedTier::Mid);
        assert_eq!(SpeedTier::from_rating(5600), SpeedTier::Mid);
        assert_eq!(SpeedTier::from_rating(6000), SpeedTier::High);
        assert_eq!(SpeedTier::from_rating(8000), SpeedTier::High);
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("250"), Some(250.0));
        assert_eq!(parse_price("1 200"), Some(1200.0));
        assert_eq!(parse_price("89,90"), Some(89.9));
        assert_eq!(parse_price("250 €"), Some(250.0));
        assert_eq!(parse_price("250€"), Some(250.0));
        assert_eq!(parse_price("89,90 €"), Some(89.9));
        assert_eq!(parse_price("€250"), None);
        assert_eq!(parse_price("ilmainen"), None);
        assert_eq!(parse_price(""), None);
    }

    #[test]
    fn test_raw_listing_price_variants() {
        let json = r#"[
            {"title": "a", "price": 120, "url": "u1"},
            {"title": "b", "price": "1 100", "url": "u2"},
            {"title": "c", "price": null, "url": "u3"},
            {"title": "d", "url": "u4", "location": "Espoo", "toridiili": true},
            {"title": "e", "price": "250 €", "url": "u5"},
            {"title": "f", "price": "250€", "url": "u6"},
            {"title": "g", "price": "89,90 €", "url": "u7"}
        ]"#;

        let raws: Vec<RawListing> = serde_json::from_str(json).unwrap();
        assert_eq!(raws[0].price, Some(120.0));
        assert_eq!(raws[1].price, Some(1100.0));
        assert_eq!(raws[2].price, None);
        assert_eq!(raws[3].price, None);
        assert_eq!(raws[3].location.as_deref(), Some("Espoo"));
        assert!(raws[3].toridiili);
        assert!(!raws[0].toridiili);
        assert_eq!(raws[4].price, Some(250.0));
        assert_eq!(raws[5].price, Some(250.0));
        assert_eq!(raws[6].price, Some(89.9));
    }

    #[test]
    fn test_enriched_listing_serializes_flat() {
        let listing = EnrichedListing {
            raw: RawListing::new("32GB DDR5", Some(300.0), "https://example.com/item/1"),
            specs: Specs {
                capacity_gb: Some(32),
                ..Specs::default()
            },
            bargain_score: 68,
            price_per_unit: Some(9.4),
        };

        let value = serde_json::to_value(&listing).unwrap();
        assert_eq!(value["title"], "32GB DDR5");
        assert_eq!(value["bargainScore"], 68);
        assert_eq!(value["pricePerGB"], 9.4);
        assert_eq!(value["specs"]["capacityGB"], 32);
        assert_eq!(value["specs"]["speedTier"], "base");
        assert_eq!(value["specs"]["formFactor"], "desktop");

        let back: EnrichedListing = serde_json::from_value(value).unwrap();
        assert_eq!(back, listing);
    }
}
