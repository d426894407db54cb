//! Eligibility filtering, counter-offer pricing and message rendering.

use tracing::debug;

use super::types::{Offer, OfferStatus};
use crate::listing::EnrichedListing;

/// Default outbound message: asks whether `{price}` would work and offers pickup.
pub const DEFAULT_TEMPLATE: &str = "Moi! Kiinnostuin ilmoituksestasi. Olisiko {price}€ mahdollinen hinta? Voin noutaa pääkaupunkiseudulta. Kiitos!";

/// Default target region tokens (Helsinki metropolitan area).
pub const DEFAULT_REGIONS: &[&str] = &["helsinki", "espoo", "vantaa", "kauniainen"];

/// Decides which listings may receive an offer.
///
/// The hard exclusions (no positive price, zero score) are applied by
/// [`generate_offers`] regardless of the policy.
pub trait Eligibility {
    fn is_eligible(&self, listing: &EnrichedListing) -> bool;
}

impl<F> Eligibility for F
where
    F: Fn(&EnrichedListing) -> bool,
{
    fn is_eligible(&self, listing: &EnrichedListing) -> bool {
        self(listing)
    }
}

/// Region-or-shipping policy: the location contains one of the target tokens
/// (case-insensitive substring, no further normalization), or the listing
/// carries the shipping flag.
#[derive(Debug, Clone)]
pub struct RegionPolicy {
    regions: Vec<String>,
}

impl RegionPolicy {
    pub fn new<I, S>(regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            regions: regions
                .into_iter()
                .map(|r| r.as_ref().trim().to_lowercase())
                .filter(|r| !r.is_empty())
                .collect(),
        }
    }

    pub fn regions(&self) -> &[String] {
        &self.regions
    }

    pub fn in_region(&self, location: &str) -> bool {
        let location = location.to_lowercase();
        self.regions.iter().any(|r| location.contains(r.as_str()))
    }
}

impl Default for RegionPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_REGIONS)
    }
}

impl Eligibility for RegionPolicy {
    fn is_eligible(&self, listing: &EnrichedListing) -> bool {
        self.in_region(listing.location()) || listing.raw.toridiili
    }
}

/// Requested discount for a bargain score: strong deals get a token nudge,
/// weaker ones a larger ask.
pub fn discount_percent(bargain_score: u8) -> u8 {
    match bargain_score {
        80.. => 10,
        65..=79 => 20,
        _ => 30,
    }
}

/// Counter-offer price in two stages: round the discounted price to a whole
/// unit, then round that to the nearest multiple of 5.
///
/// The result can't be re-derived from the final price and discount alone,
/// so both stages stay explicit.
pub fn offer_price(asking_price: f64, discount_percent: u8) -> u64 {
    let discounted = asking_price * (1.0 - f64::from(discount_percent) / 100.0);
    let whole = discounted.max(0.0).round();
    let nearest_five = (whole / 5.0).round() * 5.0;
    nearest_five as u64
}

/// Substitute `{price}` / `{offer_price}` and `{title}` into a template.
/// Unknown placeholders are left as written.
pub fn render_message(template: &str, offer_price: u64, title: &str) -> String {
    let price = offer_price.to_string();
    template
        .replace("{offer_price}", &price)
        .replace("{price}", &price)
        .replace("{title}", title)
}

/// Offer id: the last path segment of the listing URL.
pub fn offer_id(listing_url: &str) -> String {
    let from_url = url::Url::parse(listing_url).ok().and_then(|u| {
        u.path_segments()
            .and_then(|mut segments| segments.next_back().map(str::to_string))
    });

    from_url.unwrap_or_else(|| {
        listing_url
            .rsplit('/')
            .next()
            .unwrap_or(listing_url)
            .to_string()
    })
}

/// Build the offer batch for a set of enriched listings.
///
/// Output is sorted best deal first (stable), every offer `pending` and selected.
pub fn generate_offers(
    listings: &[EnrichedListing],
    template: &str,
    eligibility: &impl Eligibility,
) -> Vec<Offer> {
    let mut eligible: Vec<&EnrichedListing> = listings
        .iter()
        .filter(|l| l.price().is_some_and(|p| p > 0.0))
        .filter(|l| l.bargain_score > 0)
        .filter(|l| eligibility.is_eligible(l))
        .collect();

    eligible.sort_by(|a, b| b.bargain_score.cmp(&a.bargain_score));

    let offers: Vec<Offer> = eligible
        .into_iter()
        .filter_map(|listing| build_offer(listing, template))
        .collect();

    debug!(
        listings = listings.len(),
        offers = offers.len(),
        "offers_generated"
    );

    offers
}

fn build_offer(listing: &EnrichedListing, template: &str) -> Option<Offer> {
    let asking_price = listing.price()?;
    let discount = discount_percent(listing.bargain_score);
    let price = offer_price(asking_price, discount);

    Some(Offer {
        id: offer_id(listing.url()),
        title: listing.title().to_string(),
        url: listing.url().to_string(),
        location: listing.location().to_string(),
        toridiili: listing.raw.toridiili,
        asking_price,
        offer_price: price,
        discount_percent: discount,
        bargain_score: listing.bargain_score,
        message: render_message(template, price, listing.title()),
        status: OfferStatus::Pending,
        selected: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::{normalize, PriceTable, RawListing};
    use proptest::prelude::*;

    fn listings() -> Vec<EnrichedListing> {
        let raws = vec![
            RawListing::new(
                "Kingston Fury Beast 32GB DDR5 6000Mhz CL36",
                Some(300.0),
                "https://www.tori.fi/recommerce/forsale/item/37230838",
            )
            .with_location("Espoo, Henttaa"),
            RawListing::new(
                "DDR5 Ram-muisti 32Gt 6000Mhz RGB",
                Some(250.0),
                "https://www.tori.fi/recommerce/forsale/item/36780539",
            )
            .with_location("Tampere"),
            RawListing::new(
                "DDR5 SODIMM RAM 16GB (2×8GB) 5600 MHz CL46 - SK hynix",
                Some(85.0),
                "https://www.tori.fi/recommerce/forsale/item/35826793",
            )
            .with_location("Oulu")
            .with_toridiili(true),
            RawListing::new(
                "Corsair Vengeance DDR5 32 GB RAM",
                Some(420.0),
                "https://www.tori.fi/recommerce/forsale/item/36865387",
            )
            .with_location("Vantaa, Koivukylä"),
            RawListing::new(
                "Samsung DDR5 16GB SO-DIMM",
                None,
                "https://www.tori.fi/recommerce/forsale/item/37132732",
            )
            .with_location("Helsinki, Kamppi"),
        ];
        normalize(&raws, &PriceTable::default())
    }

    #[test]
    fn test_discount_policy() {
        assert_eq!(discount_percent(95), 10);
        assert_eq!(discount_percent(80), 10);
        assert_eq!(discount_percent(79), 20);
        assert_eq!(discount_percent(65), 20);
        assert_eq!(discount_percent(64), 30);
        assert_eq!(discount_percent(0), 30);
    }

    #[test]
    fn test_offer_price_two_stage_rounding() {
        assert_eq!(offer_price(300.0, 20), 240);
        assert_eq!(offer_price(85.0, 10), 75);
        // 37 * 0.7 = 25.9 -> 26 -> 25
        assert_eq!(offer_price(37.0, 30), 25);
        // 111 * 0.9 = 99.9 -> 100 -> 100
        assert_eq!(offer_price(111.0, 10), 100);
        // 125 * 0.9 = 112.5 -> 113 -> 115
        assert_eq!(offer_price(125.0, 10), 115);
        assert_eq!(offer_price(0.0, 30), 0);
    }

    #[test]
    fn test_render_message() {
        assert_eq!(
            render_message("Olisiko {price}€ ok? ({title})", 240, "32GB DDR5"),
            "Olisiko 240€ ok? (32GB DDR5)"
        );
        assert_eq!(render_message("{offer_price}/{price}", 5, "x"), "5/5");
        assert_eq!(
            render_message("Hei {seller}, {price}€", 240, "x"),
            "Hei {seller}, 240€"
        );
    }

    #[test]
    fn test_offer_id_from_url() {
        assert_eq!(
            offer_id("https://www.tori.fi/recommerce/forsale/item/37230838"),
            "37230838"
        );
        assert_eq!(offer_id("item/42"), "42");
        assert_eq!(offer_id("plain"), "plain");
    }

    #[test]
    fn test_region_policy() {
        let policy = RegionPolicy::default();
        assert!(policy.in_region("Helsinki, Kallio"));
        assert!(policy.in_region("ESPOO"));
        assert!(!policy.in_region("Tampere"));
        assert!(!policy.in_region(""));
    }

    #[test]
    fn test_generate_offers_default_policy() {
        let offers = generate_offers(&listings(), DEFAULT_TEMPLATE, &RegionPolicy::default());
        let ids: Vec<&str> = offers.iter().map(|o| o.id.as_str()).collect();

        // Tampere without shipping and the price-less listing are excluded.
        assert_eq!(ids, vec!["35826793", "37230838", "36865387"]);
        assert!(offers.iter().all(|o| o.status == OfferStatus::Pending && o.selected));
        assert!(offers
            .windows(2)
            .all(|w| w[0].bargain_score >= w[1].bargain_score));

        let kingston = &offers[1];
        assert_eq!(kingston.discount_percent, 20);
        assert_eq!(kingston.offer_price, 240);
        assert!(kingston.message.contains("240€"));
    }

    #[test]
    fn test_generate_offers_custom_predicate() {
        let only_shipping = |l: &EnrichedListing| l.raw.toridiili;
        let offers = generate_offers(&listings(), "{price}", &only_shipping);
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].id, "35826793");
        assert_eq!(offers[0].message, offers[0].offer_price.to_string());
    }

    #[test]
    fn test_generate_offers_excludes_zero_score() {
        let mut batch = listings();
        for l in batch.iter_mut() {
            l.bargain_score = 0;
        }
        let offers = generate_offers(&batch, DEFAULT_TEMPLATE, &|_: &EnrichedListing| true);
        assert!(offers.is_empty());
    }

    proptest! {
        #[test]
        fn prop_offer_price_is_multiple_of_five(
            asking in 0.0f64..100_000.0,
            score in 0u8..=100,
        ) {
            let price = offer_price(asking, discount_percent(score));
            prop_assert_eq!(price % 5, 0);
        }
    }
}
