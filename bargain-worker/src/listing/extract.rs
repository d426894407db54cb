//! Spec extraction from free-text listing titles.
//!
//! Total over any input: anything that can't be recognised stays unknown.

use std::sync::LazyLock;

use regex::Regex;

use super::types::{FormFactor, Specs, SpeedTier};

/// Plausible memory speed range; other four-digit runs are prices, years or part numbers.
pub const SPEED_RANGE: std::ops::RangeInclusive<u32> = 4000..=9000;

static RE_LAPTOP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"so-?dimm|läppäri|laptop|notebook|kannettava").expect("valid laptop regex")
});

// `gt` is the Finnish abbreviation (gigatavu).
static RE_KIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9])\s*[x×]\s*([0-9]{1,3})\s*(?:gb|gt)").expect("valid kit regex")
});

static RE_CAPACITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9]{1,3})\s*(?:gb|gt)\b").expect("valid capacity regex")
});

static RE_SPEED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]{4}").expect("valid speed regex"));

/// Parse a listing title into [`Specs`].
pub fn extract(title: &str) -> Specs {
    let t = title.to_lowercase();
    let mut specs = Specs::default();

    if RE_LAPTOP.is_match(&t) {
        specs.form_factor = FormFactor::Laptop;
    }

    if let Some(caps) = RE_KIT.captures(&t) {
        let sticks: u32 = caps[1].parse().unwrap_or(0);
        let per_stick: u32 = caps[2].parse().unwrap_or(0);
        specs.stick_count = Some(sticks);
        specs.capacity_gb = Some(sticks * per_stick).filter(|gb| *gb > 0);
    }

    if specs.capacity_gb.is_none() {
        specs.capacity_gb = RE_CAPACITY
            .captures(&t)
            .and_then(|caps| caps[1].parse::<u32>().ok())
            .filter(|gb| *gb > 0);
    }

    // Only the first four-digit run counts; an implausible one means no speed.
    if let Some(m) = RE_SPEED.find(&t) {
        if let Ok(rating) = m.as_str().parse::<u32>() {
            if SPEED_RANGE.contains(&rating) {
                specs.speed_rating = Some(rating);
                specs.speed_tier = SpeedTier::from_rating(rating);
            }
        }
    }

    specs
}
