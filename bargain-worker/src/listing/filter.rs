//! Batch preparation ahead of normalization.
//!
//! Search results for memory modules also return complete computers, adapters
//! and "wanted to buy" ads. Those are dropped here, before the normalizer,
//! which itself keeps every listing it is given.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::types::RawListing;

static RE_COMPLETE_PC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"pelitietokone|pelikone|keskusyksikkö|custom kone|rtx \d{4}|gtx \d{4}|i[579]-\d{4,5}|ryzen \d|core ultra",
    )
    .expect("valid complete pc regex")
});

static RE_ADAPTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"adapteri").expect("valid adapter regex"));

static RE_WANTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^o:|ostetaan").expect("valid wanted regex"));

static RE_LAPTOP_BRAND_GPU: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"lenovo|acer (predator|nitro|aspire|swift).*rtx|asus.*rtx|hp.*rtx|dell.*rtx")
        .expect("valid laptop brand regex")
});

static RE_STORAGE_OR_GPU: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"ssd|rtx|gtx").expect("valid storage regex"));

static RE_LAPTOP_MODEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"lenovo loq|lenovo legion").expect("valid laptop model regex"));

/// True when a title looks like a standalone memory module listing.
pub fn is_component_listing(title: &str) -> bool {
    let t = title.to_lowercase();

    if RE_COMPLETE_PC.is_match(&t) || RE_ADAPTER.is_match(&t) || RE_WANTED.is_match(&t) {
        return false;
    }

    if RE_LAPTOP_BRAND_GPU.is_match(&t) && RE_STORAGE_OR_GPU.is_match(&t) {
        return false;
    }

    !RE_LAPTOP_MODEL.is_match(&t)
}

/// Keep the first listing for each URL, preserving order.
pub fn dedupe_by_url(raws: Vec<RawListing>) -> Vec<RawListing> {
    let mut seen = HashSet::new();
    raws.into_iter()
        .filter(|raw| seen.insert(raw.url.clone()))
        .collect()
}

/// Dedupe, then drop listings that are not memory modules.
pub fn prepare_batch(raws: Vec<RawListing>) -> Vec<RawListing> {
    let received = raws.len();
    let unique = dedupe_by_url(raws);
    let unique_count = unique.len();

    let kept: Vec<RawListing> = unique
        .into_iter()
        .filter(|raw| {
            let keep = is_component_listing(&raw.title);
            if !keep {
                debug!(title = %raw.title, url = %raw.url, "listing_prefiltered");
            }
            keep
        })
        .collect();

    debug!(
        received = received,
        unique = unique_count,
        kept = kept.len(),
        "batch_prepared"
    );

    kept
}
