//! Flat JSON files shared by the binaries and the web server.
//!
//! | File               | Contents                                                     |
//! |--------------------|--------------------------------------------------------------|
//! | `results.json`     | `{ scannedAt, query, totalListings, bargainsFound, listings }` |
//! | `offers.json`      | `{ generatedAt, totalOffers, offers }`                       |
//! | `.api-config.json` | `{ userId, cookie }`                                         |

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::Config;
use crate::dispatch::Credentials;
use crate::listing::{BatchSummary, EnrichedListing, RawListing};
use crate::offer::Offer;

/// A normalized batch as written to `results.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsFile {
    pub scanned_at: DateTime<Utc>,
    pub query: String,
    pub total_listings: usize,
    pub bargains_found: usize,
    pub listings: Vec<EnrichedListing>,
}

impl ResultsFile {
    pub fn new(query: impl Into<String>, listings: Vec<EnrichedListing>) -> Self {
        let summary = BatchSummary::of(&listings);
        Self {
            scanned_at: Utc::now(),
            query: query.into(),
            total_listings: summary.total,
            bargains_found: summary.bargains,
            listings,
        }
    }
}

/// The offer queue as written to `offers.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OffersFile {
    pub generated_at: DateTime<Utc>,
    pub total_offers: usize,
    pub offers: Vec<Offer>,
}

impl OffersFile {
    pub fn new(offers: Vec<Offer>) -> Self {
        Self {
            generated_at: Utc::now(),
            total_offers: offers.len(),
            offers,
        }
    }
}

/// Input batch: either a bare array or `{ "listings": [...] }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawBatch {
    List(Vec<RawListing>),
    Wrapped { listings: Vec<RawListing> },
}

/// Read a raw listing batch.
pub async fn load_raw_listings(path: impl AsRef<Path>) -> Result<Vec<RawListing>> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read raw listings {}", path.display()))?;
    let batch: RawBatch = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse raw listings {}", path.display()))?;

    Ok(match batch {
        RawBatch::List(listings) | RawBatch::Wrapped { listings } => listings,
    })
}

/// Replace offers in `existing` by id with their finalized copies.
/// Finalized offers the queue doesn't know about are appended.
pub fn merge_offers(existing: &mut Vec<Offer>, finalized: &[Offer]) {
    for offer in finalized {
        match existing.iter_mut().find(|o| o.id == offer.id) {
            Some(slot) => *slot = offer.clone(),
            None => existing.push(offer.clone()),
        }
    }
}

/// One JSON document on disk.
#[derive(Debug, Clone)]
struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `Ok(None)` when the file doesn't exist yet.
    async fn read<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", self.path.display()))
            }
        };

        let value = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;
        Ok(Some(value))
    }

    /// Write through a temporary file so readers never see a partial document.
    async fn write<T: Serialize>(&self, value: &T) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(value).context("Failed to serialize document")?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        debug!(path = %self.path.display(), "json_file_written");
        Ok(())
    }
}

/// `results.json`.
#[derive(Debug, Clone)]
pub struct ListingStore {
    file: JsonFile,
}

impl ListingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: JsonFile::new(path),
        }
    }

    pub fn path(&self) -> &Path {
        &self.file.path
    }

    pub async fn load(&self) -> Result<Option<ResultsFile>> {
        self.file.read().await
    }

    pub async fn save(
        &self,
        query: &str,
        listings: Vec<EnrichedListing>,
    ) -> Result<ResultsFile> {
        let results = ResultsFile::new(query, listings);
        self.file.write(&results).await?;
        info!(
            path = %self.file.path.display(),
            total_listings = results.total_listings,
            bargains_found = results.bargains_found,
            "results_saved"
        );
        Ok(results)
    }
}

/// `offers.json`.
///
/// Clones share one write lock, so a queue save and the merge at the end of a
/// dispatch run never interleave their read and write.
#[derive(Debug, Clone)]
pub struct OfferStore {
    file: JsonFile,
    write_lock: Arc<Mutex<()>>,
}

impl OfferStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: JsonFile::new(path),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.file.path
    }

    pub async fn load(&self) -> Result<Option<OffersFile>> {
        self.file.read().await
    }

    /// Current queue, empty when nothing was generated yet.
    pub async fn load_offers(&self) -> Result<Vec<Offer>> {
        Ok(self.load().await?.map(|f| f.offers).unwrap_or_default())
    }

    pub async fn save(&self, offers: Vec<Offer>) -> Result<OffersFile> {
        let _guard = self.write_lock.lock().await;
        let file = OffersFile::new(offers);
        self.file.write(&file).await?;
        info!(
            path = %self.file.path.display(),
            total_offers = file.total_offers,
            "offers_saved"
        );
        Ok(file)
    }

    /// Fold the result of a dispatch run back into the saved queue.
    pub async fn merge(&self, finalized: &[Offer]) -> Result<OffersFile> {
        let _guard = self.write_lock.lock().await;
        let mut file = self
            .load()
            .await?
            .unwrap_or_else(|| OffersFile::new(Vec::new()));

        merge_offers(&mut file.offers, finalized);
        file.total_offers = file.offers.len();

        self.file.write(&file).await?;
        info!(
            path = %self.file.path.display(),
            merged = finalized.len(),
            total_offers = file.total_offers,
            "offers_merged"
        );
        Ok(file)
    }
}

/// `.api-config.json` as read back; absent fields fall through to the environment.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SavedCredentials {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    cookie: Option<String>,
}

/// `.api-config.json`.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    file: JsonFile,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: JsonFile::new(path),
        }
    }

    /// Credentials from the environment, overridden by whatever was saved.
    ///
    /// A saved field wins even when empty, so a cookie cleared through the
    /// dashboard stays cleared across restarts.
    pub async fn load(&self, config: &Config) -> Result<Credentials> {
        let mut credentials = Credentials {
            user_id: config.marketplace_user_id.clone().unwrap_or_default(),
            cookie: config.marketplace_cookie.clone().unwrap_or_default(),
        };

        if let Some(saved) = self.file.read::<SavedCredentials>().await? {
            if let Some(user_id) = saved.user_id {
                credentials.user_id = user_id;
            }
            if let Some(cookie) = saved.cookie {
                credentials.cookie = cookie;
            }
        }

        Ok(credentials)
    }

    pub async fn save(&self, credentials: &Credentials) -> Result<()> {
        self.file.write(credentials).await?;
        info!(
            user_id = %credentials.user_id,
            has_cookie = credentials.has_cookie(),
            "credentials_saved"
        );
        Ok(())
    }
}

/// All three stores rooted at the configured data directory.
#[derive(Debug, Clone)]
pub struct Stores {
    pub listings: ListingStore,
    pub offers: OfferStore,
    pub credentials: CredentialStore,
}

impl Stores {
    pub fn from_config(config: &Config) -> Self {
        Self {
            listings: ListingStore::new(config.results_path()),
            offers: OfferStore::new(config.offers_path()),
            credentials: CredentialStore::new(config.credentials_path()),
        }
    }
}
