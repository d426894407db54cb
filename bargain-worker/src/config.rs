//! Configuration module for environment variable parsing.
//!
//! Every binary reads the same variables; unset or invalid values fall back
//! to defaults.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::dispatch::DEFAULT_MESSAGES_URL_TEMPLATE;
use crate::offer::{DEFAULT_REGIONS, DEFAULT_TEMPLATE};

/// How the dispatch binaries deliver messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendMode {
    /// POST to the marketplace messaging API.
    Api,
    /// Log each message and report success.
    DryRun,
}

impl FromStr for SendMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "api" => Ok(SendMode::Api),
            "dry-run" | "dry_run" | "dryrun" => Ok(SendMode::DryRun),
            other => Err(format!("unknown send mode: {}", other)),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding results.json, offers.json and .api-config.json
    pub data_dir: PathBuf,

    /// Raw listing batch read by the normalize binary
    pub raw_listings_path: PathBuf,

    /// Search label recorded alongside normalized results
    pub search_query: String,

    /// Optional JSON reference price table; the built-in table is used otherwise
    pub price_table_path: Option<PathBuf>,

    /// Location tokens that make a listing eligible for an offer
    pub target_regions: Vec<String>,

    /// Offer message template
    pub offer_template: String,

    /// Pause between two sends in a dispatch run
    pub inter_send_delay_ms: u64,

    pub send_mode: SendMode,

    /// Messaging endpoint, `{user_id}` is substituted
    pub messages_url_template: String,

    /// Initial session user id, overridden by a saved .api-config.json
    pub marketplace_user_id: Option<String>,

    /// Initial session cookie, overridden by a saved .api-config.json
    pub marketplace_cookie: Option<String>,

    /// HTTP request timeout in milliseconds, per send
    pub request_timeout_ms: u64,

    /// Optional pool of user agents to rotate through
    pub user_agent_pool: Option<Vec<String>>,

    /// Port for the web server to listen on
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Config {
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),

            raw_listings_path: env::var("RAW_LISTINGS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("raw_listings.json")),

            search_query: env::var("SEARCH_QUERY").unwrap_or_else(|_| "DDR5 RAM".to_string()),

            price_table_path: env::var("PRICE_TABLE_PATH").ok().map(PathBuf::from),

            target_regions: parse_csv("TARGET_REGIONS")
                .filter(|regions| !regions.is_empty())
                .unwrap_or_else(|| DEFAULT_REGIONS.iter().map(|r| r.to_string()).collect()),

            offer_template: env::var("OFFER_TEMPLATE")
                .ok()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_TEMPLATE.to_string()),

            inter_send_delay_ms: parse_value("INTER_SEND_DELAY_MS", 3000),

            send_mode: parse_value("SEND_MODE", SendMode::Api),

            messages_url_template: env::var("MESSAGES_URL_TEMPLATE")
                .unwrap_or_else(|_| DEFAULT_MESSAGES_URL_TEMPLATE.to_string()),

            marketplace_user_id: env::var("MARKETPLACE_USER_ID").ok(),

            marketplace_cookie: env::var("MARKETPLACE_COOKIE").ok(),

            request_timeout_ms: parse_value("REQUEST_TIMEOUT_MS", 15000),

            user_agent_pool: parse_csv("USER_AGENT_POOL"),

            port: parse_value("PORT", 3000),
        }
    }

    pub fn results_path(&self) -> PathBuf {
        self.data_dir.join("results.json")
    }

    pub fn offers_path(&self) -> PathBuf {
        self.data_dir.join("offers.json")
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.data_dir.join(".api-config.json")
    }

    pub fn inter_send_delay(&self) -> Duration {
        Duration::from_millis(self.inter_send_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Parse a typed value, warning and using the default when it doesn't parse.
fn parse_value<T: FromStr>(name: &str, default: T) -> T {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().parse::<T>() {
        Ok(value) => value,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid value, using default");
            default
        }
    }
}

/// Parse a comma-separated list of strings.
fn parse_csv(name: &str) -> Option<Vec<String>> {
    env::var(name).ok().map(|raw| {
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}
