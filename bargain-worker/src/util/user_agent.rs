//! User agent rotation and browser-like headers for the messaging API.

use rand::prelude::*;

/// Default user agents if none are configured.
const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:123.0) Gecko/20100101 Firefox/123.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.3 Safari/605.1.15",
];

/// Origin the marketplace web client sends with its API calls.
pub const MARKETPLACE_ORIGIN: &str = "https://www.tori.fi";

/// Pick a random user agent from the configured pool or defaults.
pub fn pick_user_agent(pool: Option<&[String]>) -> String {
    let mut rng = thread_rng();

    match pool {
        Some(agents) if !agents.is_empty() => agents
            .choose(&mut rng)
            .cloned()
            .unwrap_or_else(|| DEFAULT_USER_AGENTS[0].to_string()),
        _ => DEFAULT_USER_AGENTS
            .choose(&mut rng)
            .copied()
            .unwrap_or(DEFAULT_USER_AGENTS[0])
            .to_string(),
    }
}

/// Headers the browser client sends on JSON API requests.
pub fn build_headers(user_agent: &str) -> Vec<(String, String)> {
    vec![
        ("user-agent".to_string(), user_agent.to_string()),
        ("accept".to_string(), "*/*".to_string()),
        (
            "accept-language".to_string(),
            "en-GB,en-US;q=0.9,en;q=0.8".to_string(),
        ),
        ("content-type".to_string(), "application/json".to_string()),
        ("origin".to_string(), MARKETPLACE_ORIGIN.to_string()),
    ]
}
