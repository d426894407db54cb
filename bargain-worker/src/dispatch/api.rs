//! Sender that talks to the marketplace messaging API directly.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use super::sender::{OfferSender, SendError};
use crate::config::Config;
use crate::util::user_agent::{build_headers, pick_user_agent, MARKETPLACE_ORIGIN};

/// Conversations endpoint; `{user_id}` is the logged-in account.
pub const DEFAULT_MESSAGES_URL_TEMPLATE: &str =
    "https://www.tori.fi/messages/api/conversations/users/{user_id}/conversations";

/// Session the messaging API authenticates with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub cookie: String,
}

impl Credentials {
    pub fn has_cookie(&self) -> bool {
        !self.cookie.trim().is_empty()
    }

    /// First 60 characters of the cookie, for display.
    pub fn cookie_preview(&self) -> String {
        if !self.has_cookie() {
            return String::new();
        }
        let head: String = self.cookie.chars().take(60).collect();
        format!("{}...", head)
    }
}

/// Posts each offer as the first message of a new conversation.
#[derive(Debug, Clone)]
pub struct ApiSender {
    client: Client,
    url_template: String,
    credentials: Credentials,
    timeout: Duration,
    user_agent_pool: Option<Vec<String>>,
}

impl ApiSender {
    pub fn new(client: Client, url_template: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            client,
            url_template: url_template.into(),
            credentials,
            timeout: Duration::from_millis(15000),
            user_agent_pool: None,
        }
    }

    pub fn from_config(config: &Config, credentials: Credentials) -> Result<Self> {
        let client = Client::builder()
            .gzip(true)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self::new(client, config.messages_url_template.clone(), credentials)
            .with_timeout(config.request_timeout())
            .with_user_agents(config.user_agent_pool.clone()))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agents(mut self, pool: Option<Vec<String>>) -> Self {
        self.user_agent_pool = pool;
        self
    }

    pub fn messages_url(&self) -> String {
        self.url_template
            .replace("{user_id}", &self.credentials.user_id)
    }
}

fn message_payload(offer_id: &str, body: &str) -> Value {
    json!({
        "item": {
            "id": offer_id,
            "type": "recommerce",
        },
        "message": {
            "clientMessageId": Uuid::new_v4().to_string(),
            "body": body,
            "messageType": "textMessage",
            "attachments": [],
        },
    })
}

/// Failure detail from a rejected response: the `error` field of a JSON body,
/// or the bare status.
fn rejection_detail(status: u16, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| format!("HTTP {}", status))
}

#[async_trait]
impl OfferSender for ApiSender {
    fn ready(&self) -> Result<(), SendError> {
        if !self.credentials.has_cookie() {
            return Err(SendError::Unavailable(
                "no session cookie configured".to_string(),
            ));
        }
        if self.credentials.user_id.trim().is_empty() {
            return Err(SendError::Unavailable("no user id configured".to_string()));
        }
        Ok(())
    }

    async fn send(&self, offer_id: &str, message: &str) -> Result<(), SendError> {
        self.ready()?;

        let url = self.messages_url();
        let user_agent = pick_user_agent(self.user_agent_pool.as_deref());

        let mut request = self.client.post(&url).timeout(self.timeout);

        for (key, value) in build_headers(&user_agent) {
            request = request.header(key, value);
        }
        request = request
            .header("cookie", self.credentials.cookie.as_str())
            .header(
                "referer",
                format!("{}/messages/new/{}", MARKETPLACE_ORIGIN, offer_id),
            )
            .json(&message_payload(offer_id, message));

        debug!(offer_id = %offer_id, url = %url, "api_send_starting");

        let resp = request.send().await?;
        let status = resp.status().as_u16();

        if resp.status().is_success() {
            info!(offer_id = %offer_id, status_code = status, "api_send_accepted");
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        Err(SendError::Rejected {
            status,
            detail: rejection_detail(status, &body),
        })
    }
}
