//! Bargain Dispatch - sends the pending offer queue.
//!
//! Reads `offers.json`, sends every pending, selected offer one at a time
//! with the configured pause between sends, logs each dispatch event and
//! writes the final statuses back.

use anyhow::{bail, Context, Result};
use futures::StreamExt;
use tracing::{info, warn};

use bargain::store::{CredentialStore, OfferStore};
use bargain::{dispatch, init_tracing, sender_for, Config, DispatchEvent};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!("dispatch_starting");

    // Load configuration from environment
    let config = Config::from_env();
    info!(
        data_dir = %config.data_dir.display(),
        send_mode = ?config.send_mode,
        inter_send_delay_ms = config.inter_send_delay_ms,
        request_timeout_ms = config.request_timeout_ms,
        "config_loaded"
    );

    let offer_store = OfferStore::new(config.offers_path());
    let offers = offer_store
        .load()
        .await?
        .map(|file| file.offers)
        .with_context(|| format!("No offer queue at {}", config.offers_path().display()))?;

    let pending = offers.iter().filter(|o| o.is_dispatchable()).count();
    info!(total = offers.len(), pending = pending, "offer_queue_loaded");

    let credentials = CredentialStore::new(config.credentials_path())
        .load(&config)
        .await?;
    let sender = sender_for(&config, credentials)?;

    let mut handle = dispatch(offers, sender, config.inter_send_delay());

    while let Some(event) = handle.events.next().await {
        match &event {
            DispatchEvent::Progress {
                id, status, error, ..
            } => info!(offer_id = %id, status = status.as_str(), error = ?error, "dispatch_event_progress"),
            DispatchEvent::Error { message } => warn!(error = %message, "dispatch_event_error"),
            other => {
                let json = serde_json::to_string(other)?;
                info!(event = %json, kind = other.kind(), "dispatch_event");
            }
        }
    }

    let outcome = handle.completion.await.context("Dispatch task failed")?;
    offer_store.merge(&outcome.offers).await?;

    info!(sent = outcome.sent, errors = outcome.errors, "dispatch_shutdown_complete");

    if let Some(reason) = outcome.aborted {
        bail!("Dispatch aborted: {}", reason);
    }

    Ok(())
}
