//! Rate-limited, sequential offer dispatch.
//!
//! ```text
//! Vec<Offer> → dispatch() → OfferSender::send() (one at a time, delay between)
//!                  ↓
//!            DispatchEvent stream → observer (SSE, logs)
//! ```

pub mod api;
pub mod engine;
pub mod events;
pub mod sender;

pub use api::{ApiSender, Credentials, DEFAULT_MESSAGES_URL_TEMPLATE};
pub use engine::{dispatch, run_dispatch, DispatchHandle, DispatchOutcome};
pub use events::DispatchEvent;
pub use sender::{DryRunSender, OfferSender, SendError};

use std::sync::Arc;

use anyhow::Result;

use crate::config::{Config, SendMode};

/// Sender for the configured mode.
pub fn sender_for(config: &Config, credentials: Credentials) -> Result<Arc<dyn OfferSender>> {
    let sender: Arc<dyn OfferSender> = match config.send_mode {
        SendMode::Api => Arc::new(ApiSender::from_config(config, credentials)?),
        SendMode::DryRun => Arc::new(DryRunSender),
    };
    Ok(sender)
}
