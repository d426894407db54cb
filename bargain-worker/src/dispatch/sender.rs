//! The sending capability the dispatch engine drives.

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

/// Why a single send did not go through.
#[derive(Debug, Error)]
pub enum SendError {
    /// The capability itself can't be used (e.g. no session configured).
    /// Every further send would fail the same way.
    #[error("sender unavailable: {0}")]
    Unavailable(String),

    /// The endpoint answered with a non-success status.
    #[error("{detail}")]
    Rejected { status: u16, detail: String },

    #[error("transport error: {0}")]
    Transport(String),
}

impl SendError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, SendError::Unavailable(_))
    }
}

impl From<reqwest::Error> for SendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SendError::Transport(format!("timed out: {}", e))
        } else {
            SendError::Transport(e.to_string())
        }
    }
}

/// Delivers one rendered message for one listing.
///
/// Implementations own their timeouts; the engine waits for whatever outcome
/// `send` reports.
#[async_trait]
pub trait OfferSender: Send + Sync {
    /// Checked once before a run starts.
    fn ready(&self) -> Result<(), SendError> {
        Ok(())
    }

    async fn send(&self, offer_id: &str, message: &str) -> Result<(), SendError>;
}

/// Logs each message instead of sending it.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunSender;

#[async_trait]
impl OfferSender for DryRunSender {
    async fn send(&self, offer_id: &str, message: &str) -> Result<(), SendError> {
        info!(
            offer_id = %offer_id,
            message_length = message.chars().count(),
            message = %message,
            "dry_run_send"
        );
        Ok(())
    }
}
