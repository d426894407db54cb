//! Offer records and their delivery state machine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Delivery state of an offer: `pending → sending → {sent | error}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferStatus {
    #[default]
    Pending,
    Sending,
    Sent,
    Error,
}

impl OfferStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OfferStatus::Sent | OfferStatus::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OfferStatus::Pending => "pending",
            OfferStatus::Sending => "sending",
            OfferStatus::Sent => "sent",
            OfferStatus::Error => "error",
        }
    }

    fn can_become(&self, next: OfferStatus) -> bool {
        matches!(
            (*self, next),
            (OfferStatus::Pending, OfferStatus::Sending)
                | (OfferStatus::Sending, OfferStatus::Sent)
                | (OfferStatus::Sending, OfferStatus::Error)
        )
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("offer {offer_id}: cannot move from {from} to {to}")]
pub struct TransitionError {
    pub offer_id: String,
    pub from: &'static str,
    pub to: &'static str,
}

/// A templated counter-offer for one eligible listing.
///
/// Holds copies of the listing's identifying fields; the listing itself is
/// not touched again once the offer exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    pub id: String,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub toridiili: bool,
    pub asking_price: f64,
    pub offer_price: u64,
    #[serde(rename = "discount")]
    pub discount_percent: u8,
    #[serde(default)]
    pub bargain_score: u8,
    pub message: String,
    #[serde(default)]
    pub status: OfferStatus,
    #[serde(default = "default_selected")]
    pub selected: bool,
}

fn default_selected() -> bool {
    true
}

impl Offer {
    /// Queued for the next dispatch run.
    pub fn is_dispatchable(&self) -> bool {
        self.status == OfferStatus::Pending && self.selected
    }

    /// Move to `next` if the state machine allows it.
    pub fn transition(&mut self, next: OfferStatus) -> Result<(), TransitionError> {
        if !self.status.can_become(next) {
            return Err(TransitionError {
                offer_id: self.id.clone(),
                from: self.status.as_str(),
                to: next.as_str(),
            });
        }
        self.status = next;
        Ok(())
    }

    /// Put a terminal offer back in the queue. Operator action only.
    pub fn requeue(&mut self) {
        self.status = OfferStatus::Pending;
    }
}
