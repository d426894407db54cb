//! Progress events emitted by a dispatch run.
//!
//! Serialized with a `type` tag, e.g. `{"type":"waiting","seconds":3,"millis":3000}`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::offer::{Offer, OfferStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DispatchEvent {
    Start {
        total: usize,
    },
    #[serde(rename_all = "camelCase")]
    Progress {
        index: usize,
        total: usize,
        id: String,
        title: String,
        offer_price: u64,
        status: OfferStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Waiting {
        seconds: u64,
        millis: u64,
    },
    Done {
        sent: usize,
        errors: usize,
    },
    /// Stream-level failure. Nothing follows it.
    Error {
        message: String,
    },
}

impl DispatchEvent {
    pub(crate) fn progress(index: usize, total: usize, offer: &Offer, error: Option<String>) -> Self {
        DispatchEvent::Progress {
            index,
            total,
            id: offer.id.clone(),
            title: offer.title.clone(),
            offer_price: offer.offer_price,
            status: offer.status,
            error,
        }
    }

    pub(crate) fn waiting(delay: Duration) -> Self {
        DispatchEvent::Waiting {
            seconds: delay.as_secs(),
            millis: delay.as_millis() as u64,
        }
    }

    /// Wire name of the event, as it appears in the `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchEvent::Start { .. } => "start",
            DispatchEvent::Progress { .. } => "progress",
            DispatchEvent::Waiting { .. } => "waiting",
            DispatchEvent::Done { .. } => "done",
            DispatchEvent::Error { .. } => "error",
        }
    }

    /// True for the last event a run can produce.
    pub fn is_final(&self) -> bool {
        matches!(self, DispatchEvent::Done { .. } | DispatchEvent::Error { .. })
    }
}
