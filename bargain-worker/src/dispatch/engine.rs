//! Sequential, rate-limited offer dispatch.
//!
//! One offer is in flight at a time. The messaging account's rate limit is
//! shared by every send, so runs never overlap sends and always wait
//! `inter_send_delay` between two offers.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{error, info, warn};

use super::events::DispatchEvent;
use super::sender::OfferSender;
use crate::offer::{Offer, OfferStatus};

/// Final state of a dispatch run.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    /// Every offer handed to the run, in input order, with updated statuses.
    pub offers: Vec<Offer>,
    pub sent: usize,
    pub errors: usize,
    /// Set when the run stopped on a stream-level error.
    pub aborted: Option<String>,
}

impl DispatchOutcome {
    pub fn completed(&self) -> bool {
        self.aborted.is_none()
    }
}

/// A run executing in the background.
///
/// Dropping `events` does not stop the run; `completion` still resolves with
/// the final statuses.
pub struct DispatchHandle {
    pub events: UnboundedReceiverStream<DispatchEvent>,
    pub completion: JoinHandle<DispatchOutcome>,
}

/// Spawn a dispatch run and stream its events.
pub fn dispatch(
    offers: Vec<Offer>,
    sender: Arc<dyn OfferSender>,
    inter_send_delay: Duration,
) -> DispatchHandle {
    let (tx, rx) = mpsc::unbounded_channel();

    let completion = tokio::spawn(async move {
        run_dispatch(offers, sender.as_ref(), inter_send_delay, |event| {
            // A closed receiver only means nobody is watching any more.
            let _ = tx.send(event);
        })
        .await
    });

    DispatchHandle {
        events: UnboundedReceiverStream::new(rx),
        completion,
    }
}

/// Drive one dispatch run to completion, reporting every step through `emit`.
///
/// Only offers that are `pending` and selected are sent; the rest are
/// returned untouched. A failed send marks that offer `error` and the run
/// moves on. A fatal sender failure emits a stream-level `error` and stops:
/// offers not yet attempted stay `pending` and no `done` event follows.
pub async fn run_dispatch<F>(
    mut offers: Vec<Offer>,
    sender: &dyn OfferSender,
    inter_send_delay: Duration,
    mut emit: F,
) -> DispatchOutcome
where
    F: FnMut(DispatchEvent) + Send,
{
    if let Err(e) = sender.ready() {
        error!(error = %e, "dispatch_sender_unavailable");
        let message = e.to_string();
        emit(DispatchEvent::Error {
            message: message.clone(),
        });
        return DispatchOutcome {
            offers,
            sent: 0,
            errors: 0,
            aborted: Some(message),
        };
    }

    let queue: Vec<usize> = offers
        .iter()
        .enumerate()
        .filter(|(_, offer)| offer.is_dispatchable())
        .map(|(pos, _)| pos)
        .collect();
    let total = queue.len();

    info!(
        total = total,
        skipped = offers.len() - total,
        delay_ms = inter_send_delay.as_millis() as u64,
        "dispatch_started"
    );
    emit(DispatchEvent::Start { total });

    let mut sent = 0;
    let mut errors = 0;
    let mut aborted = None;

    for (index, &pos) in queue.iter().enumerate() {
        let offer = &mut offers[pos];

        if !advance(offer, OfferStatus::Sending) {
            continue;
        }
        info!(offer_id = %offer.id, index = index, total = total, "dispatch_offer_sending");
        emit(DispatchEvent::progress(index, total, offer, None));

        match sender.send(&offer.id, &offer.message).await {
            Ok(()) => {
                advance(offer, OfferStatus::Sent);
                sent += 1;
                info!(offer_id = %offer.id, offer_price = offer.offer_price, "dispatch_offer_sent");
                emit(DispatchEvent::progress(index, total, offer, None));
            }
            Err(e) => {
                advance(offer, OfferStatus::Error);
                errors += 1;
                warn!(offer_id = %offer.id, error = %e, fatal = e.is_fatal(), "dispatch_offer_failed");
                emit(DispatchEvent::progress(index, total, offer, Some(e.to_string())));

                if e.is_fatal() {
                    aborted = Some(e.to_string());
                    break;
                }
            }
        }

        if index + 1 < total {
            emit(DispatchEvent::waiting(inter_send_delay));
            sleep(inter_send_delay).await;
        }
    }

    match &aborted {
        Some(message) => {
            error!(sent = sent, errors = errors, error = %message, "dispatch_aborted");
            emit(DispatchEvent::Error {
                message: message.clone(),
            });
        }
        None => {
            info!(sent = sent, errors = errors, "dispatch_complete");
            emit(DispatchEvent::Done { sent, errors });
        }
    }

    DispatchOutcome {
        offers,
        sent,
        errors,
        aborted,
    }
}

fn advance(offer: &mut Offer, next: OfferStatus) -> bool {
    match offer.transition(next) {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "dispatch_transition_rejected");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::sender::SendError;
    use async_trait::async_trait;
    use futures::StreamExt;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio::time::Instant;

    const TICK: Duration = Duration::from_millis(5);

    enum Script {
        Reject,
        Expire,
    }

    #[derive(Default)]
    struct ScriptedSender {
        script: HashMap<String, Script>,
        unconfigured: bool,
        calls: Mutex<Vec<(String, Instant)>>,
    }

    impl ScriptedSender {
        fn failing(id: &str, how: Script) -> Self {
            let mut script = HashMap::new();
            script.insert(id.to_string(), how);
            Self {
                script,
                ..Default::default()
            }
        }

        fn called_ids(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|(id, _)| id.clone())
                .collect()
        }
    }

    #[async_trait]
    impl OfferSender for ScriptedSender {
        fn ready(&self) -> Result<(), SendError> {
            if self.unconfigured {
                return Err(SendError::Unavailable("no session cookie".into()));
            }
            Ok(())
        }

        async fn send(&self, offer_id: &str, _message: &str) -> Result<(), SendError> {
            self.calls
                .lock()
                .unwrap()
                .push((offer_id.to_string(), Instant::now()));
            match self.script.get(offer_id) {
                Some(Script::Reject) => Err(SendError::Rejected {
                    status: 429,
                    detail: "HTTP 429".into(),
                }),
                Some(Script::Expire) => Err(SendError::Unavailable("session expired".into())),
                None => Ok(()),
            }
        }
    }

    fn offer(id: &str) -> Offer {
        Offer {
            id: id.to_string(),
            title: format!("DDR5 32GB #{}", id),
            url: format!("https://www.tori.fi/recommerce/forsale/item/{}", id),
            location: "Espoo".to_string(),
            toridiili: false,
            asking_price: 300.0,
            offer_price: 240,
            discount_percent: 20,
            bargain_score: 68,
            message: format!("Moi! 240€? ({})", id),
            status: OfferStatus::Pending,
            selected: true,
        }
    }

    fn batch(ids: &[&str]) -> Vec<Offer> {
        ids.iter().map(|id| offer(id)).collect()
    }

    async fn run(offers: Vec<Offer>, sender: &ScriptedSender) -> (Vec<DispatchEvent>, DispatchOutcome) {
        let mut events = Vec::new();
        let outcome = run_dispatch(offers, sender, TICK, |e| events.push(e)).await;
        (events, outcome)
    }

    fn progress_statuses(events: &[DispatchEvent]) -> Vec<(String, OfferStatus)> {
        events
            .iter()
            .filter_map(|e| match e {
                DispatchEvent::Progress { id, status, .. } => Some((id.clone(), *status)),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let sender = ScriptedSender::failing("2", Script::Reject);
        let (events, outcome) = run(batch(&["1", "2", "3"]), &sender).await;

        assert_eq!(sender.called_ids(), vec!["1", "2", "3"]);
        assert_eq!(events.first(), Some(&DispatchEvent::Start { total: 3 }));
        assert_eq!(events.last(), Some(&DispatchEvent::Done { sent: 2, errors: 1 }));

        let finals: Vec<_> = progress_statuses(&events)
            .into_iter()
            .filter(|(_, s)| *s != OfferStatus::Sending)
            .collect();
        assert_eq!(
            finals,
            vec![
                ("1".to_string(), OfferStatus::Sent),
                ("2".to_string(), OfferStatus::Error),
                ("3".to_string(), OfferStatus::Sent),
            ]
        );

        let error_detail = events.iter().find_map(|e| match e {
            DispatchEvent::Progress { error: Some(d), .. } => Some(d.clone()),
            _ => None,
        });
        assert_eq!(error_detail.as_deref(), Some("HTTP 429"));

        assert_eq!((outcome.sent, outcome.errors), (2, 1));
        assert!(outcome.completed());
        let statuses: Vec<_> = outcome.offers.iter().map(|o| o.status).collect();
        assert_eq!(
            statuses,
            vec![OfferStatus::Sent, OfferStatus::Error, OfferStatus::Sent]
        );
    }

    #[tokio::test]
    async fn test_event_order_and_waiting_between_offers_only() {
        let sender = ScriptedSender::default();
        let (events, _) = run(batch(&["1", "2"]), &sender).await;

        let kinds: Vec<&str> = events.iter().map(|e| e.kind()).collect();
        assert_eq!(
            kinds,
            vec!["start", "progress", "progress", "waiting", "progress", "progress", "done"]
        );
        assert!(matches!(
            events[3],
            DispatchEvent::Waiting { millis: 5, .. }
        ));
    }

    #[tokio::test]
    async fn test_sends_are_spaced_by_delay() {
        let sender = ScriptedSender::default();
        run(batch(&["1", "2", "3"]), &sender).await;

        let calls = sender.calls.lock().unwrap();
        for pair in calls.windows(2) {
            assert!(pair[1].1.duration_since(pair[0].1) >= TICK);
        }
    }

    #[tokio::test]
    async fn test_only_pending_selected_offers_are_sent() {
        let mut offers = batch(&["1", "2", "3", "4"]);
        offers[1].selected = false;
        offers[2].status = OfferStatus::Sent;

        let sender = ScriptedSender::default();
        let (events, outcome) = run(offers, &sender).await;

        assert_eq!(sender.called_ids(), vec!["1", "4"]);
        assert_eq!(events[0], DispatchEvent::Start { total: 2 });
        assert_eq!(outcome.offers.len(), 4);
        assert_eq!(outcome.offers[1].status, OfferStatus::Pending);
        assert_eq!(outcome.offers[2].status, OfferStatus::Sent);
    }

    #[tokio::test]
    async fn test_unconfigured_sender_aborts_before_start() {
        let sender = ScriptedSender {
            unconfigured: true,
            ..Default::default()
        };
        let (events, outcome) = run(batch(&["1", "2"]), &sender).await;

        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], DispatchEvent::Error { .. }));
        assert!(sender.called_ids().is_empty());
        assert!(!outcome.completed());
        assert!(outcome.offers.iter().all(|o| o.status == OfferStatus::Pending));
    }

    #[tokio::test]
    async fn test_fatal_failure_stops_run() {
        let sender = ScriptedSender::failing("2", Script::Expire);
        let (events, outcome) = run(batch(&["1", "2", "3"]), &sender).await;

        assert_eq!(sender.called_ids(), vec!["1", "2"]);
        assert!(matches!(events.last(), Some(DispatchEvent::Error { .. })));
        assert!(!events.iter().any(|e| matches!(e, DispatchEvent::Done { .. })));

        let statuses: Vec<_> = outcome.offers.iter().map(|o| o.status).collect();
        assert_eq!(
            statuses,
            vec![OfferStatus::Sent, OfferStatus::Error, OfferStatus::Pending]
        );
        assert_eq!(outcome.aborted.as_deref(), Some("sender unavailable: session expired"));
    }

    #[tokio::test]
    async fn test_empty_queue() {
        let sender = ScriptedSender::default();
        let (events, outcome) = run(Vec::new(), &sender).await;

        assert_eq!(
            events,
            vec![
                DispatchEvent::Start { total: 0 },
                DispatchEvent::Done { sent: 0, errors: 0 }
            ]
        );
        assert!(outcome.completed());
    }

    #[tokio::test]
    async fn test_spawned_run_streams_events() {
        let sender: Arc<dyn OfferSender> = Arc::new(ScriptedSender::failing("2", Script::Reject));
        let handle = dispatch(batch(&["1", "2", "3"]), sender, TICK);

        let events: Vec<DispatchEvent> = handle.events.collect().await;
        let outcome = handle.completion.await.unwrap();

        assert_eq!(events.last(), Some(&DispatchEvent::Done { sent: 2, errors: 1 }));
        assert_eq!(outcome.sent, 2);
    }

    #[tokio::test]
    async fn test_run_survives_consumer_disconnect() {
        let sender = Arc::new(ScriptedSender::default());
        let handle = dispatch(batch(&["1", "2", "3"]), sender.clone(), TICK);

        drop(handle.events);
        let outcome = handle.completion.await.unwrap();

        assert_eq!(outcome.sent, 3);
        assert_eq!(sender.called_ids().len(), 3);
    }
}
