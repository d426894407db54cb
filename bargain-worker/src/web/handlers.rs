//! HTTP endpoint handlers.
//!
//! Listing and offer endpoints are thin wrappers over the pure pipeline plus
//! the JSON stores. `send_offers` streams a dispatch run as Server-Sent Events.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{error, info, warn};

use crate::dispatch::{dispatch, sender_for, Credentials, DispatchEvent, DispatchHandle};
use crate::listing::{normalize, prepare_batch, EnrichedListing, PriceTable, RawListing};
use crate::offer::{generate_offers, Offer, RegionPolicy};
use crate::store::{OffersFile, ResultsFile, Stores};
use crate::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub price_table: Arc<PriceTable>,
    pub stores: Stores,
    pub credentials: Arc<RwLock<Credentials>>,
    /// Held for the lifetime of a dispatch run; runs share one account.
    dispatch_slot: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(config: Config, price_table: PriceTable, credentials: Credentials) -> Self {
        let stores = Stores::from_config(&config);
        Self {
            config: Arc::new(config),
            price_table: Arc::new(price_table),
            stores,
            credentials: Arc::new(RwLock::new(credentials)),
            dispatch_slot: Arc::new(Mutex::new(())),
        }
    }
}

/// Error body returned by every failing JSON endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn internal_error(event: &'static str, e: anyhow::Error) -> ApiError {
    error!(error = %format!("{:#}", e), "{}", event);
    api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e))
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Stored Documents
// =============================================================================

pub async fn get_results(State(state): State<AppState>) -> Result<Json<ResultsFile>, ApiError> {
    match state.stores.listings.load().await {
        Ok(Some(results)) => Ok(Json(results)),
        Ok(None) => Err(api_error(StatusCode::NOT_FOUND, "No results yet")),
        Err(e) => Err(internal_error("results_load_failed", e)),
    }
}

pub async fn get_offers(State(state): State<AppState>) -> Result<Json<OffersFile>, ApiError> {
    match state.stores.offers.load().await {
        Ok(Some(offers)) => Ok(Json(offers)),
        Ok(None) => Err(api_error(StatusCode::NOT_FOUND, "No offers yet")),
        Err(e) => Err(internal_error("offers_load_failed", e)),
    }
}

// =============================================================================
// Normalize
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct NormalizeRequest {
    #[serde(default)]
    pub query: Option<String>,
    pub listings: Vec<RawListing>,
}

/// Pre-filter, normalize and persist a raw batch.
pub async fn normalize_listings(
    State(state): State<AppState>,
    Json(req): Json<NormalizeRequest>,
) -> Result<Json<ResultsFile>, ApiError> {
    let received = req.listings.len();
    let batch = prepare_batch(req.listings);
    let enriched = normalize(&batch, &state.price_table);
    let query = req
        .query
        .unwrap_or_else(|| state.config.search_query.clone());

    let results = state
        .stores
        .listings
        .save(&query, enriched)
        .await
        .map_err(|e| internal_error("results_save_failed", e))?;

    info!(
        received = received,
        total_listings = results.total_listings,
        bargains_found = results.bargains_found,
        "normalize_complete"
    );

    Ok(Json(results))
}

// =============================================================================
// Offers
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GenerateOffersRequest {
    pub template: Option<String>,
    pub listings: Option<Vec<EnrichedListing>>,
}

/// Generate the offer queue from the given listings, or from `results.json`.
pub async fn generate_offers_handler(
    State(state): State<AppState>,
    Json(req): Json<GenerateOffersRequest>,
) -> Result<Json<OffersFile>, ApiError> {
    let listings = match req.listings {
        Some(listings) => listings,
        None => match state.stores.listings.load().await {
            Ok(Some(results)) => results.listings,
            Ok(None) => {
                return Err(api_error(
                    StatusCode::NOT_FOUND,
                    "No results yet; normalize a batch first",
                ))
            }
            Err(e) => return Err(internal_error("results_load_failed", e)),
        },
    };

    let template = req
        .template
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| state.config.offer_template.clone());
    let policy = RegionPolicy::new(&state.config.target_regions);
    let offers = generate_offers(&listings, &template, &policy);

    let file = state
        .stores
        .offers
        .save(offers)
        .await
        .map_err(|e| internal_error("offers_save_failed", e))?;

    info!(
        listings = listings.len(),
        total_offers = file.total_offers,
        "offers_generated"
    );

    Ok(Json(file))
}

#[derive(Debug, Deserialize)]
pub struct SaveOffersRequest {
    pub offers: Vec<Offer>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveOffersResponse {
    pub ok: bool,
    pub total_offers: usize,
}

/// Replace the stored queue, e.g. after the operator edited or deselected offers.
pub async fn save_offers(
    State(state): State<AppState>,
    Json(req): Json<SaveOffersRequest>,
) -> Result<Json<SaveOffersResponse>, ApiError> {
    let file = state
        .stores
        .offers
        .save(req.offers)
        .await
        .map_err(|e| internal_error("offers_save_failed", e))?;

    Ok(Json(SaveOffersResponse {
        ok: true,
        total_offers: file.total_offers,
    }))
}

// =============================================================================
// Send Offers (SSE)
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SendOffersRequest {
    pub offers: Option<Vec<Offer>>,
}

/// Run a dispatch and stream its events, one `data:` JSON line each.
///
/// The run continues if the client goes away; final statuses are merged into
/// `offers.json` when it finishes.
pub async fn send_offers(
    State(state): State<AppState>,
    Json(req): Json<SendOffersRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = match start_dispatch(&state, req.offers).await {
        Ok(events) => events,
        Err(message) => {
            warn!(error = %message, "send_offers_rejected");
            single_event(DispatchEvent::Error { message })
        }
    };

    let stream = events
        .filter_map(|event| async move { Event::default().json_data(&event).ok().map(Ok) });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn start_dispatch(
    state: &AppState,
    offers: Option<Vec<Offer>>,
) -> Result<UnboundedReceiverStream<DispatchEvent>, String> {
    let slot = state
        .dispatch_slot
        .clone()
        .try_lock_owned()
        .map_err(|_| "A dispatch run is already in progress".to_string())?;

    let offers = match offers {
        Some(offers) => offers,
        None => state
            .stores
            .offers
            .load_offers()
            .await
            .map_err(|e| format!("{:#}", e))?,
    };
    if offers.is_empty() {
        return Err("No offers provided.".to_string());
    }

    let credentials = state.credentials.read().await.clone();
    let sender = sender_for(&state.config, credentials).map_err(|e| format!("{:#}", e))?;

    info!(offers = offers.len(), "send_offers_starting");
    let DispatchHandle { events, completion } =
        dispatch(offers, sender, state.config.inter_send_delay());

    let store = state.stores.offers.clone();
    tokio::spawn(async move {
        let _slot = slot;
        match completion.await {
            Ok(outcome) => {
                if let Err(e) = store.merge(&outcome.offers).await {
                    error!(error = %format!("{:#}", e), "offer_status_persist_failed");
                }
            }
            Err(e) => error!(error = %e, "dispatch_task_failed"),
        }
    });

    Ok(events)
}

fn single_event(event: DispatchEvent) -> UnboundedReceiverStream<DispatchEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    let _ = tx.send(event);
    UnboundedReceiverStream::new(rx)
}

// =============================================================================
// Session Credentials
// =============================================================================

/// Session status without secrets.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigResponse {
    pub user_id: String,
    pub has_cookie: bool,
    pub cookie_preview: String,
}

pub async fn get_config(State(state): State<AppState>) -> Json<ConfigResponse> {
    let credentials = state.credentials.read().await;
    Json(ConfigResponse {
        user_id: credentials.user_id.clone(),
        has_cookie: credentials.has_cookie(),
        cookie_preview: credentials.cookie_preview(),
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateCookiesRequest {
    pub cookie: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCookiesResponse {
    pub ok: bool,
    pub user_id: String,
    pub has_cookie: bool,
}

/// Replace the session cookie and/or user id and persist them.
pub async fn update_cookies(
    State(state): State<AppState>,
    Json(req): Json<UpdateCookiesRequest>,
) -> Result<Json<UpdateCookiesResponse>, ApiError> {
    let updated = {
        let mut credentials = state.credentials.write().await;
        if let Some(cookie) = req.cookie {
            credentials.cookie = cookie.trim().to_string();
        }
        if let Some(user_id) = req.user_id {
            credentials.user_id = user_id.trim().to_string();
        }
        credentials.clone()
    };

    state
        .stores
        .credentials
        .save(&updated)
        .await
        .map_err(|e| internal_error("credentials_save_failed", e))?;

    Ok(Json(UpdateCookiesResponse {
        ok: true,
        user_id: updated.user_id.clone(),
        has_cookie: updated.has_cookie(),
    }))
}
