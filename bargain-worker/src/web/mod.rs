//! Web server module: dashboard API over the listing pipeline and dispatch.
//!
//! | Route                      | Handler                   |
//! |----------------------------|---------------------------|
//! | `GET  /health`             | [`health`]                |
//! | `GET  /results.json`       | [`get_results`]           |
//! | `GET  /offers.json`        | [`get_offers`]            |
//! | `POST /api/normalize`      | [`normalize_listings`]    |
//! | `POST /api/generate-offers`| [`generate_offers_handler`] |
//! | `POST /api/save-offers`    | [`save_offers`]           |
//! | `POST /api/send-offers`    | [`send_offers`] (SSE)     |
//! | `GET  /api/config`         | [`get_config`]            |
//! | `POST /api/update-cookies` | [`update_cookies`]        |

pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use handlers::{
    generate_offers_handler, get_config, get_offers, get_results, health, normalize_listings,
    save_offers, send_offers, update_cookies, AppState, ConfigResponse, ErrorResponse,
    HealthResponse,
};

/// Build the router with every route and request tracing.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/results.json", get(get_results))
        .route("/offers.json", get(get_offers))
        .route("/api/normalize", post(normalize_listings))
        .route("/api/generate-offers", post(generate_offers_handler))
        .route("/api/save-offers", post(save_offers))
        .route("/api/send-offers", post(send_offers))
        .route("/api/config", get(get_config))
        .route("/api/update-cookies", post(update_cookies))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
