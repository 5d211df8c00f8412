//! HTTP surface.
//!
//! Three routes: `POST /actions` (button clicks), `POST /events` (event
//! deliveries, including the URL-verification handshake and thread replies)
//! and `GET /health` (liveness document, doubling as the peer probe target).
//! Concurrent request handling is the listener's problem; each request is an
//! independent task with no shared mutable state beyond the record stores.

pub mod error;
mod handlers;
pub mod signature;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::relay::RelayRouter;

#[derive(Clone)]
pub struct AppState {
    pub router: Arc<RelayRouter>,
    /// Per-workspace signing secret; `None` skips verification (with a
    /// warning per request).
    pub signing_secret: Option<String>,
    pub hostname: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/actions", post(handlers::actions))
        .route("/events", post(handlers::events))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
