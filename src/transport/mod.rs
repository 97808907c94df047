// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP + WebSocket transport for the fleet coordination core.

pub mod http;
pub mod ws;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::AppState;

/// Build the axum `Router` with every route this crate exposes (§6).
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(http::health))
        .route("/ws", get(ws::ws_handler))
        .route("/shift/start", post(crate::shift::shift_start))
        .route("/shift/end", post(crate::shift::shift_end))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
