// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ancillary HTTP routes: health (added, §1A) plus re-exports of the shift
//! lifecycle handlers wired in [`super::build_router`].

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub sessions: usize,
    pub drivers: usize,
}

/// `GET /healthz` (§1A): used by ops tooling and by this crate's own
/// integration tests to wait for server readiness.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let sessions = state.registry.len().await;
    let drivers = state.drivers.snapshot().await.len();
    Json(HealthResponse { status: "ok", sessions, drivers })
}
