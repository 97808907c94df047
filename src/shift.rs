// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shift Lifecycle (§4.7): `shift_start` / `shift_end` HTTP handlers.
//! Field validation and the `{error}` / `{message}` response shape follow
//! the original `driverShift` handlers; the side effects they trigger are
//! the same relational + Driver State Store calls (§6).

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::error::AppError;
use crate::store::vehicle_status_code;
use crate::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct ShiftRequest {
    pub driver_id: Option<String>,
    pub car_id: Option<String>,
    pub route_id: Option<i64>,
    pub vehicle_status: Option<String>,
    #[serde(default)]
    pub remark: Option<String>,
}

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

/// `POST /shift/start` (§4.7 shift_start, steps 1-5).
pub async fn shift_start(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ShiftRequest>,
) -> impl IntoResponse {
    let (Some(driver_id), Some(car_id), Some(route_id), Some(status_tag)) =
        (req.driver_id, req.car_id, req.route_id, req.vehicle_status)
    else {
        return AppError::BadRequest
            .to_http_response("driver_id, car_id, route_id and vehicle_status are required")
            .into_response();
    };

    let Some(status_code) = vehicle_status_code(&status_tag) else {
        return AppError::BadRequest
            .to_http_response(format!("unrecognized vehicle_status: {status_tag}"))
            .into_response();
    };

    if let Err(e) = state.store.update_vehicle_status(&car_id, status_code).await {
        return AppError::Internal.to_http_response(e.to_string()).into_response();
    }
    if let Err(e) = state.store.set_driver_working(&driver_id, true).await {
        return AppError::Internal.to_http_response(e.to_string()).into_response();
    }
    if let Err(e) =
        state.store.open_shift(&driver_id, &car_id, route_id, now_ms(), req.remark).await
    {
        return AppError::Internal.to_http_response(e.to_string()).into_response();
    }
    if let Err(e) = state.drivers.create(&driver_id).await {
        return AppError::Internal.to_http_response(e.to_string()).into_response();
    }

    (axum::http::StatusCode::OK, Json(crate::error::MessageResponse { message: "shift started".into() }))
        .into_response()
}

/// `POST /shift/end` (§4.7 shift_end, steps 1-4).
pub async fn shift_end(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ShiftRequest>,
) -> impl IntoResponse {
    let (Some(driver_id), Some(car_id)) = (req.driver_id, req.car_id) else {
        return AppError::BadRequest
            .to_http_response("driver_id and car_id are required")
            .into_response();
    };

    if let Some(status_tag) = req.vehicle_status {
        if let Some(status_code) = vehicle_status_code(&status_tag) {
            if let Err(e) = state.store.update_vehicle_status(&car_id, status_code).await {
                return AppError::Internal.to_http_response(e.to_string()).into_response();
            }
        }
    }
    if let Err(e) = state.store.set_driver_working(&driver_id, false).await {
        return AppError::Internal.to_http_response(e.to_string()).into_response();
    }
    if let Err(e) = state.store.close_shift(&driver_id, &car_id, now_ms()).await {
        return AppError::Internal.to_http_response(e.to_string()).into_response();
    }
    if let Err(e) = state.drivers.delete(&driver_id).await {
        tracing::warn!(driver_id = %driver_id, error = %e, "shift_end: driver presence already absent");
    }

    (axum::http::StatusCode::OK, Json(crate::error::MessageResponse { message: "shift ended".into() }))
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shift_start_end_start_yields_new_open_shift_and_present_driver() {
        let state = Arc::new(AppState::new_in_memory_for_tests());

        shift_start(
            State(Arc::clone(&state)),
            Json(ShiftRequest {
                driver_id: Some("7".into()),
                car_id: Some("car-1".into()),
                route_id: Some(1),
                vehicle_status: Some("正常运营".into()),
                remark: None,
            }),
        )
        .await;
        shift_end(
            State(Arc::clone(&state)),
            Json(ShiftRequest {
                driver_id: Some("7".into()),
                car_id: Some("car-1".into()),
                route_id: None,
                vehicle_status: None,
                remark: None,
            }),
        )
        .await;
        shift_start(
            State(Arc::clone(&state)),
            Json(ShiftRequest {
                driver_id: Some("7".into()),
                car_id: Some("car-1".into()),
                route_id: Some(1),
                vehicle_status: Some("正常运营".into()),
                remark: None,
            }),
        )
        .await;

        let snapshot = state.drivers.snapshot().await;
        assert!(snapshot.iter().any(|(id, _)| id == "7"));
    }

    #[tokio::test]
    async fn shift_start_missing_fields_is_bad_request() {
        let state = Arc::new(AppState::new_in_memory_for_tests());
        let response = shift_start(
            State(state),
            Json(ShiftRequest {
                driver_id: Some("7".into()),
                car_id: None,
                route_id: Some(1),
                vehicle_status: Some("正常运营".into()),
                remark: None,
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
    }
}
