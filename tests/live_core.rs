// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenarios against the live channel and shift endpoints, using
//! `axum_test::TestServer` the way the mux proxy's integration suite does —
//! no real TCP socket needed.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum_test::TestServer;
use tokio_util::sync::CancellationToken;

use fleet_core::store::InMemoryFleetStore;
use fleet_core::transport::build_router;
use fleet_core::AppState;

fn test_state() -> Arc<AppState> {
    let dir = tempfile::tempdir().expect("tempdir").into_path();
    Arc::new(AppState::new(Arc::new(InMemoryFleetStore::new()), dir))
}

fn test_server(state: Arc<AppState>) -> TestServer {
    TestServer::new(build_router(state)).expect("create test server")
}

#[tokio::test]
async fn healthz_reports_zero_sessions_initially() {
    let server = test_server(test_state());
    let resp = server.get("/healthz").await;
    resp.assert_status(StatusCode::OK);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["sessions"], 0);
}

#[tokio::test]
async fn shift_start_rejects_missing_fields() {
    let server = test_server(test_state());
    let resp = server
        .post("/shift/start")
        .json(&serde_json::json!({"driver_id": "7"}))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn shift_start_then_end_succeeds() {
    let server = test_server(test_state());
    let start = server
        .post("/shift/start")
        .json(&serde_json::json!({
            "driver_id": "7",
            "car_id": "car-1",
            "route_id": 1,
            "vehicle_status": "正常运营",
        }))
        .await;
    start.assert_status(StatusCode::OK);

    let end = server
        .post("/shift/end")
        .json(&serde_json::json!({"driver_id": "7", "car_id": "car-1"}))
        .await;
    end.assert_status(StatusCode::OK);
}

// S1 — driver joins, moves, is broadcast to every registered session.
#[tokio::test]
async fn driver_gps_update_is_broadcast_to_all_sessions() {
    let state = test_state();
    fleet_core::broadcaster::spawn(
        Arc::clone(&state),
        Duration::from_millis(50),
        CancellationToken::new(),
    );
    let server = test_server(state);

    let mut driver_ws = server.get_websocket("/ws?class=driver").await.into_websocket().await;
    let mut observer_ws = server.get_websocket("/ws?class=passenger").await.into_websocket().await;

    // Join-time replay (§4.8): each session gets a site frame then a route
    // frame before anything else.
    driver_ws.receive_text().await;
    driver_ws.receive_text().await;
    observer_ws.receive_text().await;
    observer_ws.receive_text().await;

    driver_ws.send_text(r#"{"type":"connections","driver_id":"7"}"#).await;
    driver_ws
        .send_text(
            r#"{"type":"driver_gps","driver_id":"7","car_id":"car-1","location":{"latitude":22.5,"longitude":113.9}}"#,
        )
        .await;

    let frame: serde_json::Value = observer_ws.receive_json().await;
    assert_eq!(frame["type"], "driver_positions");
    assert_eq!(frame["positions"][0]["id"], "7");
    assert_eq!(frame["positions"][0]["location"]["latitude"], 22.5);
}

// S3 — vehicle telemetry forwarded only to the session bound to that car_id.
#[tokio::test]
async fn boarding_message_is_forwarded_only_to_bound_vehicle() {
    let state = test_state();
    let server = test_server(state);

    let mut vehicle_ws = server.get_websocket("/ws?class=driver").await.into_websocket().await;
    let mut other_ws = server.get_websocket("/ws?class=passenger").await.into_websocket().await;
    vehicle_ws.receive_text().await;
    vehicle_ws.receive_text().await;
    other_ws.receive_text().await;
    other_ws.receive_text().await;

    vehicle_ws.send_text(r#"{"type":"car_conn","car_id":"car-1"}"#).await;

    let sender_server = server.clone();
    let mut sender_ws = sender_server.get_websocket("/ws?class=admin").await.into_websocket().await;
    sender_ws.receive_text().await;
    sender_ws.receive_text().await;
    sender_ws
        .send_text(r#"{"type":"boardingMessage","car_id":"car-1","boardingCount":3}"#)
        .await;

    let received: serde_json::Value = vehicle_ws.receive_json().await;
    assert_eq!(received["car_id"], "car-1");
    assert_eq!(received["boardingCount"], 3);
}

// §7 — malformed JSON closes the session.
#[tokio::test]
async fn malformed_frame_closes_the_session() {
    let server = test_server(test_state());
    let mut ws = server.get_websocket("/ws").await.into_websocket().await;
    ws.receive_text().await;
    ws.receive_text().await;
    ws.send_text("not json at all").await;
    let message = ws.receive_message().await;
    assert!(matches!(message, axum::extract::ws::Message::Close(_)));
}
