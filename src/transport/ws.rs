// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session Transport (§4.1): upgrades to the live channel, runs the
//! per-session reader loop, and drives the Open -> Closing -> Closed state
//! machine (§4.9). Grounded in the mux proxy's WS handler shape: split the
//! socket, register, loop on `ws_rx.next()`, clean up on exit.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::StreamExt;
use serde::Deserialize;

use crate::frame::{parse_inbound, FrameError};
use crate::router;
use crate::session::{ClientClass, SessionHandle};
use crate::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct WsQuery {
    #[serde(default)]
    pub class: Option<String>,
}

fn parse_class(raw: Option<&str>) -> ClientClass {
    match raw {
        Some("driver") => ClientClass::Driver,
        Some("admin") => ClientClass::Admin,
        // The original source defaults newly accepted connections to the
        // passenger class (§1B); unrecognized values fall back the same way.
        _ => ClientClass::Passenger,
    }
}

/// `GET /ws` (§6 "Live channel endpoint"). Origin is unrestricted on
/// purpose — a campus-scoped deployment (§4.1).
pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let class = parse_class(query.class.as_deref());
    ws.on_upgrade(move |socket| handle_socket(socket, state, class))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, class: ClientClass) {
    let (sink, mut stream) = socket.split();
    let session = SessionHandle::new(class, sink);
    state.registry.register(Arc::clone(&session)).await;
    tracing::debug!(session_id = session.id, ?class, "session accepted");

    replay_geometry(&state, &session).await;

    loop {
        let Some(msg) = stream.next().await else { break };
        match msg {
            Ok(Message::Text(text)) => {
                if handle_text_frame(&state, &session, &text).await.is_break() {
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(session_id = session.id, error = %e, "read error");
                break;
            }
        }
    }

    state.cleanup_session(&session).await;
    tracing::debug!(session_id = session.id, "session closed");
}

/// Returns `ControlFlow::Break` when the session must be torn down
/// (malformed JSON or a known type with invalid payload, §7 "Protocol
/// errors"); unknown types are logged and the loop continues (§4.6).
async fn handle_text_frame(
    state: &AppState,
    session: &Arc<SessionHandle>,
    text: &str,
) -> std::ops::ControlFlow<()> {
    match parse_inbound(text) {
        Ok(frame) => {
            router::dispatch(state, session, text, frame).await;
            std::ops::ControlFlow::Continue(())
        }
        Err(FrameError::UnknownType(tag)) => {
            tracing::debug!(session_id = session.id, frame_type = %tag, "unknown frame type, dropped");
            std::ops::ControlFlow::Continue(())
        }
        Err(FrameError::MalformedJson(detail)) => {
            tracing::warn!(session_id = session.id, error = %detail, "malformed frame, closing session");
            std::ops::ControlFlow::Break(())
        }
        Err(FrameError::MissingType) => {
            tracing::warn!(session_id = session.id, "frame missing type discriminator, closing session");
            std::ops::ControlFlow::Break(())
        }
        Err(FrameError::InvalidPayload { frame_type, detail }) => {
            tracing::warn!(session_id = session.id, frame_type = %frame_type, error = %detail, "invalid frame payload, closing session");
            std::ops::ControlFlow::Break(())
        }
    }
}

/// Join-time replay (§4.8): registration, then one `site` frame, then one
/// `route` frame, before any normal traffic is processed.
async fn replay_geometry(state: &AppState, session: &Arc<SessionHandle>) {
    let site_frame = state.build_site_frame().await;
    if session.send(site_frame.to_text()).await.is_err() {
        return;
    }
    let route_frame = state.build_route_frame().await;
    let _ = session.send(route_frame.to_text()).await;
}
