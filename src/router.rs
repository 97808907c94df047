// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message Router (§4.6): dispatches one already-parsed inbound frame to a
//! state update, an addressed forward, a full broadcast, or a persistence
//! handler. Forwards carry the original frame text unchanged (§6 "Forwarded
//! frames: passed through unchanged") rather than a re-serialized copy.

use std::sync::Arc;

use crate::frame::{InboundFrame, SiteEdit};
use crate::geometry::RetireOutcome;
use crate::session::{BoundId, ClientClass, SessionHandle};
use crate::store::SiteRecord;
use crate::AppState;

/// Handle one inbound frame already known to be well-formed. `raw_text` is
/// the original frame bytes, used verbatim for every forward/broadcast path
/// so routed frames are never re-encoded.
pub async fn dispatch(state: &AppState, session: &Arc<SessionHandle>, raw_text: &str, frame: InboundFrame) {
    match frame {
        InboundFrame::Connections { driver_id } => {
            state.addresses.bind(driver_id.clone(), Arc::clone(session)).await;
            match session.class {
                ClientClass::Driver => session.record_bound_id(BoundId::Driver(driver_id)).await,
                ClientClass::Passenger => {
                    if let Err(e) = state.passengers.create(&driver_id).await {
                        tracing::warn!(passenger_id = %driver_id, error = %e, "duplicate passenger registration");
                    }
                    session.record_bound_id(BoundId::Passenger(driver_id)).await
                }
                ClientClass::Admin => {}
            }
        }
        InboundFrame::CarConn { car_id } => {
            state.addresses.bind(car_id.clone(), Arc::clone(session)).await;
            session.record_bound_id(BoundId::Vehicle(car_id)).await;
        }
        InboundFrame::DriverGps { driver_id, car_id, location } => {
            if let Err(e) = state.drivers.update(&driver_id, location.latitude, location.longitude, &car_id).await
            {
                tracing::warn!(driver_id = %driver_id, error = %e, "driver_gps update failed");
            }
        }
        InboundFrame::VehicleCall { .. } => {
            broadcast_raw(state, raw_text).await;
        }
        InboundFrame::CallAccept { passenger_id, .. } => match passenger_id {
            Some(id) => send_to(state, &id, raw_text).await,
            None => broadcast_raw(state, raw_text).await,
        },
        InboundFrame::PaymentUserCount { car_id, .. } => send_to(state, &car_id, raw_text).await,
        InboundFrame::BoardingMessage { car_id, .. } => send_to(state, &car_id, raw_text).await,
        InboundFrame::AlightingMessage { car_id, .. } => send_to(state, &car_id, raw_text).await,
        InboundFrame::UpdateSites { sites } => update_sites(state, sites).await,
        InboundFrame::UpdateRoutes { routes } => {
            for route in routes {
                if let Err(e) = state.store.upsert_route(route.id, true).await {
                    tracing::warn!(route_id = route.id, error = %e, "upsert_route failed");
                    continue;
                }
                if let Err(e) = state.routes.write_active(route.id, &route.path).await {
                    tracing::warn!(route_id = route.id, error = %e, "route polyline write failed");
                }
            }
        }
        InboundFrame::DeleteRoute { routes } => {
            for route_ref in routes {
                match state.routes.retire(route_ref.id).await {
                    Ok(RetireOutcome::AlreadyRetired) => {
                        tracing::warn!(route_id = route_ref.id, "route already retired");
                    }
                    Ok(RetireOutcome::Retired) => {}
                    Err(e) => {
                        tracing::warn!(route_id = route_ref.id, error = %e, "route retire failed");
                    }
                }
                if let Err(e) = state.store.retire_route(route_ref.id).await {
                    tracing::warn!(route_id = route_ref.id, error = %e, "retire_route row update failed");
                }
            }
        }
    }
}

async fn update_sites(state: &AppState, sites: Vec<SiteEdit>) {
    for site in sites {
        let record = SiteRecord {
            id: site.id,
            name: site.name,
            latitude: site.location.latitude,
            longitude: site.location.longitude,
            waiting_count: site.site_passenger,
            active: site.is_used,
            note: site.site_note,
        };
        if let Err(e) = state.store.upsert_site(record).await {
            tracing::warn!(error = %e, "upsert_site failed");
        }
    }
}

/// Forward semantics (§4.6 "send_to"): look up `id`, drop on miss or write
/// failure, no retry. A failed write lazily unbinds the stale entry and
/// triggers the same cleanup a read error would (§4.1 "A write failure
/// marks the session dead and triggers cleanup").
pub async fn send_to(state: &AppState, id: &str, text: &str) {
    let Some(session) = state.addresses.lookup(id).await else {
        tracing::warn!(external_id = %id, "forward target not bound");
        return;
    };
    if session.send(text.to_owned()).await.is_err() {
        tracing::warn!(external_id = %id, "forward write failed, unbinding");
        state.addresses.unbind_if(id, session.id).await;
        state.cleanup_session(&session).await;
    }
}

/// Full broadcast (§4.6 `vehicle_call`, unaddressed `call_accept`). Sessions
/// are visited one at a time so write-lock ordering per session is
/// preserved (§5); a failed write schedules that session's cleanup and the
/// loop continues with the rest (§4.5 step 5).
async fn broadcast_raw(state: &AppState, text: &str) {
    state
        .registry
        .for_each(None, |session| async move {
            if session.send(text.to_owned()).await.is_err() {
                state.cleanup_session(&session).await;
            }
        })
        .await;
}
