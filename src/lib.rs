// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Real-time fleet coordination core: session transport, client registry,
//! addressable index, driver/passenger presence, broadcaster, message
//! router, shift lifecycle, and geometry persistence for a campus shuttle
//! service.

pub mod broadcaster;
pub mod config;
pub mod driver_store;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod passenger_store;
pub mod registry;
pub mod router;
pub mod session;
pub mod shift;
pub mod store;
pub mod transport;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::driver_store::DriverStore;
use crate::frame::{OutboundFrame, RouteFrameEntry, SiteFrameEntry};
use crate::geometry::RouteFiles;
use crate::passenger_store::PassengerStore;
use crate::registry::{AddressIndex, ClientRegistry};
use crate::session::{BoundId, SessionHandle};
use crate::store::{FleetStore, InMemoryFleetStore};

/// Process-wide shared state injected into the router, broadcaster, and
/// HTTP handlers (§9 "Global mutable state": singletons with defined init
/// and teardown, injected rather than reached for globally).
pub struct AppState {
    pub registry: ClientRegistry,
    pub addresses: AddressIndex,
    pub drivers: DriverStore,
    pub passengers: PassengerStore,
    pub store: Arc<dyn FleetStore>,
    pub routes: RouteFiles,
}

impl AppState {
    pub fn new(store: Arc<dyn FleetStore>, assets_dir: std::path::PathBuf) -> Self {
        Self {
            registry: ClientRegistry::new(),
            addresses: AddressIndex::new(),
            drivers: DriverStore::new(),
            passengers: PassengerStore::new(),
            store,
            routes: RouteFiles::new(assets_dir),
        }
    }

    #[cfg(test)]
    pub fn new_in_memory_for_tests() -> Self {
        Self::new(Arc::new(InMemoryFleetStore::new()), std::env::temp_dir().join("fleet-core-tests"))
    }

    /// Build the `site` replay frame (§4.8 "Join-time replay").
    pub async fn build_site_frame(&self) -> OutboundFrame {
        let sites = self.store.load_active_sites().await.unwrap_or_default();
        OutboundFrame::Site {
            sites: sites
                .into_iter()
                .map(|s| SiteFrameEntry {
                    id: s.id,
                    name: s.name,
                    location: crate::frame::LatLon { latitude: s.latitude, longitude: s.longitude },
                    site_passenger: s.waiting_count,
                    is_used: s.active,
                    site_note: s.note,
                })
                .collect(),
        }
    }

    /// Build the `route` replay frame (§4.8 "Join-time replay"): only
    /// routes whose file carries the active suffix are included (§3 Route
    /// invariant).
    pub async fn build_route_frame(&self) -> OutboundFrame {
        let route_ids = self.store.load_active_route_ids().await.unwrap_or_default();
        let mut routes = Vec::with_capacity(route_ids.len());
        for id in route_ids {
            match self.routes.load_active(id).await {
                Ok(path) => routes.push(RouteFrameEntry { id, path }),
                Err(e) => {
                    tracing::warn!(route_id = id, error = %e, "active route row has no matching file");
                }
            }
        }
        OutboundFrame::Route { routes }
    }

    /// Idempotent session teardown shared by the reader loop (read error or
    /// clean close) and by write-failure paths in the router/broadcaster
    /// (§4.1 "A write failure marks the session dead and triggers
    /// cleanup", §4.9). Unregisters the session, unbinds every external id
    /// it claimed, and removes any Driver/Passenger presence it owned —
    /// closing the matching shift row so Invariant 2 (§8) keeps holding.
    pub async fn cleanup_session(&self, session: &Arc<SessionHandle>) {
        session.mark_closed().await;
        self.registry.unregister(session.id).await;

        let bound_ids = session.bound_ids.read().await.clone();
        let bound_vehicle_id = bound_ids.iter().find_map(|b| match b {
            BoundId::Vehicle(id) => Some(id.clone()),
            _ => None,
        });

        for bound in &bound_ids {
            match bound {
                BoundId::Driver(id) => {
                    self.addresses.unbind_if(id, session.id).await;
                    if let Ok(presence) = self.drivers.delete(id).await {
                        // `driver_gps` records the vehicle id on the presence
                        // itself (the common case: telemetry rides the same
                        // session as `connections`, with no separate
                        // `car_conn` frame, per S1/S5). Fall back to a
                        // same-session `car_conn` binding if the driver
                        // never reported a position before disconnecting.
                        let vehicle_id = presence.vehicle_id.or_else(|| bound_vehicle_id.clone());
                        if let Some(vehicle_id) = vehicle_id {
                            let end_time_ms = std::time::SystemTime::now()
                                .duration_since(std::time::UNIX_EPOCH)
                                .map(|d| d.as_millis() as u64)
                                .unwrap_or(0);
                            if let Err(e) =
                                self.store.close_shift(id, &vehicle_id, end_time_ms).await
                            {
                                tracing::warn!(driver_id = %id, error = %e, "auto-close-shift on session loss failed");
                            }
                        }
                    }
                }
                BoundId::Passenger(id) => {
                    self.addresses.unbind_if(id, session.id).await;
                    self.passengers.delete(id).await;
                }
                BoundId::Vehicle(id) => {
                    self.addresses.unbind_if(id, session.id).await;
                }
            }
        }
    }
}

/// Run the server until `cancel` fires (§4.11 "Graceful shutdown").
pub async fn run(config: ServerConfig, cancel: CancellationToken) -> anyhow::Result<()> {
    let store: Arc<dyn FleetStore> = Arc::new(InMemoryFleetStore::new());
    let state = Arc::new(AppState::new(store, config.assets_dir.clone()));

    broadcaster::spawn(Arc::clone(&state), config.broadcast_interval(), cancel.clone());

    let app = transport::build_router(Arc::clone(&state));
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "fleet-core listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;

    Ok(())
}
