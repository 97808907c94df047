// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Abstract relational store (§6): the operations the Shift Lifecycle and
//! Geometry Persistence components reach through. The live core only
//! depends on this trait; a production deployment backs it with a real
//! database without touching session/router/broadcaster code.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::StoreError;

/// `Site` (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteRecord {
    pub id: i64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub waiting_count: u32,
    pub active: bool,
    pub note: String,
}

/// Relational row for `Route` (§3); the polyline itself lives on disk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteRow {
    pub id: i64,
    pub active: bool,
}

/// Open or closed `Shift Record` (§3).
#[derive(Debug, Clone, PartialEq)]
pub struct ShiftRecord {
    pub driver_id: String,
    pub vehicle_id: String,
    pub route_id: i64,
    pub start_time_ms: u64,
    pub end_time_ms: Option<u64>,
    pub remark: Option<String>,
}

/// The abstract store boundary named in spec §6: `update_vehicle_status`,
/// `set_driver_working`, `open_shift`, `close_shift`, `upsert_site`,
/// `upsert_route`, `retire_route`, `load_active_sites`.
#[async_trait]
pub trait FleetStore: Send + Sync {
    async fn update_vehicle_status(&self, vehicle_id: &str, code: u8) -> Result<(), StoreError>;
    async fn set_driver_working(&self, driver_id: &str, working: bool) -> Result<(), StoreError>;
    async fn open_shift(
        &self,
        driver_id: &str,
        vehicle_id: &str,
        route_id: i64,
        start_time_ms: u64,
        remark: Option<String>,
    ) -> Result<(), StoreError>;
    async fn close_shift(
        &self,
        driver_id: &str,
        vehicle_id: &str,
        end_time_ms: u64,
    ) -> Result<(), StoreError>;
    async fn upsert_site(&self, site: SiteRecord) -> Result<(), StoreError>;
    async fn upsert_route(&self, route_id: i64, active: bool) -> Result<(), StoreError>;
    async fn retire_route(&self, route_id: i64) -> Result<(), StoreError>;
    async fn load_active_sites(&self) -> Result<Vec<SiteRecord>, StoreError>;
    /// Not named in §6's operation list but required by Geometry Persistence
    /// (§4.8) to decide which route ids to replay; an in-memory stand-in for
    /// "list rows where active = true".
    async fn load_active_route_ids(&self) -> Result<Vec<i64>, StoreError>;
}

/// Encode the three vehicle-status tags from §4.7 step 2.
pub fn vehicle_status_code(tag: &str) -> Option<u8> {
    match tag {
        "正常运营" => Some(1),
        "试通行" => Some(2),
        "休息" => Some(3),
        _ => None,
    }
}

#[derive(Default)]
struct Inner {
    vehicle_status: HashMap<String, u8>,
    driver_working: HashMap<String, bool>,
    /// Shift rows keyed by (driver_id, vehicle_id); at most one open per key
    /// (§3 invariant), but history is kept for idempotence checks in tests.
    shifts: HashMap<(String, String), Vec<ShiftRecord>>,
    sites: HashMap<i64, SiteRecord>,
    routes: HashMap<i64, RouteRow>,
}

/// In-process `FleetStore` good enough to exercise the live core end to end
/// (DESIGN.md Open Question 1). Guarded by a single `RwLock`; callers never
/// hold it across I/O because there is none to hold it across.
#[derive(Default)]
pub struct InMemoryFleetStore {
    inner: RwLock<Inner>,
}

impl InMemoryFleetStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FleetStore for InMemoryFleetStore {
    async fn update_vehicle_status(&self, vehicle_id: &str, code: u8) -> Result<(), StoreError> {
        self.inner.write().await.vehicle_status.insert(vehicle_id.to_owned(), code);
        Ok(())
    }

    async fn set_driver_working(&self, driver_id: &str, working: bool) -> Result<(), StoreError> {
        self.inner.write().await.driver_working.insert(driver_id.to_owned(), working);
        Ok(())
    }

    async fn open_shift(
        &self,
        driver_id: &str,
        vehicle_id: &str,
        route_id: i64,
        start_time_ms: u64,
        remark: Option<String>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let key = (driver_id.to_owned(), vehicle_id.to_owned());
        if inner.shifts.get(&key).is_some_and(|rows| rows.last().is_some_and(|r| r.end_time_ms.is_none()))
        {
            return Err(StoreError::new(format!(
                "shift already open for driver {driver_id} / vehicle {vehicle_id}"
            )));
        }
        inner.shifts.entry(key).or_default().push(ShiftRecord {
            driver_id: driver_id.to_owned(),
            vehicle_id: vehicle_id.to_owned(),
            route_id,
            start_time_ms,
            end_time_ms: None,
            remark,
        });
        Ok(())
    }

    async fn close_shift(
        &self,
        driver_id: &str,
        vehicle_id: &str,
        end_time_ms: u64,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let key = (driver_id.to_owned(), vehicle_id.to_owned());
        let Some(rows) = inner.shifts.get_mut(&key) else {
            return Err(StoreError::new(format!(
                "no open shift for driver {driver_id} / vehicle {vehicle_id}"
            )));
        };
        let Some(open) = rows.last_mut().filter(|r| r.end_time_ms.is_none()) else {
            return Err(StoreError::new(format!(
                "no open shift for driver {driver_id} / vehicle {vehicle_id}"
            )));
        };
        open.end_time_ms = Some(end_time_ms);
        Ok(())
    }

    async fn upsert_site(&self, site: SiteRecord) -> Result<(), StoreError> {
        self.inner.write().await.sites.insert(site.id, site);
        Ok(())
    }

    async fn upsert_route(&self, route_id: i64, active: bool) -> Result<(), StoreError> {
        self.inner.write().await.routes.insert(route_id, RouteRow { id: route_id, active });
        Ok(())
    }

    async fn retire_route(&self, route_id: i64) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.routes.entry(route_id).or_insert(RouteRow { id: route_id, active: true }).active =
            false;
        Ok(())
    }

    async fn load_active_sites(&self) -> Result<Vec<SiteRecord>, StoreError> {
        Ok(self.inner.read().await.sites.values().filter(|s| s.active).cloned().collect())
    }

    async fn load_active_route_ids(&self) -> Result<Vec<i64>, StoreError> {
        Ok(self.inner.read().await.routes.values().filter(|r| r.active).map(|r| r.id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shift_start_end_start_yields_new_open_shift() -> anyhow::Result<()> {
        let store = InMemoryFleetStore::new();
        store.open_shift("7", "car-1", 1, 100, None).await?;
        store.close_shift("7", "car-1", 200).await?;
        store.open_shift("7", "car-1", 1, 300, Some("covering for Li".into())).await?;

        let inner = store.inner.read().await;
        let rows = &inner.shifts[&("7".to_owned(), "car-1".to_owned())];
        assert_eq!(rows.len(), 2);
        assert!(rows[1].end_time_ms.is_none());
        assert_eq!(rows[1].remark.as_deref(), Some("covering for Li"));
        Ok(())
    }

    #[tokio::test]
    async fn double_open_shift_is_rejected() -> anyhow::Result<()> {
        let store = InMemoryFleetStore::new();
        store.open_shift("7", "car-1", 1, 100, None).await?;
        assert!(store.open_shift("7", "car-1", 1, 150, None).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn update_sites_applied_twice_is_idempotent() -> anyhow::Result<()> {
        let store = InMemoryFleetStore::new();
        let site = SiteRecord {
            id: 1,
            name: "North Gate".into(),
            latitude: 22.0,
            longitude: 114.0,
            waiting_count: 3,
            active: true,
            note: String::new(),
        };
        store.upsert_site(site.clone()).await?;
        store.upsert_site(site.clone()).await?;
        let loaded = store.load_active_sites().await?;
        assert_eq!(loaded, vec![site]);
        Ok(())
    }

    #[tokio::test]
    async fn delete_route_is_idempotent() -> anyhow::Result<()> {
        let store = InMemoryFleetStore::new();
        store.upsert_route(5, true).await?;
        store.retire_route(5).await?;
        store.retire_route(5).await?;
        assert!(store.load_active_route_ids().await?.is_empty());
        Ok(())
    }

    #[test]
    fn vehicle_status_codes_match_spec_table() {
        assert_eq!(vehicle_status_code("正常运营"), Some(1));
        assert_eq!(vehicle_status_code("试通行"), Some(2));
        assert_eq!(vehicle_status_code("休息"), Some(3));
        assert_eq!(vehicle_status_code("unknown"), None);
    }
}
