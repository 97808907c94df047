// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Driver State Store (§4.4, §4.10): ordered `driver_id -> Driver Presence`,
//! mutated by inbound GPS events and queried by the Broadcaster.

use indexmap::IndexMap;
use tokio::sync::Mutex;

/// A GPS position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

/// `Driver Presence` (§3): present only while the driver is on-shift.
#[derive(Debug, Clone, Default)]
pub struct DriverPresence {
    pub vehicle_id: Option<String>,
    pub position: Option<Position>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverStoreError {
    Duplicate,
    NotFound,
    EmptyId,
}

impl std::fmt::Display for DriverStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Duplicate => f.write_str("driver already exists"),
            Self::NotFound => f.write_str("driver not found"),
            Self::EmptyId => f.write_str("driver id cannot be empty"),
        }
    }
}

impl std::error::Error for DriverStoreError {}

/// Single mutex around the whole store (§4.4): contention is low because the
/// update rate is bounded by driver count × reporting rate, and no holder
/// performs I/O while holding (§5).
#[derive(Default)]
pub struct DriverStore {
    drivers: Mutex<IndexMap<String, DriverPresence>>,
}

impl DriverStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absent -> Present(no position).
    pub async fn create(&self, driver_id: &str) -> Result<(), DriverStoreError> {
        if driver_id.is_empty() {
            return Err(DriverStoreError::EmptyId);
        }
        let mut drivers = self.drivers.lock().await;
        if drivers.contains_key(driver_id) {
            return Err(DriverStoreError::Duplicate);
        }
        drivers.insert(driver_id.to_owned(), DriverPresence::default());
        Ok(())
    }

    /// Valid only in Present; overwrites last-known position.
    pub async fn update(
        &self,
        driver_id: &str,
        latitude: f64,
        longitude: f64,
        vehicle_id: &str,
    ) -> Result<(), DriverStoreError> {
        let mut drivers = self.drivers.lock().await;
        let Some(presence) = drivers.get_mut(driver_id) else {
            return Err(DriverStoreError::NotFound);
        };
        presence.position = Some(Position { latitude, longitude });
        presence.vehicle_id = Some(vehicle_id.to_owned());
        Ok(())
    }

    /// Present -> Absent. Returns the removed presence so callers that need
    /// its last-known `vehicle_id` (e.g. auto-closing a shift on session
    /// loss) don't have to read it back beforehand.
    pub async fn delete(&self, driver_id: &str) -> Result<DriverPresence, DriverStoreError> {
        let mut drivers = self.drivers.lock().await;
        drivers.shift_remove(driver_id).ok_or(DriverStoreError::NotFound)
    }

    /// Returns a consistent copy of all presences at call time, atomic with
    /// respect to create/update/delete (§4.4).
    pub async fn snapshot(&self) -> Vec<(String, DriverPresence)> {
        self.drivers
            .lock()
            .await
            .iter()
            .map(|(id, presence)| (id.clone(), presence.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_rejects_duplicate_without_touching_position() -> anyhow::Result<()> {
        let store = DriverStore::new();
        store.create("7").await?;
        store.update("7", 1.0, 2.0, "car").await?;

        let result = store.create("7").await;
        assert!(matches!(result, Err(DriverStoreError::Duplicate)));

        let snap = store.snapshot().await;
        let (_, presence) =
            snap.iter().find(|(id, _)| id == "7").ok_or_else(|| anyhow::anyhow!("driver 7 missing"))?;
        assert_eq!(presence.position, Some(Position { latitude: 1.0, longitude: 2.0 }));
        Ok(())
    }

    #[tokio::test]
    async fn update_on_absent_driver_is_not_found() {
        let store = DriverStore::new();
        let result = store.update("ghost", 0.0, 0.0, "car").await;
        assert!(matches!(result, Err(DriverStoreError::NotFound)));
        assert!(store.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn snapshot_empty_when_no_drivers() {
        let store = DriverStore::new();
        assert!(store.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn delete_then_create_yields_fresh_presence() -> anyhow::Result<()> {
        let store = DriverStore::new();
        store.create("7").await?;
        store.update("7", 1.0, 2.0, "car").await?;
        store.delete("7").await?;
        store.create("7").await?;

        let snap = store.snapshot().await;
        let (_, presence) =
            snap.iter().find(|(id, _)| id == "7").ok_or_else(|| anyhow::anyhow!("driver 7 missing"))?;
        assert_eq!(presence.position, None);
        Ok(())
    }

    #[tokio::test]
    async fn create_rejects_empty_id() {
        let store = DriverStore::new();
        assert!(matches!(store.create("").await, Err(DriverStoreError::EmptyId)));
    }
}
