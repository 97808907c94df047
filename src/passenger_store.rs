// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Passenger Presence (§3): `passenger_id -> {}` set semantics, used only to
//! reject duplicate registration. Same lifecycle rules as Driver Presence,
//! guarded by its own mutex.

use std::collections::HashSet;

use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassengerStoreError {
    Duplicate,
}

impl std::fmt::Display for PassengerStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("passenger already registered")
    }
}

impl std::error::Error for PassengerStoreError {}

#[derive(Default)]
pub struct PassengerStore {
    passengers: Mutex<HashSet<String>>,
}

impl PassengerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, passenger_id: &str) -> Result<(), PassengerStoreError> {
        let mut passengers = self.passengers.lock().await;
        if !passengers.insert(passenger_id.to_owned()) {
            return Err(PassengerStoreError::Duplicate);
        }
        Ok(())
    }

    /// Idempotent: deleting an absent passenger is a no-op, mirroring the
    /// auto-delete-on-close path where we don't know in advance whether the
    /// session ever registered successfully.
    pub async fn delete(&self, passenger_id: &str) {
        self.passengers.lock().await.remove(passenger_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_registration_is_rejected() -> anyhow::Result<()> {
        let store = PassengerStore::new();
        store.create("p-42").await?;
        assert!(matches!(store.create("p-42").await, Err(PassengerStoreError::Duplicate)));
        Ok(())
    }

    #[tokio::test]
    async fn delete_then_create_succeeds() -> anyhow::Result<()> {
        let store = PassengerStore::new();
        store.create("p-42").await?;
        store.delete("p-42").await;
        store.create("p-42").await?;
        Ok(())
    }
}
