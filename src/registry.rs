// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client Registry (§4.2) and Addressable Index (§4.3).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::session::{ClientClass, SessionHandle};

/// Tracks every active session and its declared client class.
///
/// Invariant: a session present in the registry always has a live transport
/// or has not yet transitioned to Closing (§4.2).
#[derive(Default)]
pub struct ClientRegistry {
    sessions: RwLock<HashMap<u64, Arc<SessionHandle>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, session: Arc<SessionHandle>) {
        self.sessions.write().await.insert(session.id, session);
    }

    /// Idempotent.
    pub async fn unregister(&self, session_id: u64) {
        self.sessions.write().await.remove(&session_id);
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Snapshot the matching sessions and apply `f` to each, awaiting one
    /// before starting the next. Iteration tolerates concurrent
    /// unregistration of the current element because it operates on cloned
    /// `Arc` handles, not live map entries (§4.2).
    pub async fn for_each<F, Fut>(&self, class_filter: Option<ClientClass>, mut f: F)
    where
        F: FnMut(Arc<SessionHandle>) -> Fut,
        Fut: std::future::Future<Output = ()>,
    {
        let snapshot: Vec<Arc<SessionHandle>> = {
            let guard = self.sessions.read().await;
            guard
                .values()
                .filter(|s| class_filter.is_none_or(|c| s.class == c))
                .cloned()
                .collect()
        };
        for session in snapshot {
            f(session).await;
        }
    }
}

/// Maps external ids (driver_id, car_id, passenger_id) to one session each
/// for point-to-point routing (§4.3).
#[derive(Default)]
pub struct AddressIndex {
    index: RwLock<HashMap<String, Arc<SessionHandle>>>,
}

impl AddressIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites any prior mapping for the same id (last-writer-wins: a
    /// duplicate id means the prior session was stale, §4.3).
    pub async fn bind(&self, external_id: String, session: Arc<SessionHandle>) {
        self.index.write().await.insert(external_id, session);
    }

    pub async fn lookup(&self, external_id: &str) -> Option<Arc<SessionHandle>> {
        self.index.read().await.get(external_id).cloned()
    }

    /// Remove a stale entry after a failed delivery (§4.3: "no explicit
    /// unbind: stale entries are removed when a send_to(id) fails to
    /// write"). Only removes if it still points at the same session, so a
    /// newer bind racing in isn't clobbered.
    pub async fn unbind_if(&self, external_id: &str, session_id: u64) {
        let mut guard = self.index.write().await;
        if guard.get(external_id).map(|s| s.id) == Some(session_id) {
            guard.remove(external_id);
        }
    }
}
