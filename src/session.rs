// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A live full-duplex client session (§3, §4.1, §4.9 of the spec).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use tokio::sync::{Mutex, RwLock};

/// The declared role of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientClass {
    Driver,
    Passenger,
    Admin,
}

/// An external id a session has claimed via a self-identification frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundId {
    Driver(String),
    Passenger(String),
    Vehicle(String),
}

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// One live duplex channel. Owns its transport exclusively; the Client
/// Registry and Addressable Index hold non-owning `Arc` references that are
/// invalidated lazily via `closed` once a write fails (§3 Ownership, §9
/// "Cyclic references").
pub struct SessionHandle {
    pub id: u64,
    pub class: ClientClass,
    /// Writes are serialized per session (§4.1): only one writer may emit a
    /// frame at a time. `None` once the transport has been torn down.
    sink: Mutex<Option<SplitSink<WebSocket, Message>>>,
    closed: AtomicBool,
    /// External ids bound to this session, used to auto-delete presence on
    /// close (§4.9, §9 open question 2 — resolved to auto-delete).
    pub bound_ids: RwLock<Vec<BoundId>>,
}

impl SessionHandle {
    pub fn new(class: ClientClass, sink: SplitSink<WebSocket, Message>) -> Arc<Self> {
        let id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
        Arc::new(Self {
            id,
            class,
            sink: Mutex::new(Some(sink)),
            closed: AtomicBool::new(false),
            bound_ids: RwLock::new(Vec::new()),
        })
    }

    /// Send one JSON text frame. Acquires the per-session write lock for the
    /// duration of the send, so a concurrent Broadcaster tick and Router
    /// forward to the same session are strictly ordered (§4.1, §5, invariant
    /// 1, scenario S6).
    ///
    /// On failure the session transitions toward Closing: the sink is
    /// dropped and further sends fail fast without touching the network
    /// again (§4.9).
    pub async fn send(&self, text: String) -> Result<(), ()> {
        let mut guard = self.sink.lock().await;
        let Some(sink) = guard.as_mut() else {
            return Err(());
        };
        if sink.send(Message::Text(text.into())).await.is_err() {
            *guard = None;
            self.closed.store(true, Ordering::Release);
            return Err(());
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Mark Closing without another send attempt (e.g. on read error).
    pub async fn mark_closed(&self) {
        self.closed.store(true, Ordering::Release);
        *self.sink.lock().await = None;
    }

    pub async fn record_bound_id(&self, bound: BoundId) {
        self.bound_ids.write().await.push(bound);
    }
}
