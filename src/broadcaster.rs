// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Broadcaster (§4.5): a dedicated periodic task that snapshots the Driver
//! State Store and fans a `driver_positions` frame out to every registered
//! session. Grounded in the screen/status pollers' interval + cancellation
//! pattern.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::frame::{DriverPositionEntry, LatLon, OutboundFrame};
use crate::AppState;

/// Spawn the broadcaster as a background task. Stops cleanly when `cancel`
/// fires (§4.11).
pub fn spawn(state: Arc<AppState>, interval: Duration, cancel: CancellationToken) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            tick(&state).await;
        }
    });
}

/// One broadcast tick (§4.5 steps 1-5).
async fn tick(state: &AppState) {
    let snapshot = state.drivers.snapshot().await;
    if snapshot.is_empty() {
        return;
    }

    let positions: Vec<DriverPositionEntry> = snapshot
        .into_iter()
        .filter_map(|(driver_id, presence)| {
            presence.position.map(|p| {
                DriverPositionEntry::new(
                    driver_id,
                    LatLon { latitude: p.latitude, longitude: p.longitude },
                )
            })
        })
        .collect();
    if positions.is_empty() {
        return;
    }

    let text = OutboundFrame::DriverPositions { positions }.to_text();

    state
        .registry
        .for_each(None, |session| {
            let text = text.clone();
            async move {
                if session.send(text).await.is_err() {
                    state.cleanup_session(&session).await;
                }
            }
        })
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver_store::Position;

    #[tokio::test]
    async fn tick_with_no_drivers_emits_nothing() {
        let state = crate::AppState::new_in_memory_for_tests();
        // No observable assertion beyond "does not panic": snapshot() is
        // empty so the tick returns before touching the registry.
        tick(&state).await;
    }

    #[tokio::test]
    async fn tick_skips_drivers_without_a_reported_position() -> anyhow::Result<()> {
        let state = crate::AppState::new_in_memory_for_tests();
        state.drivers.create("7").await?;
        // Present but no position yet: still skipped (§4.10 Present(no position)).
        tick(&state).await;
        Ok(())
    }

    #[tokio::test]
    async fn tick_builds_one_entry_per_positioned_driver() -> anyhow::Result<()> {
        let state = crate::AppState::new_in_memory_for_tests();
        state.drivers.create("7").await?;
        state.drivers.update("7", 22.5, 113.9, "car-1").await?;
        let snapshot = state.drivers.snapshot().await;
        let (id, presence) =
            snapshot.into_iter().next().ok_or_else(|| anyhow::anyhow!("snapshot empty"))?;
        assert_eq!(id, "7");
        assert_eq!(presence.position, Some(Position { latitude: 22.5, longitude: 113.9 }));
        Ok(())
    }
}
