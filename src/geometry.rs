// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Geometry Persistence (§4.8): route polylines live on disk as
//! `route<ID>.<suffix>` files next to the relational `{id, active}` row
//! owned by [`crate::store::FleetStore`]. Suffixes are an implementer's
//! choice (§9 open question 4); this crate uses `active` / `retired`.

use std::path::{Path, PathBuf};

use tokio::fs;

pub const ACTIVE_SUFFIX: &str = "active";
pub const RETIRED_SUFFIX: &str = "retired";

fn active_path(assets_dir: &Path, route_id: i64) -> PathBuf {
    assets_dir.join(format!("route{route_id}.{ACTIVE_SUFFIX}"))
}

fn retired_path(assets_dir: &Path, route_id: i64) -> PathBuf {
    assets_dir.join(format!("route{route_id}.{RETIRED_SUFFIX}"))
}

/// Outcome of a retirement attempt, distinguishing the already-retired case
/// so the caller can log a soft warning without treating it as an error
/// (§4.8 "Route retirement").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetireOutcome {
    Retired,
    AlreadyRetired,
}

/// File-backed store for route polylines under `assets_dir`.
pub struct RouteFiles {
    assets_dir: PathBuf,
}

impl RouteFiles {
    pub fn new(assets_dir: PathBuf) -> Self {
        Self { assets_dir }
    }

    /// Replace the polyline for `route_id`, fully overwriting any prior
    /// content (§4.8 "Routes": "fully replacing any prior polyline").
    /// Also un-retires the file: a route edited after retirement becomes
    /// active again, matching `upsert_route(id, active=true)` on the
    /// relational side.
    pub async fn write_active(&self, route_id: i64, path: &[(f64, f64)]) -> std::io::Result<()> {
        fs::create_dir_all(&self.assets_dir).await?;
        let body = serde_json::to_vec(path).unwrap_or_default();
        fs::write(active_path(&self.assets_dir, route_id), body).await?;
        let _ = fs::remove_file(retired_path(&self.assets_dir, route_id)).await;
        Ok(())
    }

    /// Rename the active file to the retired suffix. If already retired,
    /// reports that rather than erroring — the caller still reconciles the
    /// relational row (§4.8).
    pub async fn retire(&self, route_id: i64) -> std::io::Result<RetireOutcome> {
        let active = active_path(&self.assets_dir, route_id);
        let retired = retired_path(&self.assets_dir, route_id);
        match fs::rename(&active, &retired).await {
            Ok(()) => Ok(RetireOutcome::Retired),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if fs::try_exists(&retired).await.unwrap_or(false) {
                    Ok(RetireOutcome::AlreadyRetired)
                } else {
                    Err(e)
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Load the polyline for one active route id, for join-time replay.
    pub async fn load_active(&self, route_id: i64) -> std::io::Result<Vec<(f64, f64)>> {
        let bytes = fs::read(active_path(&self.assets_dir, route_id)).await?;
        Ok(serde_json::from_slice(&bytes).unwrap_or_default())
    }
}
