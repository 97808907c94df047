// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

/// Configuration for the fleet coordination server.
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "fleet-core", about = "Real-time fleet coordination core")]
pub struct ServerConfig {
    /// Host to bind on.
    #[arg(long, default_value = "0.0.0.0", env = "FLEET_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8080, env = "FLEET_PORT")]
    pub port: u16,

    /// Broadcast interval in milliseconds for the driver-position tick.
    #[arg(long, default_value_t = 2000, env = "FLEET_BROADCAST_MS")]
    pub broadcast_ms: u64,

    /// Directory holding `route<ID>.<suffix>` polyline files.
    #[arg(long, default_value = "./assets", env = "FLEET_ASSETS_DIR")]
    pub assets_dir: PathBuf,
}

impl ServerConfig {
    pub fn broadcast_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.broadcast_ms)
    }
}
