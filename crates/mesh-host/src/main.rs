//! # Surface Mesh Host
//!
//! The coordinating process for the shell, content and settings surfaces.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (from env)
//! 2. Initialize logging and metrics
//! 3. Open the startup surfaces and install their handlers
//! 4. Run until Ctrl+C
//! 5. Reject every pending request and close all surfaces

use std::time::Duration;

use anyhow::{Context, Result};
use mesh_host::{load_config, MeshRuntime};
use mesh_telemetry::{gather_metrics, init_telemetry};
use shared_bus::SHUTDOWN_REASON;
use tracing::{debug, info, warn};

/// How often the metrics gauges are refreshed from the bus.
const METRICS_REFRESH: Duration = Duration::from_secs(15);

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config();
    let _telemetry =
        init_telemetry(config.telemetry.clone()).context("Failed to initialize telemetry")?;

    info!("===========================================");
    info!("  Surface Mesh Host v{}", env!("CARGO_PKG_VERSION"));
    info!("===========================================");

    let mut runtime = MeshRuntime::new(config)?;
    runtime.start()?;

    info!("Host is running. Press Ctrl+C to stop.");
    let mut refresh = tokio::time::interval(METRICS_REFRESH);
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl+C")?;
                break;
            }
            _ = refresh.tick() => {
                let snapshot = runtime.refresh_metrics();
                debug!(
                    live_surfaces = snapshot.live_surfaces.len(),
                    pending_requests = snapshot.pending_requests,
                    "Metrics refreshed"
                );
            }
        }
    }

    let cancelled = runtime.shutdown(SHUTDOWN_REASON);
    info!(cancelled_requests = cancelled, "Shutdown complete");

    match gather_metrics() {
        Ok(text) => debug!(metrics = %text, "Final metrics"),
        Err(e) => warn!(error = %e, "Failed to gather metrics"),
    }

    Ok(())
}
