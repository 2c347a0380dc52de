//! Prometheus metrics for the surface mesh.
//!
//! All metrics follow the naming convention: `mesh_<component>_<metric>`
//!
//! The bus keeps its own atomic counters; these gauges mirror them and are
//! refreshed from a `BusSnapshot` by the host runtime.

use lazy_static::lazy_static;
use prometheus::{Encoder, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};
use shared_bus::BusSnapshot;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // REGISTRY METRICS
    // =========================================================================

    /// Live surfaces
    pub static ref LIVE_SURFACES: IntGauge = IntGauge::new(
        "mesh_registry_live_surfaces",
        "Number of registered surfaces with a live handle"
    ).expect("metric creation failed");

    // =========================================================================
    // ROUTER METRICS
    // =========================================================================

    /// Router delivery counts by outcome
    pub static ref ROUTER_DELIVERIES: IntGaugeVec = IntGaugeVec::new(
        Opts::new("mesh_router_deliveries", "Envelope deliveries since start"),
        &["outcome"]  // outcome: delivered/failed/dropped
    ).expect("metric creation failed");

    /// Broadcasts routed
    pub static ref ROUTER_BROADCASTS: IntGauge = IntGauge::new(
        "mesh_router_broadcasts",
        "Broadcasts routed since start"
    ).expect("metric creation failed");

    // =========================================================================
    // CORRELATOR METRICS
    // =========================================================================

    /// Requests awaiting settlement
    pub static ref PENDING_REQUESTS: IntGauge = IntGauge::new(
        "mesh_correlator_pending_requests",
        "Requests awaiting a response"
    ).expect("metric creation failed");

    /// Armed timeout timers
    pub static ref ACTIVE_TIMERS: IntGauge = IntGauge::new(
        "mesh_correlator_active_timers",
        "Request timeout timers currently armed"
    ).expect("metric creation failed");

    /// Requests by outcome
    pub static ref REQUESTS: IntGaugeVec = IntGaugeVec::new(
        Opts::new("mesh_correlator_requests", "Requests since start"),
        &["outcome"]  // outcome: issued/resolved/rejected/timed_out/cancelled/unmatched
    ).expect("metric creation failed");
}

/// Proof that metrics were registered.
pub struct MetricsHandle {
    _private: (),
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(LIVE_SURFACES.clone()),
        Box::new(ROUTER_DELIVERIES.clone()),
        Box::new(ROUTER_BROADCASTS.clone()),
        Box::new(PENDING_REQUESTS.clone()),
        Box::new(ACTIVE_TIMERS.clone()),
        Box::new(REQUESTS.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle { _private: () })
}

fn to_i64<T: TryInto<i64>>(value: T) -> i64 {
    value.try_into().unwrap_or(i64::MAX)
}

/// Refresh every gauge from a bus snapshot.
pub fn record_snapshot(snapshot: &BusSnapshot) {
    LIVE_SURFACES.set(to_i64(snapshot.live_surfaces.len()));
    PENDING_REQUESTS.set(to_i64(snapshot.pending_requests));
    ACTIVE_TIMERS.set(to_i64(snapshot.active_timers));
    ROUTER_BROADCASTS.set(to_i64(snapshot.broadcasts));

    for (outcome, value) in [
        ("delivered", snapshot.delivered),
        ("failed", snapshot.failed_deliveries),
        ("dropped", snapshot.dropped_inbound),
    ] {
        ROUTER_DELIVERIES.with_label_values(&[outcome]).set(to_i64(value));
    }

    for (outcome, value) in [
        ("issued", snapshot.requests_issued),
        ("resolved", snapshot.requests_resolved),
        ("rejected", snapshot.requests_rejected),
        ("timed_out", snapshot.requests_timed_out),
        ("cancelled", snapshot.requests_cancelled),
        ("unmatched", snapshot.unmatched_responses),
    ] {
        REQUESTS.with_label_values(&[outcome]).set(to_i64(value));
    }
}

/// Encode all metrics as Prometheus text format.
pub fn gather_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
