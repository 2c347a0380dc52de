//! # Surface Host
//!
//! Owns the registry, transport, correlator and router for one process and
//! exposes the lifecycle hooks the windowing layer calls.
//!
//! ## Shutdown Order
//!
//! 1. Stop the status ticker
//! 2. Cancel every pending request with the shutdown reason
//! 3. Unregister and detach every surface (closes their inboxes)

use crate::config::{BusConfig, ConfigError};
use crate::correlator::Correlator;
use crate::endpoint::SurfaceEndpoint;
use crate::registry::{RegistryError, SurfaceRegistry};
use crate::router::Router;
use crate::transport::{ChannelTransport, SurfaceHandle, SurfaceKind};
use crate::STATUS_CHANNEL;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;
use shared_types::SurfaceId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::AbortHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Host errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("Invalid bus configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Host is shut down")]
    ShutDown,
}

/// Point-in-time view of the bus, for metrics and diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusSnapshot {
    pub live_surfaces: Vec<SurfaceId>,
    pub pending_requests: usize,
    pub active_timers: usize,
    pub delivered: u64,
    pub failed_deliveries: u64,
    pub broadcasts: u64,
    pub dropped_inbound: u64,
    pub requests_issued: u64,
    pub requests_resolved: u64,
    pub requests_rejected: u64,
    pub requests_timed_out: u64,
    pub requests_cancelled: u64,
    pub unmatched_responses: u64,
}

/// The coordinating side of the mesh.
///
/// Built once at startup and shared by `Arc`.
pub struct SurfaceHost {
    config: BusConfig,
    transport: Arc<ChannelTransport>,
    router: Arc<Router>,
    status_task: Mutex<Option<AbortHandle>>,
    shut_down: AtomicBool,
}

impl SurfaceHost {
    /// Create a host with validated configuration.
    pub fn new(config: BusConfig) -> Result<Self, HostError> {
        config.validate()?;

        let transport = Arc::new(ChannelTransport::new());
        let router = Arc::new(Router::new(
            Arc::new(SurfaceRegistry::new()),
            transport.clone(),
            Arc::new(Correlator::new(config.request_timeout())),
        ));

        info!(
            request_timeout_ms = config.request_timeout_ms,
            status_interval_ms = ?config.status_interval_ms,
            reject_unhandled = config.reject_unhandled_requests,
            "Surface host created"
        );

        Ok(Self {
            config,
            transport,
            router,
            status_task: Mutex::new(None),
            shut_down: AtomicBool::new(false),
        })
    }

    /// Lifecycle hook: a surface came up with `handle`.
    ///
    /// A previous handle bound to the same identity is detached from the
    /// transport.
    pub fn on_surface_created(
        &self,
        id: SurfaceId,
        handle: SurfaceHandle,
    ) -> Result<(), HostError> {
        if self.is_shut_down() {
            return Err(HostError::ShutDown);
        }

        let previous = self.router.registry().register(id, handle)?;
        if let Some(old) = previous.filter(|old| old.id() != handle.id()) {
            self.transport.detach(&old);
        }
        Ok(())
    }

    /// Lifecycle hook: the surface behind `id` was destroyed.
    pub fn on_surface_destroyed(&self, id: SurfaceId) -> bool {
        match self.router.registry().unregister(id) {
            Some(handle) => {
                self.transport.detach(&handle);
                true
            }
            None => false,
        }
    }

    /// Attach, register and start the pump for a new surface instance.
    ///
    /// Re-opening a live identity replaces the old instance; its inbox
    /// closes and its endpoint stops receiving.
    pub fn open_surface(
        &self,
        id: SurfaceId,
        kind: SurfaceKind,
    ) -> Result<SurfaceEndpoint, HostError> {
        let (handle, inbox) = self.transport.attach(kind);

        if let Err(err) = self.on_surface_created(id, handle) {
            self.transport.detach(&handle);
            warn!(surface = %id, error = %err, "Failed to open surface");
            return Err(err);
        }

        Ok(SurfaceEndpoint::new(
            id,
            Arc::clone(&self.router),
            inbox,
            self.config.reject_unhandled_requests,
        ))
    }

    /// Destroy the surface behind `id`.
    pub fn close_surface(&self, id: SurfaceId) -> bool {
        self.on_surface_destroyed(id)
    }

    /// Start the periodic `app-status` broadcast if an interval is configured.
    ///
    /// Ticks with no live surface are skipped. Returns whether a ticker is
    /// running after the call.
    pub fn start_status_broadcast(&self) -> bool {
        let Some(period) = self.config.status_interval() else {
            return false;
        };
        if self.is_shut_down() {
            return false;
        }

        let mut slot = self.status_task.lock();
        if slot.is_some() {
            return true;
        }

        let router = Arc::clone(&self.router);
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let active = router.registry().live_ids();
                if active.is_empty() {
                    continue;
                }
                let count = active.len();
                let payload = json!({
                    "timestamp": chrono::Utc::now().timestamp_millis(),
                    "activeSurfaces": active,
                });
                let delivered = router.broadcast_all(STATUS_CHANNEL, payload);
                debug!(active_surfaces = count, delivered = delivered, "Status broadcast");
            }
        });

        *slot = Some(task.abort_handle());
        info!(interval_ms = period.as_millis() as u64, "Status broadcast started");
        true
    }

    /// Tear the mesh down.
    ///
    /// Every pending request is rejected with `reason`. Idempotent; returns
    /// the number of requests cancelled by this call.
    pub fn shutdown(&self, reason: &str) -> usize {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return 0;
        }

        if let Some(task) = self.status_task.lock().take() {
            task.abort();
        }

        let cancelled = self.router.correlator().cancel_all(reason);

        let surfaces = self.router.registry().drain();
        for (_, handle) in &surfaces {
            self.transport.detach(handle);
        }

        info!(
            reason = reason,
            cancelled_requests = cancelled,
            closed_surfaces = surfaces.len(),
            "Surface host shut down"
        );
        cancelled
    }

    /// Whether `shutdown` has run.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Capture counters and gauges.
    pub fn snapshot(&self) -> BusSnapshot {
        let router = self.router.stats();
        let correlator = self.router.correlator();
        let requests = correlator.stats();

        BusSnapshot {
            live_surfaces: self.router.registry().live_ids(),
            pending_requests: correlator.pending_count(),
            active_timers: correlator.active_timers(),
            delivered: router.delivered.load(Ordering::Relaxed),
            failed_deliveries: router.failed.load(Ordering::Relaxed),
            broadcasts: router.broadcasts.load(Ordering::Relaxed),
            dropped_inbound: router.dropped.load(Ordering::Relaxed),
            requests_issued: requests.issued.load(Ordering::Relaxed),
            requests_resolved: requests.resolved.load(Ordering::Relaxed),
            requests_rejected: requests.rejected.load(Ordering::Relaxed),
            requests_timed_out: requests.timed_out.load(Ordering::Relaxed),
            requests_cancelled: requests.cancelled.load(Ordering::Relaxed),
            unmatched_responses: requests.unmatched.load(Ordering::Relaxed),
        }
    }

    /// The router shared by every endpoint.
    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// The in-process transport.
    pub fn transport(&self) -> &Arc<ChannelTransport> {
        &self.transport
    }

    /// Active configuration.
    pub fn config(&self) -> &BusConfig {
        &self.config
    }
}

impl Drop for SurfaceHost {
    fn drop(&mut self) {
        if let Some(task) = self.status_task.lock().take() {
            task.abort();
        }
    }
}
