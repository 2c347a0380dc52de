//! # Mesh Runtime
//!
//! Wires the three surfaces onto one `SurfaceHost`.
//!
//! ## Startup Sequence
//!
//! 1. Validate configuration and create the host
//! 2. Open the shell window
//! 3. Open content (embedded in the shell, or its own window)
//! 4. Open settings if the layout asks for it
//! 5. Start the status broadcast if configured

use crate::container::HostConfig;
use crate::handlers::{self, SettingsStore};
use anyhow::{Context, Result};
use mesh_telemetry::{log_surface_event, record_snapshot};
use serde_json::{json, Map};
use shared_bus::{BusSnapshot, Subscription, SurfaceEndpoint, SurfaceHost, SurfaceKind};
use shared_types::SurfaceId;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// An open surface and the subscriptions keeping its handlers installed.
struct OpenSurface {
    endpoint: SurfaceEndpoint,
    _subscriptions: Vec<Subscription>,
}

/// The host runtime.
pub struct MeshRuntime {
    config: HostConfig,
    host: Arc<SurfaceHost>,
    settings: Arc<SettingsStore>,
    surfaces: HashMap<SurfaceId, OpenSurface>,
}

impl MeshRuntime {
    /// Create the runtime. No surface is opened yet.
    pub fn new(config: HostConfig) -> Result<Self> {
        config.validate().context("Invalid host configuration")?;
        let host = SurfaceHost::new(config.bus.clone()).context("Failed to create surface host")?;

        let mut defaults = Map::new();
        defaults.insert("theme".into(), json!("light"));
        defaults.insert("notifications".into(), json!(true));

        Ok(Self {
            config,
            host: Arc::new(host),
            settings: Arc::new(SettingsStore::with_defaults(defaults)),
            surfaces: HashMap::new(),
        })
    }

    /// Open the startup surfaces and start the status broadcast.
    pub fn start(&mut self) -> Result<()> {
        self.open(SurfaceId::Shell)?;
        self.open(SurfaceId::Content)?;
        if self.config.layout.open_settings {
            self.open(SurfaceId::Settings)?;
        }

        let status = self.host.start_status_broadcast();
        info!(
            surfaces = self.surfaces.len(),
            status_broadcast = status,
            "Mesh runtime started"
        );
        Ok(())
    }

    /// Open (or re-open) a surface and install its handlers.
    pub fn open(&mut self, id: SurfaceId) -> Result<&SurfaceEndpoint> {
        let kind = self.kind_of(id);
        // Old handlers go before the new instance registers its own
        self.surfaces.remove(&id);

        let endpoint = self
            .host
            .open_surface(id, kind)
            .with_context(|| format!("Failed to open surface {id}"))?;

        let subscriptions = match id {
            SurfaceId::Shell => handlers::shell::install(&endpoint),
            SurfaceId::Content => handlers::content::install(&endpoint),
            SurfaceId::Settings => {
                handlers::settings::install(&endpoint, Arc::clone(&self.settings))
            }
            SurfaceId::Host => Vec::new(),
        };
        log_surface_event!(
            info,
            id,
            "Surface opened",
            kind = ?kind,
            handlers = subscriptions.len()
        );

        let surface = self.surfaces.entry(id).or_insert(OpenSurface {
            endpoint,
            _subscriptions: subscriptions,
        });
        Ok(&surface.endpoint)
    }

    /// Close a surface; its handlers are removed.
    pub fn close(&mut self, id: SurfaceId) -> bool {
        self.surfaces.remove(&id);
        let uptime = self.host.router().registry().uptime(id);
        let closed = self.host.close_surface(id);
        if let Some(uptime) = uptime.filter(|_| closed) {
            log_surface_event!(
                info,
                id,
                "Surface closed",
                uptime_ms = uptime.as_millis() as u64
            );
        }
        closed
    }

    fn kind_of(&self, id: SurfaceId) -> SurfaceKind {
        match id {
            SurfaceId::Content if self.config.layout.embed_content => SurfaceKind::EmbeddedView {
                host: SurfaceId::Shell,
            },
            _ => SurfaceKind::Window,
        }
    }

    /// Endpoint of an open surface.
    pub fn endpoint(&self, id: SurfaceId) -> Option<&SurfaceEndpoint> {
        self.surfaces.get(&id).map(|s| &s.endpoint)
    }

    /// The shared host.
    pub fn host(&self) -> &Arc<SurfaceHost> {
        &self.host
    }

    /// The settings backing the settings surface.
    pub fn settings(&self) -> &Arc<SettingsStore> {
        &self.settings
    }

    /// Capture a snapshot and mirror it into the metrics gauges.
    pub fn refresh_metrics(&self) -> BusSnapshot {
        let snapshot = self.host.snapshot();
        record_snapshot(&snapshot);
        snapshot
    }

    /// Cancel pending requests with `reason` and close every surface.
    ///
    /// Returns the number of requests cancelled.
    pub fn shutdown(&mut self, reason: &str) -> usize {
        info!(reason = reason, "Initiating shutdown");
        let cancelled = self.host.shutdown(reason);
        self.surfaces.clear();
        self.refresh_metrics();
        cancelled
    }
}
