//! # Host Configuration
//!
//! Unified configuration for the bus, telemetry and surface layout.
//!
//! All values have defaults; environment variables override them.

use mesh_telemetry::TelemetryConfig;
use serde::{Deserialize, Serialize};
use shared_bus::{BusConfig, ConfigError};
use std::env;
use tracing::warn;

/// Complete host configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Router and correlator configuration.
    pub bus: BusConfig,
    /// Logging and metrics configuration.
    pub telemetry: TelemetryConfig,
    /// Which surfaces open at startup and how.
    pub layout: SurfaceLayout,
}

impl HostConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bus.validate()
    }
}

/// Surface layout.
///
/// The shell is always a top-level window. Content is embedded inside it
/// unless configured otherwise; settings gets its own window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceLayout {
    /// Host the content surface inside the shell window.
    pub embed_content: bool,
    /// Open the settings window at startup rather than on demand.
    pub open_settings: bool,
}

impl Default for SurfaceLayout {
    fn default() -> Self {
        Self {
            embed_content: true,
            open_settings: false,
        }
    }
}

/// Load configuration from environment.
///
/// # Environment Variables
///
/// - `MESH_EMBED_CONTENT`: Embed content in the shell (default: true)
/// - `MESH_OPEN_SETTINGS`: Open settings at startup (default: false)
/// - plus everything `BusConfig::from_env` and `TelemetryConfig::from_env` read
pub fn load_config() -> HostConfig {
    let mut config = HostConfig {
        bus: BusConfig::from_env(),
        telemetry: TelemetryConfig::from_env(),
        layout: SurfaceLayout::default(),
    };

    if let Some(embed) = env_flag("MESH_EMBED_CONTENT") {
        config.layout.embed_content = embed;
    }
    if let Some(open) = env_flag("MESH_OPEN_SETTINGS") {
        config.layout.open_settings = open;
    }

    config
}

fn env_flag(name: &str) -> Option<bool> {
    let value = env::var(name).ok()?;
    match value.trim().to_lowercase().as_str() {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        other => {
            warn!(variable = name, value = other, "Ignoring unrecognised flag value");
            None
        }
    }
}
