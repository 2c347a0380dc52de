//! Shell window handlers.

use serde_json::{json, Value};
use shared_bus::{SurfaceEndpoint, Subscription, STATUS_CHANNEL};
use shared_types::SurfaceId;
use std::convert::Infallible;
use tracing::{debug, info};

use super::SETTINGS_CHANGED;

/// Install the shell's handlers.
pub fn install(endpoint: &SurfaceEndpoint) -> Vec<Subscription> {
    vec![
        endpoint.on_request("ping", |_payload: Value, from: SurfaceId| async move {
            debug!(from = %from, "Ping");
            Ok::<_, Infallible>(json!("pong"))
        }),
        endpoint.on_message(SETTINGS_CHANGED, |message| {
            info!(from = %message.from, change = %message.payload, "Settings changed");
        }),
        endpoint.on_message(STATUS_CHANNEL, |message| {
            debug!(status = %message.payload, "Host status");
        }),
    ]
}
