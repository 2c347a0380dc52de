//! Content view handlers.

use serde_json::Value;
use shared_bus::{SurfaceEndpoint, Subscription};
use shared_types::SurfaceId;
use std::convert::Infallible;
use tracing::debug;

use super::SETTINGS_CHANGED;

/// Install the content view's handlers.
pub fn install(endpoint: &SurfaceEndpoint) -> Vec<Subscription> {
    vec![
        endpoint.on_request("echo", |payload: Value, from: SurfaceId| async move {
            debug!(from = %from, "Echo");
            Ok::<_, Infallible>(payload)
        }),
        endpoint.on_message(SETTINGS_CHANGED, |message| {
            debug!(change = %message.payload, "Applying settings change");
        }),
    ]
}
