//! # Settings Surface
//!
//! Serves the in-memory settings map and tells every other surface when a
//! value changes.
//!
//! | Channel | Payload | Reply |
//! |---------|---------|-------|
//! | `settings.get` | `{"key": k}` or nothing | the value, or the whole map |
//! | `settings.set` | `{"key": k, "value": v}` | `{"key": k, "previous": old, "notified": n}` |
//!
//! A successful `settings.set` broadcasts `settings.changed` with
//! `{"key": k, "value": v}`; `notified` is how many surfaces received it.

use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use shared_bus::{SurfaceEndpoint, SurfaceSender, Subscription};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Broadcast after a setting changes.
pub const SETTINGS_CHANGED: &str = "settings.changed";

/// Settings request errors. Their messages reach the requester verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("Invalid settings payload: {0}")]
    InvalidPayload(String),

    #[error("Setting key cannot be empty")]
    EmptyKey,
}

#[derive(Debug, Deserialize)]
struct GetRequest {
    key: String,
}

#[derive(Debug, Deserialize)]
struct SetRequest {
    key: String,
    value: Value,
}

/// In-memory settings.
#[derive(Debug, Default)]
pub struct SettingsStore {
    values: RwLock<Map<String, Value>>,
}

impl SettingsStore {
    /// Create a store seeded with `defaults`.
    pub fn with_defaults(defaults: Map<String, Value>) -> Self {
        Self {
            values: RwLock::new(defaults),
        }
    }

    /// Look up one key, or the whole map when `payload` is null.
    pub fn get(&self, payload: Value) -> Result<Value, SettingsError> {
        if payload.is_null() {
            return Ok(Value::Object(self.values.read().clone()));
        }

        let request: GetRequest = serde_json::from_value(payload)
            .map_err(|e| SettingsError::InvalidPayload(e.to_string()))?;
        Ok(self
            .values
            .read()
            .get(&request.key)
            .cloned()
            .unwrap_or(Value::Null))
    }

    /// Store a value; returns the key, the new value and the previous value.
    pub fn set(&self, payload: Value) -> Result<(String, Value, Value), SettingsError> {
        let request: SetRequest = serde_json::from_value(payload)
            .map_err(|e| SettingsError::InvalidPayload(e.to_string()))?;
        if request.key.trim().is_empty() {
            return Err(SettingsError::EmptyKey);
        }

        let previous = self
            .values
            .write()
            .insert(request.key.clone(), request.value.clone())
            .unwrap_or(Value::Null);
        Ok((request.key, request.value, previous))
    }

    /// Number of stored settings.
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}

/// Install the settings surface's handlers.
pub fn install(endpoint: &SurfaceEndpoint, store: Arc<SettingsStore>) -> Vec<Subscription> {
    let get_store = Arc::clone(&store);
    let get = endpoint.on_request("settings.get", move |payload, _from| {
        let result = get_store.get(payload);
        async move { result }
    });

    let sender = endpoint.sender();
    let set = endpoint.on_request("settings.set", move |payload, from| {
        let result = apply_set(&store, &sender, payload);
        if result.is_ok() {
            info!(from = %from, "Setting updated");
        }
        async move { result }
    });

    vec![get, set]
}

fn apply_set(
    store: &SettingsStore,
    sender: &SurfaceSender,
    payload: Value,
) -> Result<Value, SettingsError> {
    let (key, value, previous) = store.set(payload)?;
    let notified = sender.broadcast(SETTINGS_CHANGED, json!({ "key": key, "value": value }));
    Ok(json!({ "key": key, "previous": previous, "notified": notified }))
}
