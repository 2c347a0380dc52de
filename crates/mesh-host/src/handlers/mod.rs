//! # Surface Handlers
//!
//! Request and message handlers installed on each surface at startup.
//! Every `install` returns the subscriptions keeping its handlers alive;
//! the runtime drops them when the surface closes.

pub mod content;
pub mod settings;
pub mod shell;

pub use settings::{SettingsError, SettingsStore, SETTINGS_CHANGED};
