//! # Host Container
//!
//! Configuration for the host process and the surfaces it opens.

pub mod config;

pub use config::{load_config, HostConfig, SurfaceLayout};
