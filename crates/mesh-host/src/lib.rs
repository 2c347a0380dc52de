//! # Mesh Host Library
//!
//! Exposes the host runtime's modules for testing.
//! The main entry point is the `main.rs` binary.

pub mod container;
pub mod handlers;
pub mod runtime;

pub use container::{load_config, HostConfig, SurfaceLayout};
pub use runtime::MeshRuntime;
