//! # Surface Mesh Test Suite
//!
//! Cross-crate flows that exercise the registry, router, correlator,
//! endpoints and host together.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── request_flows.rs    # request/response, timeouts, settlement
//!     ├── broadcast_flows.rs  # fan-out, stale handles, ordering
//!     ├── lifecycle_flows.rs  # open/close/re-open, status, shutdown
//!     └── transport_flows.rs  # custom transports, wire envelopes
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p mesh-tests
//! cargo test -p mesh-tests integration::request_flows
//! ```

pub mod integration;
