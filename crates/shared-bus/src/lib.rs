//! # Shared Bus - Inter-Surface Messaging
//!
//! Lets the UI surfaces of one host process talk to each other as peers on
//! a small internal network.
//!
//! ## Rules
//!
//! - All inter-surface communication goes through the `Router`
//! - Surfaces never hold each other's transport handles
//! - Every message is wrapped in an `Envelope`
//!
//! ## Message Flow
//!
//! ```text
//! ┌──────────────┐  send_to / broadcast   ┌──────────────┐
//! │  Surface A   │ ─────────┐             │  Surface B   │
//! │  (endpoint)  │          │             │  (endpoint)  │
//! └──────────────┘          ▼             └──────────────┘
//!        ▲           ┌──────────────┐            ▲   │
//!        │           │    Router    │ ───────────┘   │ response
//!        │           │  + Registry  │                │
//!        │           └──────┬───────┘ ◀──────────────┘
//!        │                  │ settle()
//!        │           ┌──────▼───────┐
//!        └────────── │  Correlator  │
//!          reply     └──────────────┘
//! ```
//!
//! ## Settlement
//!
//! - **Exactly once:** a request resolves, rejects, times out or is
//!   cancelled, and only the first of those takes effect
//! - **Bounded latency:** every request carries a timeout
//! - **Shutdown drains:** `cancel_all` leaves no pending entry or timer behind

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod config;
pub mod correlator;
pub mod endpoint;
pub mod host;
pub mod registry;
pub mod router;
pub mod transport;

// Re-export main types
pub use config::{BusConfig, ConfigError};
pub use correlator::{Correlator, CorrelatorStats, ReplyFuture, Settlement};
pub use endpoint::{
    InboundMessage, MessageStream, RequestOptions, Subscription, SurfaceEndpoint, SurfaceSender,
};
pub use host::{BusSnapshot, HostError, SurfaceHost};
pub use registry::{RegistryError, SurfaceRegistry};
pub use router::{RouteOutcome, Router, RouterStats};
pub use transport::{
    ChannelTransport, Delivery, HandleId, Inbox, SurfaceHandle, SurfaceKind, Transport,
};

/// Timeout applied to requests that do not specify one.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Channel used by the periodic host status broadcast.
pub const STATUS_CHANNEL: &str = "app-status";

/// Rejection reason used when the host process shuts down.
pub const SHUTDOWN_REASON: &str = "Application is closing";
