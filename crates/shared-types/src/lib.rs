//! # Shared Types Crate
//!
//! This crate contains the surface identities, the message `Envelope` and
//! the error taxonomy used by every crate in the workspace.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-surface types are defined here.
//! - **Envelope Integrity**: The `Envelope` is the sole wrapper for every
//!   message that crosses a surface boundary.
//! - **Envelope Authority**: The envelope's `from` is stamped by the host side
//!   of the sending surface. Payloads MUST NOT carry their own sender field.

pub mod correlation;
pub mod envelope;
pub mod errors;
pub mod surface;

pub use correlation::CorrelationId;
pub use envelope::{Envelope, MessageKind};
pub use errors::*;
pub use surface::SurfaceId;
