//! # Error Types
//!
//! Defines error types used across the bus, the host and the surfaces.

use crate::envelope::MessageKind;
use crate::surface::SurfaceId;
use thiserror::Error;

/// Reasons a request settles without a successful response.
///
/// Every variant is reported to the immediate caller through the request's
/// settlement. None of them is fatal to the host process and none is retried
/// automatically.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// The destination is not registered or its handle is stale.
    #[error("Surface {to} not found or not ready")]
    DestinationUnavailable { to: SurfaceId },

    /// No response arrived within the bound.
    #[error("Request timeout after {elapsed_ms}ms (limit {timeout_ms}ms)")]
    Timeout { elapsed_ms: u64, timeout_ms: u64 },

    /// The destination's request handler failed; the message is verbatim.
    #[error("{0}")]
    Handler(String),

    /// The host cancelled the request, usually on shutdown.
    #[error("{0}")]
    Cancelled(String),
}

impl RequestError {
    /// Stable name of the variant, logged as `error_kind`.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::DestinationUnavailable { .. } => "destination_unavailable",
            Self::Timeout { .. } => "timeout",
            Self::Handler(_) => "handler_error",
            Self::Cancelled(_) => "cancelled",
        }
    }

    /// Returns true if the request ran out of time.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Errors from decoding or validating an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    /// `send` and `request` envelopes must name a destination.
    #[error("{kind} envelope on channel '{channel}' has no destination")]
    MissingDestination { kind: MessageKind, channel: String },

    /// `request` and `response` envelopes must carry a correlation id.
    #[error("{kind} envelope on channel '{channel}' has no correlation id")]
    MissingCorrelationId { kind: MessageKind, channel: String },

    /// The envelope JSON could not be decoded.
    #[error("Malformed envelope: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for EnvelopeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

/// A string did not name any known surface identity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown surface identity: {0}")]
pub struct UnknownSurface(pub String);
