//! # Message `Envelope`
//!
//! The universal wrapper for every message that crosses a surface boundary.
//!
//! ## Wire Shape
//!
//! ```json
//! {
//!   "kind": "request",
//!   "from": "shell",
//!   "to": "content",
//!   "channel": "echo",
//!   "payload": { "v": 1 },
//!   "correlationId": "01890a5d-ac96-774b-bcce-b302099a8057"
//! }
//! ```
//!
//! - `to` is absent for broadcasts.
//! - `correlationId` is present on `request` and `response` only.
//! - `error` is present on failed responses only.

use crate::correlation::CorrelationId;
use crate::errors::EnvelopeError;
use crate::surface::SurfaceId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The four message kinds the router understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// One-way message to a single destination.
    Send,
    /// One-way message to every live surface except the sender.
    Broadcast,
    /// Message expecting exactly one response.
    Request,
    /// Answer to a request, matched by correlation id.
    Response,
}

impl MessageKind {
    /// Get the wire name of this kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Send => "send",
            Self::Broadcast => "broadcast",
            Self::Request => "request",
            Self::Response => "response",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A routed message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// What the router should do with this envelope.
    pub kind: MessageKind,

    /// The sending surface. Authoritative; payloads never repeat it.
    pub from: SurfaceId,

    /// The destination surface. Absent for broadcasts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<SurfaceId>,

    /// Application-defined topic.
    pub channel: String,

    /// Arbitrary structured data.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,

    /// Links a request to its response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,

    /// Handler failure message carried by a response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Envelope {
    /// Build a one-way addressed message.
    pub fn send(
        from: SurfaceId,
        to: SurfaceId,
        channel: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            kind: MessageKind::Send,
            from,
            to: Some(to),
            channel: channel.into(),
            payload,
            correlation_id: None,
            error: None,
        }
    }

    /// Build a broadcast message.
    pub fn broadcast(from: SurfaceId, channel: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: MessageKind::Broadcast,
            from,
            to: None,
            channel: channel.into(),
            payload,
            correlation_id: None,
            error: None,
        }
    }

    /// Build a request message.
    pub fn request(
        from: SurfaceId,
        to: SurfaceId,
        channel: impl Into<String>,
        payload: Value,
        correlation_id: CorrelationId,
    ) -> Self {
        Self {
            kind: MessageKind::Request,
            from,
            to: Some(to),
            channel: channel.into(),
            payload,
            correlation_id: Some(correlation_id),
            error: None,
        }
    }

    /// Build the response to a request from a handler outcome.
    pub fn response(
        from: SurfaceId,
        to: SurfaceId,
        channel: impl Into<String>,
        correlation_id: CorrelationId,
        outcome: Result<Value, String>,
    ) -> Self {
        let (payload, error) = match outcome {
            Ok(payload) => (payload, None),
            Err(message) => (Value::Null, Some(message)),
        };
        Self {
            kind: MessageKind::Response,
            from,
            to: Some(to),
            channel: channel.into(),
            payload,
            correlation_id: Some(correlation_id),
            error,
        }
    }

    /// Check the fields each kind requires.
    pub fn validate(&self) -> Result<(), EnvelopeError> {
        let needs_destination = matches!(self.kind, MessageKind::Send | MessageKind::Request);
        if needs_destination && self.to.is_none() {
            return Err(EnvelopeError::MissingDestination {
                kind: self.kind,
                channel: self.channel.clone(),
            });
        }

        let needs_correlation = matches!(self.kind, MessageKind::Request | MessageKind::Response);
        if needs_correlation && self.correlation_id.is_none() {
            return Err(EnvelopeError::MissingCorrelationId {
                kind: self.kind,
                channel: self.channel.clone(),
            });
        }

        Ok(())
    }

    /// Decode and validate an envelope from JSON.
    pub fn from_json(json: &str) -> Result<Self, EnvelopeError> {
        let envelope: Self = serde_json::from_str(json)?;
        envelope.validate()?;
        Ok(envelope)
    }

    /// Encode the envelope as JSON.
    pub fn to_json(&self) -> Result<String, EnvelopeError> {
        Ok(serde_json::to_string(self)?)
    }

    /// The handler outcome carried by a response envelope.
    #[must_use]
    pub fn outcome(&self) -> Result<&Value, &str> {
        match &self.error {
            Some(message) => Err(message.as_str()),
            None => Ok(&self.payload),
        }
    }
}
