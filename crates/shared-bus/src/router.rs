//! # Router
//!
//! Delivers envelopes between surfaces. Destinations are resolved through
//! the registry and pushed through the transport; requests are wrapped by
//! the correlator.
//!
//! The router never runs handlers. A request arriving through
//! `route_inbound` is forwarded to its destination as-is and the
//! destination answers with a `response` envelope that comes back through
//! `route_inbound` again.

use crate::correlator::{Correlator, ReplyFuture};
use crate::registry::SurfaceRegistry;
use crate::transport::{SurfaceHandle, Transport};
use serde_json::Value;
use shared_types::{Envelope, MessageKind, RequestError, SurfaceId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// What `route_inbound` did with an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Pushed to `count` surfaces.
    Delivered { count: usize },
    /// A response settled its pending request.
    Settled,
    /// A response matched no pending request.
    Unmatched,
    /// The envelope was malformed or its destination unavailable.
    Dropped,
}

/// Router counters.
#[derive(Debug, Default)]
pub struct RouterStats {
    /// Envelopes successfully pushed to a surface
    pub delivered: AtomicU64,
    /// Delivery attempts that found no live handle
    pub failed: AtomicU64,
    /// Broadcasts routed
    pub broadcasts: AtomicU64,
    /// Inbound envelopes dropped
    pub dropped: AtomicU64,
}

/// Routes messages between registered surfaces.
pub struct Router {
    registry: Arc<SurfaceRegistry>,
    transport: Arc<dyn Transport>,
    correlator: Arc<Correlator>,
    stats: RouterStats,
}

impl Router {
    /// Create a router over the given registry, transport and correlator.
    pub fn new(
        registry: Arc<SurfaceRegistry>,
        transport: Arc<dyn Transport>,
        correlator: Arc<Correlator>,
    ) -> Self {
        Self {
            registry,
            transport,
            correlator,
            stats: RouterStats::default(),
        }
    }

    /// Push `envelope` to the surface bound to `to`.
    ///
    /// A handle the transport rejects is marked stale so later lookups skip
    /// it until the surface registers again.
    fn push(&self, to: SurfaceId, handle: &SurfaceHandle, envelope: &Envelope) -> bool {
        if self.transport.deliver(handle, &envelope.channel, envelope) {
            self.stats.delivered.fetch_add(1, Ordering::Relaxed);
            trace!(
                kind = %envelope.kind,
                from = %envelope.from,
                to = %to,
                channel = %envelope.channel,
                "Envelope delivered"
            );
            return true;
        }

        self.stats.failed.fetch_add(1, Ordering::Relaxed);
        self.registry.mark_stale(to, handle.id());
        false
    }

    /// Resolve `to` and push `envelope` there.
    fn deliver_to(&self, to: SurfaceId, envelope: &Envelope) -> bool {
        match self.registry.resolve(to) {
            Some(handle) => self.push(to, &handle, envelope),
            None => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Push `envelope` to every live surface other than `except`.
    fn fan_out(&self, except: Option<SurfaceId>, envelope: &Envelope) -> usize {
        self.stats.broadcasts.fetch_add(1, Ordering::Relaxed);

        let delivered = self
            .registry
            .all_live()
            .into_iter()
            .filter(|(id, _)| Some(*id) != except)
            .filter(|(id, handle)| self.push(*id, handle, envelope))
            .count();

        debug!(
            from = %envelope.from,
            channel = %envelope.channel,
            delivered = delivered,
            "Broadcast routed"
        );
        delivered
    }

    /// Fire-and-forget message to one surface.
    ///
    /// Returns `false` if `to` is not registered or its handle is stale.
    pub fn send_to(&self, from: SurfaceId, to: SurfaceId, channel: &str, payload: Value) -> bool {
        let envelope = Envelope::send(from, to, channel, payload);
        let delivered = self.deliver_to(to, &envelope);
        if !delivered {
            warn!(from = %from, to = %to, channel = channel, "Send target unavailable");
        }
        delivered
    }

    /// Fire-and-forget message to every live surface except `from`.
    ///
    /// Returns the number of deliveries made.
    pub fn broadcast_except(&self, from: SurfaceId, channel: &str, payload: Value) -> usize {
        let envelope = Envelope::broadcast(from, channel, payload);
        self.fan_out(Some(from), &envelope)
    }

    /// Host-originated message to every live surface.
    pub fn broadcast_all(&self, channel: &str, payload: Value) -> usize {
        let envelope = Envelope::broadcast(SurfaceId::Host, channel, payload);
        self.fan_out(None, &envelope)
    }

    /// Send a request and return a future for its response.
    ///
    /// An unresolvable destination settles immediately with
    /// `DestinationUnavailable` and leaves no pending entry or timer.
    pub fn dispatch_request(
        &self,
        from: SurfaceId,
        to: SurfaceId,
        channel: &str,
        payload: Value,
        timeout: Option<Duration>,
    ) -> ReplyFuture {
        let Some(handle) = self.registry.resolve(to) else {
            self.stats.failed.fetch_add(1, Ordering::Relaxed);
            warn!(from = %from, to = %to, channel = channel, "Request target unavailable");
            return ReplyFuture::settled(Err(RequestError::DestinationUnavailable { to }));
        };

        self.correlator
            .issue(from, to, channel, payload, timeout, |envelope| {
                self.push(to, &handle, envelope)
            })
    }

    /// Route an envelope produced by a surface.
    pub fn route_inbound(&self, envelope: Envelope) -> RouteOutcome {
        if let Err(err) = envelope.validate() {
            return self.drop_inbound(&envelope, &err.to_string());
        }

        match envelope.kind {
            MessageKind::Broadcast => {
                let count = self.fan_out(Some(envelope.from), &envelope);
                RouteOutcome::Delivered { count }
            }
            MessageKind::Send => {
                let Some(to) = envelope.to else {
                    return self.drop_inbound(&envelope, "missing destination");
                };
                if self.deliver_to(to, &envelope) {
                    RouteOutcome::Delivered { count: 1 }
                } else {
                    self.drop_inbound(&envelope, "destination unavailable")
                }
            }
            MessageKind::Request => {
                let (Some(to), Some(correlation_id)) = (envelope.to, envelope.correlation_id)
                else {
                    return self.drop_inbound(&envelope, "missing destination or correlation id");
                };
                if self.deliver_to(to, &envelope) {
                    return RouteOutcome::Delivered { count: 1 };
                }
                self.correlator
                    .fail(correlation_id, RequestError::DestinationUnavailable { to });
                self.drop_inbound(&envelope, "destination unavailable")
            }
            MessageKind::Response => {
                let Some(correlation_id) = envelope.correlation_id else {
                    return self.drop_inbound(&envelope, "missing correlation id");
                };
                if self
                    .correlator
                    .settle(correlation_id, envelope.payload, envelope.error)
                {
                    RouteOutcome::Settled
                } else {
                    RouteOutcome::Unmatched
                }
            }
        }
    }

    fn drop_inbound(&self, envelope: &Envelope, reason: &str) -> RouteOutcome {
        self.stats.dropped.fetch_add(1, Ordering::Relaxed);
        warn!(
            kind = %envelope.kind,
            from = %envelope.from,
            channel = %envelope.channel,
            reason = reason,
            "Inbound envelope dropped"
        );
        RouteOutcome::Dropped
    }

    /// The registry this router resolves against.
    pub fn registry(&self) -> &Arc<SurfaceRegistry> {
        &self.registry
    }

    /// The correlator owning in-flight requests.
    pub fn correlator(&self) -> &Arc<Correlator> {
        &self.correlator
    }

    /// Get statistics
    pub fn stats(&self) -> &RouterStats {
        &self.stats
    }
}
