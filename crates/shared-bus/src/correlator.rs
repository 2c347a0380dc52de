//! # Request/Response Correlator
//!
//! Turns one-way message passing into awaitable calls.
//!
//! ## Lifecycle
//!
//! ```text
//!                 ┌──────────── settle(id, payload) ──▶ Resolved
//!                 │
//! issue() ──▶ PENDING ───────── settle(id, error) ────▶ Rejected
//!   │             │
//!   │             ├──────────── timer fires ──────────▶ TimedOut
//!   │             │
//!   │             └──────────── cancel_all(reason) ───▶ Cancelled
//!   │
//!   └── delivery fails ─────────────────────────────▶ Rejected (no timer)
//! ```
//!
//! Removal from the pending table is the single point of truth: whichever
//! of {response, timer, shutdown} removes the entry first settles it, and
//! every later attempt finds nothing and does nothing.

use dashmap::DashMap;
use serde_json::Value;
use shared_types::{CorrelationId, Envelope, RequestError, SurfaceId};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Final outcome of a request.
pub type Settlement = Result<Value, RequestError>;

/// A request waiting for its response.
struct PendingRequest {
    /// Settles the caller's future
    sender: oneshot::Sender<Settlement>,
    /// Requesting surface (diagnostics)
    from: SurfaceId,
    /// Destination surface (diagnostics)
    to: SurfaceId,
    /// Channel the request was sent on
    channel: String,
    /// When the request was issued
    issued_at: Instant,
    /// Bound on the wait
    timeout: Duration,
    /// Timer task, absent until delivery succeeded
    timer: Option<AbortHandle>,
}

impl PendingRequest {
    /// Stop the timer and hand the outcome to the caller.
    fn finish(self, outcome: Settlement) {
        if let Some(timer) = &self.timer {
            timer.abort();
        }
        if self.sender.send(outcome).is_err() {
            // Caller dropped its future; nothing left to notify
            debug!(
                from = %self.from,
                to = %self.to,
                channel = %self.channel,
                "Reply future dropped before settlement"
            );
        }
    }
}

/// Settlement counters.
#[derive(Debug, Default)]
pub struct CorrelatorStats {
    /// Requests issued
    pub issued: AtomicU64,
    /// Requests resolved with a payload
    pub resolved: AtomicU64,
    /// Requests rejected (handler error or destination unavailable)
    pub rejected: AtomicU64,
    /// Requests that ran out of time
    pub timed_out: AtomicU64,
    /// Requests cancelled by shutdown
    pub cancelled: AtomicU64,
    /// Responses that matched no pending request
    pub unmatched: AtomicU64,
}

impl CorrelatorStats {
    fn count(&self, outcome: &Settlement) {
        let counter = match outcome {
            Ok(_) => &self.resolved,
            Err(RequestError::Timeout { .. }) => &self.timed_out,
            Err(RequestError::Cancelled(_)) => &self.cancelled,
            Err(_) => &self.rejected,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Requests settled in any way.
    pub fn settled(&self) -> u64 {
        self.resolved.load(Ordering::Relaxed)
            + self.rejected.load(Ordering::Relaxed)
            + self.timed_out.load(Ordering::Relaxed)
            + self.cancelled.load(Ordering::Relaxed)
    }
}

/// Owns every in-flight request.
///
/// Flow:
/// 1. `Router::dispatch_request` resolves the destination
/// 2. `issue()` allocates a CorrelationId and stores a pending entry
/// 3. The request envelope is delivered; on success a timer starts
/// 4. The destination's response reaches `settle()` via `Router::route_inbound`
/// 5. The caller's `ReplyFuture` completes
pub struct Correlator {
    /// Map of correlation ID to pending request
    pending: Arc<DashMap<CorrelationId, PendingRequest>>,
    /// Timeout for requests that do not specify one
    default_timeout: Duration,
    /// Statistics
    stats: Arc<CorrelatorStats>,
}

impl Correlator {
    /// Create a correlator with the given default timeout.
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            pending: Arc::new(DashMap::new()),
            default_timeout,
            stats: Arc::new(CorrelatorStats::default()),
        }
    }

    /// Issue a request.
    ///
    /// `deliver` pushes the request envelope towards the destination and
    /// reports whether that succeeded. A synchronous failure settles the
    /// request as `DestinationUnavailable` and no timer is started.
    ///
    /// Must be called from within a tokio runtime.
    pub fn issue<F>(
        &self,
        from: SurfaceId,
        to: SurfaceId,
        channel: &str,
        payload: Value,
        timeout: Option<Duration>,
        deliver: F,
    ) -> ReplyFuture
    where
        F: FnOnce(&Envelope) -> bool,
    {
        let correlation_id = CorrelationId::new();
        // A zero bound means "use the default", never "expire at once"
        let timeout = timeout
            .filter(|t| !t.is_zero())
            .unwrap_or(self.default_timeout);
        let (tx, rx) = oneshot::channel();

        let envelope = Envelope::request(from, to, channel, payload, correlation_id);

        // Store before delivering: a fast responder may answer before
        // `deliver` even returns.
        self.pending.insert(
            correlation_id,
            PendingRequest {
                sender: tx,
                from,
                to,
                channel: channel.to_string(),
                issued_at: Instant::now(),
                timeout,
                timer: None,
            },
        );
        self.stats.issued.fetch_add(1, Ordering::Relaxed);

        if !deliver(&envelope) {
            warn!(
                correlation_id = %correlation_id,
                from = %from,
                to = %to,
                channel = channel,
                "Request delivery failed"
            );
            self.fail(correlation_id, RequestError::DestinationUnavailable { to });
            return ReplyFuture::waiting(correlation_id, rx);
        }

        self.arm_timer(correlation_id, timeout);

        debug!(
            correlation_id = %correlation_id,
            from = %from,
            to = %to,
            channel = channel,
            timeout_ms = timeout.as_millis() as u64,
            "Request issued"
        );

        ReplyFuture::waiting(correlation_id, rx)
    }

    /// Start the timeout task for `correlation_id`.
    fn arm_timer(&self, correlation_id: CorrelationId, timeout: Duration) {
        let pending = Arc::clone(&self.pending);
        let stats = Arc::clone(&self.stats);

        let task = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;

            let Some((_, request)) = pending.remove(&correlation_id) else {
                return;
            };
            let elapsed = request.issued_at.elapsed();
            let error = RequestError::Timeout {
                elapsed_ms: elapsed.as_millis() as u64,
                timeout_ms: request.timeout.as_millis() as u64,
            };
            warn!(
                correlation_id = %correlation_id,
                from = %request.from,
                to = %request.to,
                channel = %request.channel,
                elapsed_ms = elapsed.as_millis() as u64,
                error_kind = error.label(),
                "Request timed out"
            );

            let outcome = Err(error);
            stats.count(&outcome);
            request.finish(outcome);
        });

        match self.pending.get_mut(&correlation_id) {
            Some(mut request) => request.timer = Some(task.abort_handle()),
            // Already settled while the timer was being spawned
            None => task.abort(),
        }
    }

    /// Settle a request from its response.
    ///
    /// Returns `false` for an unknown or already-settled id; the response is
    /// logged and dropped.
    pub fn settle(
        &self,
        correlation_id: CorrelationId,
        payload: Value,
        error: Option<String>,
    ) -> bool {
        let Some((_, request)) = self.pending.remove(&correlation_id) else {
            self.stats.unmatched.fetch_add(1, Ordering::Relaxed);
            warn!(
                correlation_id = %correlation_id,
                "Response for unknown or already-settled correlation ID"
            );
            return false;
        };

        let outcome = match error {
            Some(message) => Err(RequestError::Handler(message)),
            None => Ok(payload),
        };
        debug!(
            correlation_id = %correlation_id,
            from = %request.from,
            to = %request.to,
            channel = %request.channel,
            response_time_ms = request.issued_at.elapsed().as_millis() as u64,
            error_kind = outcome.as_ref().err().map(RequestError::label),
            "Request settled"
        );
        self.stats.count(&outcome);
        request.finish(outcome);
        true
    }

    /// Reject a pending request with `error`.
    pub fn fail(&self, correlation_id: CorrelationId, error: RequestError) -> bool {
        let Some((_, request)) = self.pending.remove(&correlation_id) else {
            return false;
        };

        debug!(
            correlation_id = %correlation_id,
            to = %request.to,
            channel = %request.channel,
            error_kind = error.label(),
            "Request failed"
        );
        let outcome = Err(error);
        self.stats.count(&outcome);
        request.finish(outcome);
        true
    }

    /// Reject every pending request with `reason`.
    ///
    /// Called on host shutdown. Returns the number of requests cancelled.
    pub fn cancel_all(&self, reason: &str) -> usize {
        let ids: Vec<CorrelationId> = self.pending.iter().map(|e| *e.key()).collect();

        let cancelled = ids
            .into_iter()
            .filter(|id| self.fail(*id, RequestError::Cancelled(reason.to_string())))
            .count();

        if cancelled > 0 {
            info!(cancelled = cancelled, reason = reason, "Cancelled pending requests");
        }
        cancelled
    }

    /// Number of requests awaiting settlement.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Check if a correlation ID is pending
    pub fn is_pending(&self, correlation_id: &CorrelationId) -> bool {
        self.pending.contains_key(correlation_id)
    }

    /// Number of armed timeout timers.
    pub fn active_timers(&self) -> usize {
        self.pending.iter().filter(|e| e.timer.is_some()).count()
    }

    /// Timeout applied when a request does not specify one.
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Get statistics
    pub fn stats(&self) -> &CorrelatorStats {
        &self.stats
    }
}

enum ReplyState {
    Ready(Option<Settlement>),
    Waiting(oneshot::Receiver<Settlement>),
}

/// Future that settles exactly once with the outcome of a request.
///
/// Dropping it does not cancel the request; the correlator still settles
/// the pending entry when the response, the timer or shutdown arrives.
pub struct ReplyFuture {
    correlation_id: Option<CorrelationId>,
    state: ReplyState,
}

impl ReplyFuture {
    fn waiting(correlation_id: CorrelationId, rx: oneshot::Receiver<Settlement>) -> Self {
        Self {
            correlation_id: Some(correlation_id),
            state: ReplyState::Waiting(rx),
        }
    }

    /// A future that is already settled, for requests rejected before a
    /// correlation id was allocated.
    pub fn settled(outcome: Settlement) -> Self {
        Self {
            correlation_id: None,
            state: ReplyState::Ready(Some(outcome)),
        }
    }

    /// The correlation id, if the request reached the correlator.
    pub fn correlation_id(&self) -> Option<CorrelationId> {
        self.correlation_id
    }
}

impl Future for ReplyFuture {
    type Output = Settlement;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match &mut this.state {
            ReplyState::Ready(outcome) => match outcome.take() {
                Some(outcome) => Poll::Ready(outcome),
                None => Poll::Ready(Err(RequestError::Cancelled(
                    "reply already consumed".into(),
                ))),
            },
            ReplyState::Waiting(rx) => match Pin::new(rx).poll(cx) {
                Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
                Poll::Ready(Err(_)) => Poll::Ready(Err(RequestError::Cancelled(
                    "correlator dropped".into(),
                ))),
                Poll::Pending => Poll::Pending,
            },
        }
    }
}
