//! # Surface Endpoint
//!
//! The API each surface uses to talk to its peers.
//!
//! An endpoint owns a pump task that drains the surface's inbox:
//!
//! - `send` / `broadcast` deliveries run the channel's message handlers
//!   inline, so per-destination ordering is preserved
//! - `request` deliveries run the channel's request handler on its own task
//!   and route the outcome back as a `response` envelope
//!
//! Handler registration returns a [`Subscription`]; dropping it removes the
//! handler.

use crate::correlator::ReplyFuture;
use crate::router::Router;
use crate::transport::{Delivery, Inbox};
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::RwLock;
use serde_json::Value;
use shared_types::{CorrelationId, Envelope, MessageKind, SurfaceId};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::Stream;
use tracing::{debug, error, warn};

/// A one-way message as seen by a message handler.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    /// Sending surface
    pub from: SurfaceId,
    /// Channel the message arrived on
    pub channel: String,
    /// Message data
    pub payload: Value,
}

/// Per-request options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Overrides the configured default timeout
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    /// Options with an explicit timeout.
    #[must_use]
    pub const fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }
}

type MessageHandler = Arc<dyn Fn(&InboundMessage) + Send + Sync>;
type RequestHandler =
    Arc<dyn Fn(Value, SurfaceId) -> BoxFuture<'static, Result<Value, String>> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandlerSlot {
    Message,
    Request,
}

/// Handlers registered on one surface, keyed by channel.
#[derive(Default)]
struct HandlerTable {
    next_id: AtomicU64,
    messages: RwLock<HashMap<String, Vec<(u64, MessageHandler)>>>,
    requests: RwLock<HashMap<String, (u64, RequestHandler)>>,
}

impl HandlerTable {
    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn add_message(&self, channel: &str, handler: MessageHandler) -> u64 {
        let id = self.next_id();
        self.messages
            .write()
            .entry(channel.to_string())
            .or_default()
            .push((id, handler));
        id
    }

    /// Install the request handler for `channel`, replacing any earlier one.
    fn set_request(&self, channel: &str, handler: RequestHandler) -> u64 {
        let id = self.next_id();
        self.requests.write().insert(channel.to_string(), (id, handler));
        id
    }

    fn remove(&self, slot: HandlerSlot, channel: &str, id: u64) {
        match slot {
            HandlerSlot::Message => {
                let mut messages = self.messages.write();
                if let Some(handlers) = messages.get_mut(channel) {
                    handlers.retain(|(handler_id, _)| *handler_id != id);
                    if handlers.is_empty() {
                        messages.remove(channel);
                    }
                }
            }
            HandlerSlot::Request => {
                let mut requests = self.requests.write();
                // A replacement registered since keeps its slot
                if requests.get(channel).is_some_and(|(current, _)| *current == id) {
                    requests.remove(channel);
                }
            }
        }
    }

    fn message_handlers(&self, channel: &str) -> Vec<MessageHandler> {
        self.messages
            .read()
            .get(channel)
            .map(|handlers| handlers.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default()
    }

    fn request_handler(&self, channel: &str) -> Option<RequestHandler> {
        self.requests.read().get(channel).map(|(_, h)| Arc::clone(h))
    }
}

/// Handle to a registered handler.
///
/// The handler is removed when this is dropped or `unsubscribe` is called.
/// Holds only a weak reference to the surface's handler table, so an
/// outstanding subscription never keeps a closed surface alive.
#[must_use = "dropping a Subscription removes its handler"]
pub struct Subscription {
    table: Weak<HandlerTable>,
    slot: HandlerSlot,
    channel: String,
    id: u64,
}

impl Subscription {
    /// Remove the handler now.
    pub fn unsubscribe(self) {}

    /// Channel the handler is registered on.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("slot", &self.slot)
            .field("channel", &self.channel)
            .field("id", &self.id)
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(table) = self.table.upgrade() else {
            return;
        };
        table.remove(self.slot, &self.channel, self.id);
        debug!(channel = %self.channel, slot = ?self.slot, "Subscription dropped");
    }
}

/// Stream of the messages arriving on one channel.
///
/// Implements `tokio_stream::Stream`; dropping it unsubscribes.
pub struct MessageStream {
    inner: UnboundedReceiverStream<InboundMessage>,
    _subscription: Subscription,
}

impl Stream for MessageStream {
    type Item = InboundMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

/// Outbound half of an endpoint.
///
/// Cheap to clone; request handlers capture it when they need to message
/// other surfaces.
#[derive(Clone)]
pub struct SurfaceSender {
    id: SurfaceId,
    router: Arc<Router>,
}

impl SurfaceSender {
    /// Identity this sender speaks for.
    #[must_use]
    pub fn id(&self) -> SurfaceId {
        self.id
    }

    /// Fire-and-forget message to one surface.
    pub fn send_to(&self, to: SurfaceId, channel: &str, data: Value) -> bool {
        self.router.send_to(self.id, to, channel, data)
    }

    /// Fire-and-forget message to every other live surface.
    pub fn broadcast(&self, channel: &str, data: Value) -> usize {
        self.router.broadcast_except(self.id, channel, data)
    }

    /// Request/response call to another surface.
    pub fn request(
        &self,
        to: SurfaceId,
        channel: &str,
        data: Value,
        options: RequestOptions,
    ) -> ReplyFuture {
        self.router
            .dispatch_request(self.id, to, channel, data, options.timeout)
    }
}

/// A surface's connection to the mesh.
pub struct SurfaceEndpoint {
    sender: SurfaceSender,
    handlers: Arc<HandlerTable>,
    pump: AbortHandle,
}

impl SurfaceEndpoint {
    /// Start the pump for `id` over `inbox`.
    ///
    /// With `reject_unhandled` set, a request on a channel without a handler
    /// is answered with an error; otherwise it is ignored and the caller
    /// times out.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(id: SurfaceId, router: Arc<Router>, inbox: Inbox, reject_unhandled: bool) -> Self {
        let handlers = Arc::new(HandlerTable::default());
        let pump = Pump {
            id,
            router: Arc::clone(&router),
            handlers: Arc::clone(&handlers),
            reject_unhandled,
        };
        let task = tokio::spawn(pump.run(inbox));

        Self {
            sender: SurfaceSender { id, router },
            handlers,
            pump: task.abort_handle(),
        }
    }

    /// Identity of this surface.
    #[must_use]
    pub fn id(&self) -> SurfaceId {
        self.sender.id
    }

    /// A clonable handle for outbound messaging.
    #[must_use]
    pub fn sender(&self) -> SurfaceSender {
        self.sender.clone()
    }

    /// Fire-and-forget message to one surface.
    pub fn send_to(&self, to: SurfaceId, channel: &str, data: Value) -> bool {
        self.sender.send_to(to, channel, data)
    }

    /// Fire-and-forget message to every other live surface.
    pub fn broadcast(&self, channel: &str, data: Value) -> usize {
        self.sender.broadcast(channel, data)
    }

    /// Request/response call to another surface.
    pub fn request(
        &self,
        to: SurfaceId,
        channel: &str,
        data: Value,
        options: RequestOptions,
    ) -> ReplyFuture {
        self.sender.request(to, channel, data, options)
    }

    /// Register a handler for one-way messages on `channel`.
    ///
    /// Handlers run inline on the surface's pump in arrival order.
    pub fn on_message<F>(&self, channel: &str, handler: F) -> Subscription
    where
        F: Fn(&InboundMessage) + Send + Sync + 'static,
    {
        let id = self.handlers.add_message(channel, Arc::new(handler));
        self.subscription(HandlerSlot::Message, channel, id)
    }

    /// Register the request handler for `channel`.
    ///
    /// The handler receives `(payload, from)`. Its `Ok` value, `Err` message
    /// or panic becomes the response. A later registration on the same
    /// channel replaces this one.
    pub fn on_request<F, Fut, E>(&self, channel: &str, handler: F) -> Subscription
    where
        F: Fn(Value, SurfaceId) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let handler: RequestHandler = Arc::new(move |payload: Value, from: SurfaceId| {
            let fut = handler(payload, from);
            async move { fut.await.map_err(|e| e.to_string()) }.boxed()
        });
        let id = self.handlers.set_request(channel, handler);
        self.subscription(HandlerSlot::Request, channel, id)
    }

    /// Stream the messages arriving on `channel`.
    pub fn messages(&self, channel: &str) -> MessageStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.on_message(channel, move |message| {
            let _ = tx.send(message.clone());
        });

        MessageStream {
            inner: UnboundedReceiverStream::new(rx),
            _subscription: subscription,
        }
    }

    /// Number of message handlers on `channel`.
    #[must_use]
    pub fn message_handler_count(&self, channel: &str) -> usize {
        self.handlers
            .messages
            .read()
            .get(channel)
            .map_or(0, Vec::len)
    }

    /// Whether `channel` has a request handler.
    #[must_use]
    pub fn has_request_handler(&self, channel: &str) -> bool {
        self.handlers.requests.read().contains_key(channel)
    }

    fn subscription(&self, slot: HandlerSlot, channel: &str, id: u64) -> Subscription {
        Subscription {
            table: Arc::downgrade(&self.handlers),
            slot,
            channel: channel.to_string(),
            id,
        }
    }
}

impl Drop for SurfaceEndpoint {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

impl fmt::Debug for SurfaceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfaceEndpoint")
            .field("id", &self.sender.id)
            .finish_non_exhaustive()
    }
}

/// Drains one surface's inbox.
struct Pump {
    id: SurfaceId,
    router: Arc<Router>,
    handlers: Arc<HandlerTable>,
    reject_unhandled: bool,
}

impl Pump {
    async fn run(self, mut inbox: Inbox) {
        while let Some(Delivery { channel, envelope }) = inbox.recv().await {
            match envelope.kind {
                MessageKind::Send | MessageKind::Broadcast => {
                    self.dispatch_message(InboundMessage {
                        from: envelope.from,
                        channel,
                        payload: envelope.payload,
                    });
                }
                MessageKind::Request => match envelope.correlation_id {
                    Some(correlation_id) => {
                        let from = envelope.from;
                        self.dispatch_request(channel, from, correlation_id, envelope.payload);
                    }
                    None => {
                        warn!(
                            surface = %self.id,
                            channel = %channel,
                            "Request without correlation ID"
                        );
                    }
                },
                MessageKind::Response => {
                    debug!(
                        surface = %self.id,
                        channel = %channel,
                        "Ignoring response pushed to surface"
                    );
                }
            }
        }
        debug!(surface = %self.id, "Surface inbox closed");
    }

    fn dispatch_message(&self, message: InboundMessage) {
        for handler in self.handlers.message_handlers(&message.channel) {
            let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| handler(&message)));
            if let Err(panic) = outcome {
                error!(
                    surface = %self.id,
                    channel = %message.channel,
                    panic = %panic_message(panic.as_ref()),
                    "Message handler panicked"
                );
            }
        }
    }

    fn dispatch_request(
        &self,
        channel: String,
        from: SurfaceId,
        correlation_id: CorrelationId,
        payload: Value,
    ) {
        let id = self.id;
        let router = Arc::clone(&self.router);

        let Some(handler) = self.handlers.request_handler(&channel) else {
            if self.reject_unhandled {
                let message = format!("No handler for '{channel}' on surface {id}");
                let response = Envelope::response(id, from, channel, correlation_id, Err(message));
                router.route_inbound(response);
            } else {
                debug!(
                    surface = %id,
                    channel = %channel,
                    correlation_id = %correlation_id,
                    "No request handler; caller will time out"
                );
            }
            return;
        };

        tokio::spawn(async move {
            let outcome = AssertUnwindSafe(async move { handler(payload, from).await })
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    let message = panic_message(panic.as_ref());
                    error!(
                        surface = %id,
                        channel = %channel,
                        correlation_id = %correlation_id,
                        panic = %message,
                        "Request handler panicked"
                    );
                    Err(message)
                });

            let response = Envelope::response(id, from, channel, correlation_id, outcome);
            router.route_inbound(response);
        });
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "request handler panicked".to_string()
    }
}
