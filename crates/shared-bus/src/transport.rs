//! # Transport Adapter
//!
//! The only component that touches the underlying delivery mechanism.
//! The router hands it a handle and an envelope; the transport pushes the
//! envelope to whatever sits behind the handle.

use dashmap::DashMap;
use shared_types::{Envelope, SurfaceId};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::debug;

/// Opaque identifier of one surface instance.
///
/// A recreated surface gets a fresh `HandleId` under the same `SurfaceId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl HandleId {
    /// Wrap a raw handle number.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw handle number.
    #[must_use]
    pub const fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h{}", self.0)
    }
}

/// How a surface is hosted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceKind {
    /// A top-level window.
    Window,
    /// A region embedded within another surface.
    EmbeddedView {
        /// The surface whose window hosts the view.
        host: SurfaceId,
    },
}

/// Transport handle bound to a surface identity in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceHandle {
    id: HandleId,
    kind: SurfaceKind,
}

impl SurfaceHandle {
    /// Create a handle.
    #[must_use]
    pub const fn new(id: HandleId, kind: SurfaceKind) -> Self {
        Self { id, kind }
    }

    /// The handle identifier.
    #[must_use]
    pub const fn id(&self) -> HandleId {
        self.id
    }

    /// How the surface is hosted.
    #[must_use]
    pub const fn kind(&self) -> SurfaceKind {
        self.kind
    }
}

/// Pushes envelopes to surfaces.
///
/// Swapping transports (embedded view to separate window, in-process to
/// another process) must not require router or correlator changes.
pub trait Transport: Send + Sync {
    /// Attempt to deliver `envelope` on `channel` to the surface behind
    /// `handle`.
    ///
    /// Returns `false` if the handle is stale or destroyed. This is a routine
    /// outcome, not a fault, so it is never reported as an error.
    fn deliver(&self, handle: &SurfaceHandle, channel: &str, envelope: &Envelope) -> bool;
}

/// What a surface receives from the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    /// Channel the envelope was pushed on.
    pub channel: String,
    /// The routed envelope.
    pub envelope: Envelope,
}

/// Receiving end of a surface's push channel.
pub type Inbox = mpsc::UnboundedReceiver<Delivery>;

type Outlet = mpsc::UnboundedSender<Delivery>;

/// In-process transport backed by one unbounded mpsc channel per surface.
///
/// Windows and embedded views live in separate tables; that is the only
/// place the distinction between the two matters.
pub struct ChannelTransport {
    windows: DashMap<HandleId, Outlet>,
    views: DashMap<HandleId, Outlet>,
    next_handle: AtomicU64,
}

impl ChannelTransport {
    /// Create an empty transport.
    #[must_use]
    pub fn new() -> Self {
        Self {
            windows: DashMap::new(),
            views: DashMap::new(),
            next_handle: AtomicU64::new(1),
        }
    }

    /// Allocate a handle for a new surface instance and return its inbox.
    pub fn attach(&self, kind: SurfaceKind) -> (SurfaceHandle, Inbox) {
        let id = HandleId::new(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let handle = SurfaceHandle::new(id, kind);
        let (tx, rx) = mpsc::unbounded_channel();

        self.table(kind).insert(id, tx);
        debug!(handle = %id, kind = ?kind, "Surface attached to transport");

        (handle, rx)
    }

    /// Drop the push channel behind `handle`.
    ///
    /// The surface's inbox closes once buffered deliveries are drained.
    pub fn detach(&self, handle: &SurfaceHandle) -> bool {
        let removed = self.table(handle.kind()).remove(&handle.id()).is_some();
        if removed {
            debug!(handle = %handle.id(), "Surface detached from transport");
        }
        removed
    }

    /// Whether `handle` still has a push channel.
    #[must_use]
    pub fn is_attached(&self, handle: &SurfaceHandle) -> bool {
        self.table(handle.kind()).contains_key(&handle.id())
    }

    /// Number of attached surfaces.
    #[must_use]
    pub fn attached_count(&self) -> usize {
        self.windows.len() + self.views.len()
    }

    fn table(&self, kind: SurfaceKind) -> &DashMap<HandleId, Outlet> {
        match kind {
            SurfaceKind::Window => &self.windows,
            SurfaceKind::EmbeddedView { .. } => &self.views,
        }
    }
}

impl Default for ChannelTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for ChannelTransport {
    fn deliver(&self, handle: &SurfaceHandle, channel: &str, envelope: &Envelope) -> bool {
        let table = self.table(handle.kind());

        let sent = match table.get(&handle.id()) {
            Some(outlet) => outlet
                .send(Delivery {
                    channel: channel.to_string(),
                    envelope: envelope.clone(),
                })
                .is_ok(),
            None => return false,
        };

        if !sent {
            // Receiver is gone: the surface was torn down without detaching
            table.remove(&handle.id());
            debug!(handle = %handle.id(), channel = channel, "Pruned stale transport handle");
        }

        sent
    }
}
