//! # Surface Registry
//!
//! Tracks which surfaces are live and the transport handle bound to each.
//! The router consults it before every delivery attempt.
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               SurfaceRegistry               │
//! │                                             │
//! │  shell    → h1 (Window)           LIVE      │
//! │  content  → h2 (EmbeddedView)     LIVE      │
//! │  settings → h3 (Window)           STALE     │
//! └─────────────────────────────────────────────┘
//! ```

use crate::transport::{HandleId, SurfaceHandle};
use parking_lot::RwLock;
use shared_types::SurfaceId;
use std::collections::HashMap;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Registry errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The identity names the host process, not a surface.
    #[error("Identity {0} is reserved and cannot be registered")]
    ReservedIdentity(SurfaceId),
}

#[derive(Debug, Clone)]
struct SurfaceEntry {
    handle: SurfaceHandle,
    live: bool,
    registered_at: Instant,
}

/// Map of surface identity to transport handle.
#[derive(Debug, Default)]
pub struct SurfaceRegistry {
    surfaces: RwLock<HashMap<SurfaceId, SurfaceEntry>>,
}

impl SurfaceRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `id` to `handle`, replacing any prior binding.
    ///
    /// Returns the handle that was replaced, if any.
    pub fn register(
        &self,
        id: SurfaceId,
        handle: SurfaceHandle,
    ) -> Result<Option<SurfaceHandle>, RegistryError> {
        if !id.is_addressable() {
            return Err(RegistryError::ReservedIdentity(id));
        }

        let entry = SurfaceEntry {
            handle,
            live: true,
            registered_at: Instant::now(),
        };
        let previous = self.surfaces.write().insert(id, entry).map(|e| e.handle);

        match previous {
            Some(old) => info!(
                surface = %id,
                old_handle = %old.id(),
                handle = %handle.id(),
                "Surface re-registered"
            ),
            None => info!(surface = %id, handle = %handle.id(), "Surface registered"),
        }

        Ok(previous)
    }

    /// Remove the binding for `id`.
    pub fn unregister(&self, id: SurfaceId) -> Option<SurfaceHandle> {
        let removed = self.surfaces.write().remove(&id).map(|e| e.handle);
        if removed.is_some() {
            info!(surface = %id, "Surface unregistered");
        }
        removed
    }

    /// Clear the liveness of `id` if it is still bound to `handle_id`.
    ///
    /// Called when the transport reports a handle gone. A surface recreated
    /// under a new handle in the meantime is left untouched.
    pub fn mark_stale(&self, id: SurfaceId, handle_id: HandleId) -> bool {
        let mut surfaces = self.surfaces.write();
        let Some(entry) = surfaces.get_mut(&id) else {
            return false;
        };
        if entry.handle.id() != handle_id || !entry.live {
            return false;
        }

        entry.live = false;
        warn!(surface = %id, handle = %handle_id, "Surface handle went stale");
        true
    }

    /// Resolve a live handle for `id`.
    #[must_use]
    pub fn resolve(&self, id: SurfaceId) -> Option<SurfaceHandle> {
        let handle = self
            .surfaces
            .read()
            .get(&id)
            .filter(|e| e.live)
            .map(|e| e.handle);

        if handle.is_none() {
            debug!(surface = %id, "Surface not resolvable");
        }
        handle
    }

    /// Every live surface, ordered by identity.
    #[must_use]
    pub fn all_live(&self) -> Vec<(SurfaceId, SurfaceHandle)> {
        let mut live: Vec<_> = self
            .surfaces
            .read()
            .iter()
            .filter(|(_, e)| e.live)
            .map(|(id, e)| (*id, e.handle))
            .collect();
        live.sort_by_key(|(id, _)| *id);
        live
    }

    /// Identities of every live surface, ordered.
    #[must_use]
    pub fn live_ids(&self) -> Vec<SurfaceId> {
        self.all_live().into_iter().map(|(id, _)| id).collect()
    }

    /// Whether `id` is registered and live.
    #[must_use]
    pub fn is_ready(&self, id: SurfaceId) -> bool {
        self.surfaces.read().get(&id).is_some_and(|e| e.live)
    }

    /// Number of live surfaces.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.surfaces.read().values().filter(|e| e.live).count()
    }

    /// How long `id` has been bound to its current handle.
    #[must_use]
    pub fn uptime(&self, id: SurfaceId) -> Option<std::time::Duration> {
        self.surfaces
            .read()
            .get(&id)
            .map(|e| e.registered_at.elapsed())
    }

    /// Remove every binding, returning what was bound.
    pub fn drain(&self) -> Vec<(SurfaceId, SurfaceHandle)> {
        let mut drained: Vec<_> = self
            .surfaces
            .write()
            .drain()
            .map(|(id, e)| (id, e.handle))
            .collect();
        drained.sort_by_key(|(id, _)| *id);
        drained
    }
}
