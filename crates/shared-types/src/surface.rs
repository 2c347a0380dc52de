//! # Surface Identities
//!
//! The closed set of logical roles a surface can take. Identities are
//! stable across surface recreation: closing and reopening the settings panel
//! yields a new handle bound to the same `SurfaceId::Settings`.

use crate::errors::UnknownSurface;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Logical identity of an addressable surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceId {
    /// The main shell window (sidebar and chrome).
    Shell,
    /// The content view (chat), usually embedded in the shell.
    Content,
    /// The settings panel.
    Settings,
    /// The coordinating host process itself.
    ///
    /// Only ever appears as the `from` of host-originated broadcasts.
    /// It can never be registered as a destination.
    Host,
}

impl SurfaceId {
    /// Get the wire name of this identity.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Shell => "shell",
            Self::Content => "content",
            Self::Settings => "settings",
            Self::Host => "host",
        }
    }

    /// Whether this identity names a real UI surface.
    #[must_use]
    pub const fn is_addressable(&self) -> bool {
        !matches!(self, Self::Host)
    }

    /// All addressable surface identities.
    #[must_use]
    pub fn all() -> [SurfaceId; 3] {
        [Self::Shell, Self::Content, Self::Settings]
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SurfaceId {
    type Err = UnknownSurface;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shell" => Ok(Self::Shell),
            "content" => Ok(Self::Content),
            "settings" => Ok(Self::Settings),
            "host" => Ok(Self::Host),
            other => Err(UnknownSurface(other.to_string())),
        }
    }
}
