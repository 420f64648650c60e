//! Error taxonomy shared by every portico crate.
//!
//! Each crate keeps its own `thiserror` enum; [`ErrorCategory`] is the
//! common classification those enums report through their `category()`
//! methods.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad classification of a runtime error.
///
/// Determines whether the error reaches the mounting caller or is contained
/// and only logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Caller mistake: unknown component, missing content, bad defaults,
    /// delimiter collisions.
    Config,
    /// Asset path rejected by the sandbox.
    Sandbox,
    /// One package's manifest could not be discovered or parsed.
    Discovery,
    /// A watcher failed to start, close, or re-resolve.
    Watch,
    /// A payload could not be encoded even through the string fallback.
    DataPlane,
    /// Lock poisoning and other host-side faults.
    Internal,
}

impl ErrorCategory {
    /// Whether errors of this category must propagate to the registration
    /// or mount call that triggered them.
    #[must_use]
    pub fn is_surfaced(self) -> bool {
        matches!(self, Self::Config | Self::Sandbox | Self::DataPlane | Self::Internal)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Config => "config",
            Self::Sandbox => "sandbox",
            Self::Discovery => "discovery",
            Self::Watch => "watch",
            Self::DataPlane => "data_plane",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}
