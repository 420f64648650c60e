//! Runtime error types.

use portico_types::{ComponentKey, ErrorCategory, ManifestError, Slot};

use crate::sandbox::SandboxError;

/// Errors from the registry, scanner, and watcher layer.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Asset path rejected by the sandbox; propagated unchanged.
    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    /// A runtime-registered slot value is neither inline text nor a usable path.
    #[error("component '{key}' {slot} source is invalid: {reason}")]
    InvalidSource {
        key: ComponentKey,
        slot: Slot,
        reason: String,
    },

    /// Manifest failed to parse or validate.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// A candidate manifest file could not be read during discovery.
    #[error("failed to read manifest {location}: {source}")]
    ManifestRead {
        location: String,
        #[source]
        source: std::io::Error,
    },

    /// Underlying file-notification facility failure.
    #[error("file watcher: {0}")]
    Watch(#[from] notify::Error),

    /// I/O error outside of sandbox resolution.
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),

    /// Internal mutex was poisoned by a panicked thread.
    #[error("component registry lock poisoned")]
    LockPoisoned,
}

impl RuntimeError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Sandbox(_) => ErrorCategory::Sandbox,
            Self::InvalidSource { .. } => ErrorCategory::Config,
            Self::Manifest(_) | Self::ManifestRead { .. } | Self::Io(_) => ErrorCategory::Discovery,
            Self::Watch(_) => ErrorCategory::Watch,
            Self::LockPoisoned => ErrorCategory::Internal,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, RuntimeError>;
