//! State error types.

use portico_types::ErrorCategory;

/// Errors produced while building or registering component state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// A trigger id part would make the joined id ambiguous.
    #[error("{part} '{value}' collides with the trigger id delimiter '__'")]
    DelimiterCollision { part: &'static str, value: String },

    /// A default value was supplied for a key no callback handles.
    #[error(
        "default for '{key}' has no matching callback; available callback keys: [{}]",
        available.join(", ")
    )]
    UnknownDefault { key: String, available: Vec<String> },

    /// Internal mutex was poisoned by a panicked thread.
    #[error("state store lock poisoned")]
    LockPoisoned,
}

impl StateError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::DelimiterCollision { .. } | Self::UnknownDefault { .. } => ErrorCategory::Config,
            Self::LockPoisoned => ErrorCategory::Internal,
        }
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, StateError>;
