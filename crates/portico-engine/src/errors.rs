//! Mount error types.

use portico_dataplane::DataPlaneError;
use portico_runtime::RuntimeError;
use portico_state::StateError;
use portico_types::ErrorCategory;

/// Failure of a single component mount.
///
/// Configuration problems always reach the caller with the offending key
/// named in the message.
#[derive(Debug, thiserror::Error)]
pub enum MountError {
    #[error("component '{key}' is not registered")]
    UnregisteredComponent { key: String },

    #[error("component '{key}' has neither JS nor HTML content")]
    MissingContent { key: String },

    #[error(transparent)]
    State(#[from] StateError),

    #[error("failed to encode data for component: {0}")]
    DataPlane(#[from] DataPlaneError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl MountError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnregisteredComponent { .. } | Self::MissingContent { .. } => {
                ErrorCategory::Config
            }
            Self::State(e) => e.category(),
            Self::DataPlane(e) => e.category(),
            Self::Runtime(e) => e.category(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_name_the_key() {
        let err = MountError::UnregisteredComponent {
            key: "acme.chart".into(),
        };
        assert_eq!(err.to_string(), "component 'acme.chart' is not registered");
        assert_eq!(err.category(), ErrorCategory::Config);
    }

    #[test]
    fn wrapped_errors_keep_their_category() {
        let err = MountError::from(StateError::LockPoisoned);
        assert_eq!(err.category(), ErrorCategory::Internal);
        let err = MountError::from(RuntimeError::LockPoisoned);
        assert_eq!(err.category(), ErrorCategory::Internal);
    }
}
